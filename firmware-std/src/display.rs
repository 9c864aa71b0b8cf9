//! Display driver for LilyGo T-Display S3 (ST7789, 170x320, 8-bit parallel).
//!
//! The panel hangs off an i8080 bus driven by plain GPIO through mipidsi's
//! generic bus. Rendering is done by the engine's module; this file only
//! brings the panel up and shows the boot splash.

use std::time::Duration;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use esp_idf_svc::hal::delay::Delay;
use esp_idf_svc::hal::gpio::{AnyOutputPin, Output, PinDriver};
use mipidsi::interface::{Generic8BitBus, ParallelInterface};
use mipidsi::models::ST7789;
use mipidsi::options::{ColorInversion, Orientation, Rotation};
use mipidsi::Builder;

use espchain::board;
use espchain::display::{Screen, ACCENT, DIM, FG};
use espchain::protocol::VERSION;

type Out = PinDriver<'static, AnyOutputPin, Output>;

/// Panel pins, already downgraded by the caller.
pub struct LcdPins {
    pub data: [AnyOutputPin; 8],
    pub wr: AnyOutputPin,
    pub rd: AnyOutputPin,
    pub dc: AnyOutputPin,
    pub cs: AnyOutputPin,
    pub rst: AnyOutputPin,
    pub backlight: AnyOutputPin,
    pub power: AnyOutputPin,
}

/// Initialized panel. Holds the static control lines so they stay driven.
pub struct Lcd<D> {
    pub display: D,
    _held: [Out; 4],
}

pub fn init(pins: LcdPins) -> anyhow::Result<Lcd<impl DrawTarget<Color = Rgb565>>> {
    log::info!(
        "Display init: data {:?}, WR {}, RD {}, DC {}, CS {}, RST {}, BL {}, power {}",
        board::LCD_DATA_PINS,
        board::LCD_WR_PIN,
        board::LCD_RD_PIN,
        board::LCD_DC_PIN,
        board::LCD_CS_PIN,
        board::LCD_RST_PIN,
        board::LCD_BL_PIN,
        board::LCD_POWER_PIN,
    );

    // Panel power rail and backlight
    let mut power = PinDriver::output(pins.power)?;
    power.set_high()?;
    let mut backlight = PinDriver::output(pins.backlight)?;
    backlight.set_high()?;

    // Read strobe idle high, chip permanently selected
    let mut rd = PinDriver::output(pins.rd)?;
    rd.set_high()?;
    let mut cs = PinDriver::output(pins.cs)?;
    cs.set_low()?;

    let [d0, d1, d2, d3, d4, d5, d6, d7] = pins.data;
    let bus = Generic8BitBus::new((
        PinDriver::output(d0)?,
        PinDriver::output(d1)?,
        PinDriver::output(d2)?,
        PinDriver::output(d3)?,
        PinDriver::output(d4)?,
        PinDriver::output(d5)?,
        PinDriver::output(d6)?,
        PinDriver::output(d7)?,
    ));
    let di = ParallelInterface::new(bus, PinDriver::output(pins.dc)?, PinDriver::output(pins.wr)?);
    let rst = PinDriver::output(pins.rst)?;

    let mut delay = Delay::new_default();
    let mut display = Builder::new(ST7789, di)
        .display_size(board::DISPLAY_HEIGHT, board::DISPLAY_WIDTH)
        .display_offset(board::DISPLAY_OFFSET_X, 0)
        .invert_colors(ColorInversion::Inverted)
        .orientation(Orientation::new().rotate(Rotation::Deg90))
        .reset_pin(rst)
        .init(&mut delay)
        .map_err(|e| anyhow::anyhow!("display init: {:?}", e))?;
    log::info!("Display initialized");

    draw_splash(&mut display);
    std::thread::sleep(Duration::from_millis(1500));

    Ok(Lcd {
        display,
        _held: [power, backlight, rd, cs],
    })
}

fn draw_splash(display: &mut impl DrawTarget<Color = Rgb565>) {
    let mut s = Screen::new(display);
    s.clear();
    s.skip(48);
    s.centered(FG, format_args!("ESP-CHAIN"));
    s.centered(ACCENT, format_args!("v{}", VERSION));
    s.skip(12);
    s.centered(DIM, format_args!("Authorized testing only"));
}
