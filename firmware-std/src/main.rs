//! ESP-Chain: ESP-IDF std firmware
//!
//! The engine runs as a non-blocking tick loop on the main thread. Serial
//! command input and NDJSON output each get a FreeRTOS thread, connected to
//! the loop by std::sync::mpsc channels.

#[cfg(feature = "tdisplay-s3")]
mod display;
mod input;
mod radio;
mod storage;

use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;
use std::time::{Duration, Instant};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{PinDriver, Pull};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{Configuration, EspWifi};

use espchain::attack::Orchestrator;
use espchain::board;
use espchain::comm::{self, LineReader, Reply};
use espchain::config::WifiConfig;
use espchain::model::StationList;
use espchain::module::{Module, WifiModule};
use espchain::protocol::{DeviceMessage, HostCommand, MsgBuffer, MAX_MSG_LEN, VERSION};
use espchain::radio::{Clock, Radio, Storage};
use espchain::sniffer::Sniffer;

use input::Gestures;
use radio::EspRadio;
use storage::SdStorage;

/// Receive context shared with the promiscuous callback
static SNIFFER: Sniffer = Sniffer::new();

const DRAW_INTERVAL_MS: u64 = 200;
const STATUS_INTERVAL_MS: u64 = 30_000;

struct EspClock {
    boot: Instant,
}

impl Clock for EspClock {
    fn now_micros(&self) -> u64 {
        self.boot.elapsed().as_micros() as u64
    }
}

fn main() -> anyhow::Result<()> {
    // Bind the ESP-IDF logger to the `log` facade
    esp_idf_svc::log::EspLogger::initialize_default();
    let clock = EspClock {
        boot: Instant::now(),
    };

    log::info!("ESP-Chain v{} starting on {} (std)", VERSION, board::BOARD_NAME);
    log::warn!("For authorized security testing only");

    // ── Peripherals ──────────────────────────────────────────────────

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let pins = peripherals.pins;

    // ── Display ──────────────────────────────────────────────────────

    #[cfg(feature = "tdisplay-s3")]
    let mut lcd = if board::HAS_DISPLAY {
        let lcd_pins = display::LcdPins {
            data: [
                pins.gpio39.into(),
                pins.gpio40.into(),
                pins.gpio41.into(),
                pins.gpio42.into(),
                pins.gpio45.into(),
                pins.gpio46.into(),
                pins.gpio47.into(),
                pins.gpio48.into(),
            ],
            wr: pins.gpio8.into(),
            rd: pins.gpio9.into(),
            dc: pins.gpio7.into(),
            cs: pins.gpio6.into(),
            rst: pins.gpio5.into(),
            backlight: pins.gpio38.into(),
            power: pins.gpio15.into(),
        };
        match display::init(lcd_pins) {
            Ok(lcd) => Some(lcd),
            Err(e) => {
                log::warn!("Display unavailable: {}", e);
                None
            }
        }
    } else {
        None
    };

    // ── SD card ──────────────────────────────────────────────────────

    let sd_mount = if board::HAS_SD {
        match storage::mount(
            peripherals.spi2,
            pins.gpio12,
            pins.gpio11,
            pins.gpio13,
            pins.gpio10,
            board::SD_MOUNT,
        ) {
            Ok(mount) => Some(mount),
            Err(e) => {
                log::warn!("SD card unavailable, captures disabled: {}", e);
                None
            }
        }
    } else {
        None
    };
    let storage = SdStorage::new(board::SD_MOUNT, sd_mount.is_some());

    // ── Button ───────────────────────────────────────────────────────

    let mut button = PinDriver::input(pins.gpio14)?;
    button.set_pull(Pull::Up)?;
    log::info!("Button on GPIO{}", board::BUTTON_PIN);

    // ── WiFi (STA, not associated) ───────────────────────────────────

    let mut wifi = EspWifi::new(peripherals.modem, sys_loop, Some(nvs))?;
    wifi.set_configuration(&Configuration::Client(Default::default()))?;
    wifi.start()?;
    log::info!("WiFi started in station mode");

    // ── Channels and threads ─────────────────────────────────────────

    let (output_tx, output_rx) = mpsc::sync_channel::<MsgBuffer>(16);
    let (cmd_tx, cmd_rx) = mpsc::sync_channel::<HostCommand>(4);

    thread::Builder::new()
        .name("output".into())
        .stack_size(4096)
        .spawn(move || {
            output_thread(output_rx);
        })?;
    log::info!("Output thread spawned");

    thread::Builder::new()
        .name("serial".into())
        .stack_size(4096)
        .spawn(move || {
            serial_thread(cmd_tx);
        })?;
    log::info!("Serial command thread spawned");

    // ── Engine ───────────────────────────────────────────────────────

    let orch = Orchestrator::new(
        EspRadio::new(wifi),
        storage,
        clock,
        &SNIFFER,
        WifiConfig::default(),
    );
    let mut module = WifiModule::new(orch);
    module.init();
    log::info!("{}: {}", module.name(), module.description());

    let mut gestures = Gestures::new();
    let mut last_cycle = 0u32;
    #[cfg(feature = "tdisplay-s3")]
    let mut last_draw = 0u64;
    let mut last_status = 0u64;
    let mut reported = StationList::new();

    loop {
        module.tick();
        let now = module.orchestrator().uptime_ms();

        if let Some(pressed) = gestures.update(button.is_low(), now) {
            if !module.handle_input(pressed) {
                log::info!("Module exited, returning to main menu");
                module.init();
            }
        }

        while let Ok(cmd) = cmd_rx.try_recv() {
            match comm::handle_command(cmd, &mut module) {
                Reply::None => {}
                Reply::Status => send_status(&output_tx, module.orchestrator()),
                Reply::Exit => module.init(),
            }
        }

        let orch = module.orchestrator();
        if orch.scan_cycles() != last_cycle {
            last_cycle = orch.scan_cycles();
            for ap in orch.results() {
                send(&output_tx, &comm::ap_message(ap, last_cycle));
            }
        }

        report_stations(&output_tx, orch, &mut reported);

        if now.saturating_sub(last_status) >= STATUS_INTERVAL_MS {
            last_status = now;
            send_status(&output_tx, orch);
        }

        #[cfg(feature = "tdisplay-s3")]
        if let Some(lcd) = lcd.as_mut() {
            if now.saturating_sub(last_draw) >= DRAW_INTERVAL_MS {
                last_draw = now;
                module.draw(&mut lcd.display);
            }
        }

        thread::sleep(Duration::from_millis(1));
    }
}

// ── Reporting ────────────────────────────────────────────────────────

fn send(tx: &SyncSender<MsgBuffer>, msg: &DeviceMessage) {
    let mut buf = MsgBuffer::new();
    buf.resize_default(MAX_MSG_LEN).ok();
    if let Some(len) = comm::serialize_message(msg, &mut buf) {
        buf.truncate(len);
        let _ = tx.try_send(buf);
    }
}

fn send_status<R: Radio, S: Storage, C: Clock>(
    tx: &SyncSender<MsgBuffer>,
    orch: &Orchestrator<R, S, C>,
) {
    let session = orch.session();
    send(tx, &comm::status_message(orch, &session, board::BOARD_NAME));
}

/// Emit each station once per target as it is discovered.
fn report_stations<R: Radio, S: Storage, C: Clock>(
    tx: &SyncSender<MsgBuffer>,
    orch: &Orchestrator<R, S, C>,
    reported: &mut StationList,
) {
    let Some(target) = orch.target() else {
        reported.clear();
        return;
    };
    let stations = orch.stations();
    if stations.len() < reported.len() {
        // Station set was reset for a new discovery pass
        reported.clear();
    }
    for mac in stations.iter() {
        if reported.contains(mac) {
            continue;
        }
        let _ = reported.push(*mac);
        send(
            tx,
            &DeviceMessage::Station {
                mac: *mac,
                bssid: target.bssid,
            },
        );
    }
}

// ── Output thread ────────────────────────────────────────────────────

fn output_thread(output_rx: Receiver<MsgBuffer>) {
    log::info!("Output thread started");

    while let Ok(msg) = output_rx.recv() {
        let mut out = std::io::stdout().lock();
        if out.write_all(&msg).and_then(|_| out.flush()).is_err() {
            log::debug!("Serial write failed");
        }
    }
}

// ── Serial command thread ────────────────────────────────────────────

fn serial_thread(cmd_tx: SyncSender<HostCommand>) {
    log::info!("Serial command thread started ({} baud)", comm::SERIAL_BAUD);

    let mut reader = LineReader::new();
    let mut stdin = std::io::stdin();
    let mut chunk = [0u8; 64];
    loop {
        match stdin.read(&mut chunk) {
            Ok(n) if n > 0 => {
                for &byte in &chunk[..n] {
                    if let Some(line) = reader.feed(byte) {
                        match comm::parse_command(line) {
                            Some(cmd) => {
                                let _ = cmd_tx.try_send(cmd);
                            }
                            None => log::debug!("Ignoring unrecognized command line"),
                        }
                    }
                }
            }
            // Console stdin is non-blocking; poll
            _ => thread::sleep(Duration::from_millis(20)),
        }
    }
}
