/// Text screen renderer for menu-style UIs.
///
/// Draws directly to any `DrawTarget<Color = Rgb565>` one row at a time with
/// opaque backgrounds, so a screen can be redrawn in place without clearing
/// (no framebuffer). Width comes from the target's bounding box.
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::Text;

// ── Geometry ─────────────────────────────────────────────────────────

pub const ROW_H: i32 = 14;
const CHAR_W: i32 = 6;
const BASELINE: i32 = 10;
const MAX_LINE: usize = 64;

// ── Color palette ────────────────────────────────────────────────────

pub const BG: Rgb565 = Rgb565::BLACK;
pub const HEADER_BG: Rgb565 = Rgb565::new(2, 4, 12);
pub const FG: Rgb565 = Rgb565::WHITE;
pub const ACCENT: Rgb565 = Rgb565::new(0, 50, 0);
pub const DIM: Rgb565 = Rgb565::new(12, 24, 12);
pub const ALERT: Rgb565 = Rgb565::RED;

pub struct Screen<'a, D> {
    display: &'a mut D,
    y: i32,
    width: i32,
    buf: heapless::String<MAX_LINE>,
}

impl<'a, D: DrawTarget<Color = Rgb565>> Screen<'a, D> {
    pub fn new(display: &'a mut D) -> Self {
        let width = display.bounding_box().size.width as i32;
        Self {
            display,
            y: 0,
            width,
            buf: heapless::String::new(),
        }
    }

    /// Text rows that fit below the current position
    pub fn rows_left(&self) -> usize {
        let height = self.display.bounding_box().size.height as i32;
        ((height - self.y) / ROW_H).max(0) as usize
    }

    pub fn clear(&mut self) {
        let _ = self.display.clear(BG);
        self.y = 0;
    }

    pub fn skip(&mut self, pixels: i32) {
        self.y += pixels;
    }

    pub fn fill_band(&mut self, height: i32, color: Rgb565) {
        let _ = Rectangle::new(
            Point::new(0, self.y),
            Size::new(self.width as u32, height as u32),
        )
        .into_styled(PrimitiveStyle::with_fill(color))
        .draw(self.display);
    }

    /// Paint everything below the current row with the background.
    pub fn blank_rest(&mut self) {
        let height = self.display.bounding_box().size.height as i32;
        if height > self.y {
            self.fill_band(height - self.y, BG);
            self.y = height;
        }
    }

    pub fn row(&mut self, color: Rgb565, args: core::fmt::Arguments<'_>) {
        self.format(args);
        self.pad();
        self.emit(color, BG, 0);
        self.y += ROW_H;
    }

    /// Menu entry; the selected one is drawn inverted.
    pub fn item(&mut self, selected: bool, args: core::fmt::Arguments<'_>) {
        self.format(args);
        self.pad();
        if selected {
            self.emit(BG, FG, 0);
        } else {
            self.emit(FG, BG, 0);
        }
        self.y += ROW_H;
    }

    pub fn centered(&mut self, color: Rgb565, args: core::fmt::Arguments<'_>) {
        self.format(args);
        let x = ((self.width - self.buf.len() as i32 * CHAR_W) / 2).max(0);
        self.emit(color, BG, x);
        self.y += ROW_H;
    }

    pub fn header(
        &mut self,
        title_args: core::fmt::Arguments<'_>,
        indicator: &str,
        indicator_color: Rgb565,
    ) {
        self.fill_band(ROW_H, HEADER_BG);
        self.format(title_args);
        self.emit(FG, HEADER_BG, 0);

        let x = self.width - indicator.len() as i32 * CHAR_W - 2;
        let _ = Text::new(
            indicator,
            Point::new(x, self.y + BASELINE),
            Self::text_style(indicator_color, HEADER_BG),
        )
        .draw(self.display);
        self.y += ROW_H;
    }

    pub fn divider(&mut self) {
        let _ = Rectangle::new(Point::new(0, self.y), Size::new(self.width as u32, 1))
            .into_styled(PrimitiveStyle::with_fill(DIM))
            .draw(self.display);
        self.y += 3;
    }

    fn format(&mut self, args: core::fmt::Arguments<'_>) {
        self.buf.clear();
        // Overlong lines are cut at capacity
        let _ = core::fmt::write(&mut self.buf, args);
    }

    fn pad(&mut self) {
        let line_w = (self.width / CHAR_W) as usize;
        while self.buf.len() < line_w {
            if self.buf.push(' ').is_err() {
                break;
            }
        }
    }

    fn emit(&mut self, fg: Rgb565, bg: Rgb565, x: i32) {
        let _ = Text::new(
            &self.buf,
            Point::new(x, self.y + BASELINE),
            Self::text_style(fg, bg),
        )
        .draw(self.display);
    }

    fn text_style(fg: Rgb565, bg: Rgb565) -> MonoTextStyle<'static, Rgb565> {
        MonoTextStyleBuilder::new()
            .font(&FONT_6X10)
            .text_color(fg)
            .background_color(bg)
            .build()
    }
}

macro_rules! row {
    ($s:expr, $color:expr, $($arg:tt)*) => {
        $s.row($color, format_args!($($arg)*))
    };
}

macro_rules! item {
    ($s:expr, $selected:expr, $($arg:tt)*) => {
        $s.item($selected, format_args!($($arg)*))
    };
}

macro_rules! centered {
    ($s:expr, $color:expr, $($arg:tt)*) => {
        $s.centered($color, format_args!($($arg)*))
    };
}

pub(crate) use {centered, item, row};

/// First `n` characters of `s`
pub fn truncate(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// First entry of a `visible`-row window that keeps `cursor` on screen
pub fn window_start(cursor: usize, visible: usize) -> usize {
    if visible == 0 {
        return cursor;
    }
    cursor.saturating_sub(visible - 1)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::convert::Infallible;

    /// Draw target that records how many pixels were written and in which colors.
    pub struct CountingDisplay {
        pub size: Size,
        pub pixels: usize,
        pub out_of_bounds: usize,
        pub colors: std::vec::Vec<Rgb565>,
    }

    impl CountingDisplay {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                size: Size::new(width, height),
                pixels: 0,
                out_of_bounds: 0,
                colors: std::vec::Vec::new(),
            }
        }

        pub fn saw(&self, color: Rgb565) -> bool {
            self.colors.contains(&color)
        }
    }

    impl OriginDimensions for CountingDisplay {
        fn size(&self) -> Size {
            self.size
        }
    }

    impl DrawTarget for CountingDisplay {
        type Color = Rgb565;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            let bounds = self.bounding_box();
            for Pixel(point, color) in pixels {
                if bounds.contains(point) {
                    self.pixels += 1;
                    if !self.colors.contains(&color) {
                        self.colors.push(color);
                    }
                } else {
                    self.out_of_bounds += 1;
                }
            }
            Ok(())
        }
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("HomeNetwork-5GHz-Ext", 14), "HomeNetwork-5G");
        assert_eq!(truncate("short", 14), "short");
        assert_eq!(truncate("ñandú", 3), "ñan");
    }

    #[test]
    fn window_follows_cursor() {
        assert_eq!(window_start(0, 5), 0);
        assert_eq!(window_start(4, 5), 0);
        assert_eq!(window_start(5, 5), 1);
        assert_eq!(window_start(20, 5), 16);
    }

    #[test]
    fn rows_advance_and_count_down() {
        let mut d = CountingDisplay::new(320, 170);
        let mut s = Screen::new(&mut d);
        assert_eq!(s.rows_left(), 12);
        s.header(format_args!(" TEST"), "[ON]", ACCENT);
        row!(s, FG, " line {}", 1);
        assert_eq!(s.rows_left(), 10);
        drop(s);
        assert!(d.pixels > 0);
        assert_eq!(d.out_of_bounds, 0);
        assert!(d.saw(HEADER_BG));
    }

    #[test]
    fn selected_item_is_inverted() {
        let mut d = CountingDisplay::new(320, 170);
        let mut s = Screen::new(&mut d);
        item!(s, true, " Scanner");
        drop(s);
        // Inverted row paints the foreground as background
        assert!(d.saw(FG));
        assert!(d.saw(BG));
    }
}
