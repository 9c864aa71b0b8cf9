/// Hardware abstraction for supported boards.
///
/// Each board module defines pin assignments and capabilities
/// selected at compile time via feature flags.

#[cfg(feature = "board-tdisplay-s3")]
mod hw {
    pub const BOARD_NAME: &str = "lilygo_tdisplay_s3";
    pub const HAS_DISPLAY: bool = true;
    pub const HAS_SD: bool = true;

    // ST7789 over the 8-bit i8080 bus, landscape after rotation
    pub const DISPLAY_WIDTH: u16 = 320;
    pub const DISPLAY_HEIGHT: u16 = 170;
    /// Panel RAM is 240 columns wide; the visible 170 start at 35
    pub const DISPLAY_OFFSET_X: u16 = 35;
    pub const LCD_DATA_PINS: [u8; 8] = [39, 40, 41, 42, 45, 46, 47, 48];
    pub const LCD_WR_PIN: u8 = 8;
    pub const LCD_RD_PIN: u8 = 9;
    pub const LCD_DC_PIN: u8 = 7;
    pub const LCD_CS_PIN: u8 = 6;
    pub const LCD_RST_PIN: u8 = 5;
    pub const LCD_BL_PIN: u8 = 38;
    /// Must be driven high for the panel to run from battery
    pub const LCD_POWER_PIN: u8 = 15;

    // microSD on SPI
    pub const SD_CS_PIN: u8 = 10;
    pub const SD_MOSI_PIN: u8 = 11;
    pub const SD_SCK_PIN: u8 = 12;
    pub const SD_MISO_PIN: u8 = 13;
    pub const SD_SPI_FREQ_KHZ: u32 = 20_000;

    /// Single user button (GPIO0 is the boot strap and not usable)
    pub const BUTTON_PIN: u8 = 14;
}

#[cfg(not(feature = "board-tdisplay-s3"))]
mod hw {
    pub const BOARD_NAME: &str = "unknown";
    pub const HAS_DISPLAY: bool = false;
    pub const HAS_SD: bool = false;
}

pub use hw::*;

/// Mount point of the SD card in the VFS
pub const SD_MOUNT: &str = "/sd";
