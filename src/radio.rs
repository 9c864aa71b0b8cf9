/// Capabilities the engine consumes from the platform.
///
/// The firmware crate implements these over ESP-IDF (WiFi driver, SD card
/// VFS, esp_timer). Tests implement them in memory. Nothing in the library
/// touches hardware or global state directly.
use heapless::Vec;
use thiserror::Error;

use crate::model::{Encryption, MacAddress, SsidString, MAX_APS};
use crate::sniffer::Sniffer;

/// Errors reported by the radio driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("channel {0} is not a valid 2.4 GHz channel")]
    InvalidChannel(u8),
    #[error("radio tuned to channel {actual}, frame needs channel {expected}")]
    ChannelMismatch { expected: u8, actual: u8 },
    #[error("promiscuous mode change rejected by driver")]
    Promiscuous,
    #[error("raw transmit failed")]
    Transmit,
    #[error("scan request rejected by driver")]
    Scan,
}

/// Errors reported by the storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage not mounted")]
    NotMounted,
    #[error("failed to create directory")]
    Mkdir,
    #[error("failed to open file")]
    Open,
    #[error("write failed")]
    Write,
}

/// Lowest and highest 2.4 GHz channel the radio accepts
pub const MIN_CHANNEL: u8 = 1;
pub const MAX_CHANNEL: u8 = 14;

pub fn is_valid_channel(channel: u8) -> bool {
    (MIN_CHANNEL..=MAX_CHANNEL).contains(&channel)
}

/// Parameters for one active scan pass over all channels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParams {
    /// Maximum dwell time per channel in milliseconds
    pub time_per_channel_ms: u32,
    /// Ask the driver to also report APs with an empty SSID
    pub show_hidden: bool,
}

/// Driver-side scan state, as reported by `Radio::scan_poll`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioScanState {
    /// No scan running and no results pending (or the last start failed)
    NotStarted,
    Running,
    /// Results are ready to be taken with `Radio::scan_take`
    Complete,
}

/// One AP exactly as the driver reported it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAp {
    pub ssid: SsidString,
    pub bssid: MacAddress,
    pub channel: u8,
    pub rssi: i8,
    pub encryption: Encryption,
}

/// Buffer the driver fills with raw scan results
pub type RawScanList = Vec<RawAp, MAX_APS>;

/// WiFi radio capability.
///
/// Channel and promiscuous state are singletons owned by the orchestrator;
/// no other component is handed a `&mut` to the radio while an attack is
/// armed.
pub trait Radio {
    fn set_channel(&mut self, channel: u8) -> Result<(), RadioError>;

    /// Channel the radio is currently tuned to
    fn channel(&self) -> u8;

    /// Enable promiscuous receive bound to `sniffer`, or disable it with `None`.
    ///
    /// The driver must route every received frame to `Sniffer::on_frame`
    /// while enabled and stop doing so before this returns with `None`.
    fn set_promiscuous(&mut self, sniffer: Option<&'static Sniffer>) -> Result<(), RadioError>;

    fn transmit_raw(&mut self, frame: &[u8]) -> Result<(), RadioError>;

    /// Request a non-blocking scan.
    fn scan_start(&mut self, params: &ScanParams) -> Result<(), RadioError>;

    fn scan_poll(&mut self) -> RadioScanState;

    /// Move completed results into `out` and release the driver's copy.
    fn scan_take(&mut self, out: &mut RawScanList);

    /// Abort a running scan, discarding results.
    fn scan_stop(&mut self);
}

/// Removable storage capability (SD card).
pub trait Storage {
    type File;

    fn exists(&mut self, path: &str) -> bool;

    fn mkdir(&mut self, path: &str) -> Result<(), StorageError>;

    /// Open for appending, creating the file if needed.
    fn open_append(&mut self, path: &str) -> Result<Self::File, StorageError>;

    fn write(&mut self, file: &mut Self::File, bytes: &[u8]) -> Result<(), StorageError>;

    /// Flush and release the handle.
    fn close(&mut self, file: Self::File) -> Result<(), StorageError>;
}

/// Monotonic time since boot.
pub trait Clock {
    fn now_micros(&self) -> u64;

    fn now_millis(&self) -> u64 {
        self.now_micros() / 1000
    }
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_micros(&self) -> u64 {
        (**self).now_micros()
    }
}

/// Packet class reported by the driver alongside each promiscuous frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Management,
    Control,
    Data,
    Misc,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_range() {
        assert!(!is_valid_channel(0));
        assert!(is_valid_channel(1));
        assert!(is_valid_channel(14));
        assert!(!is_valid_channel(15));
    }
}
