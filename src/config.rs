/// Runtime configuration for the WiFi engine.
///
/// Adjustable from the Settings menu and from serial host commands without
/// reflashing. Nothing here is persisted; every boot starts from defaults.
use serde::{Deserialize, Serialize};

use crate::frames::DEFAULT_REASON;

/// Scan dwell time bounds and step (milliseconds per channel)
pub const SCAN_TIME_MIN_MS: u32 = 100;
pub const SCAN_TIME_MAX_MS: u32 = 1000;
pub const SCAN_TIME_STEP_MS: u32 = 100;

/// Order of the AP list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Strongest signal first
    Rssi,
    /// Lowest channel first
    Channel,
}

impl SortKey {
    pub fn toggled(self) -> Self {
        match self {
            SortKey::Rssi => SortKey::Channel,
            SortKey::Channel => SortKey::Rssi,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Rssi => "RSSI",
            SortKey::Channel => "CH",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WifiConfig {
    /// Maximum dwell per channel during a scan pass
    pub scan_time_ms: u32,
    /// Show APs with an empty SSID as `<HIDDEN>` instead of dropping them
    pub show_hidden: bool,
    pub sort: SortKey,
    /// 802.11 reason code placed in deauth frames
    pub deauth_reason: u16,
    /// Minimum spacing between two deauth frames
    pub tx_interval_ms: u32,
}

impl WifiConfig {
    pub const fn new() -> Self {
        Self {
            scan_time_ms: 300,
            show_hidden: true,
            sort: SortKey::Rssi,
            deauth_reason: DEFAULT_REASON,
            tx_interval_ms: 10,
        }
    }

    /// Settings-menu step: +100 ms, wrapping from 1000 back to 100.
    pub fn step_scan_time(&mut self) {
        self.scan_time_ms += SCAN_TIME_STEP_MS;
        if self.scan_time_ms > SCAN_TIME_MAX_MS {
            self.scan_time_ms = SCAN_TIME_MIN_MS;
        }
    }

    /// Set the dwell time, clamped to the supported range.
    pub fn set_scan_time(&mut self, ms: u32) {
        self.scan_time_ms = ms.clamp(SCAN_TIME_MIN_MS, SCAN_TIME_MAX_MS);
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = WifiConfig::default();
        assert_eq!(c.scan_time_ms, 300);
        assert!(c.show_hidden);
        assert_eq!(c.sort, SortKey::Rssi);
        assert_eq!(c.deauth_reason, 7);
    }

    #[test]
    fn scan_time_wraps() {
        let mut c = WifiConfig::new();
        c.scan_time_ms = 900;
        c.step_scan_time();
        assert_eq!(c.scan_time_ms, 1000);
        c.step_scan_time();
        assert_eq!(c.scan_time_ms, 100);
    }

    #[test]
    fn scan_time_clamped() {
        let mut c = WifiConfig::new();
        c.set_scan_time(5);
        assert_eq!(c.scan_time_ms, 100);
        c.set_scan_time(60_000);
        assert_eq!(c.scan_time_ms, 1000);
    }

    #[test]
    fn sort_toggles() {
        assert_eq!(SortKey::Rssi.toggled(), SortKey::Channel);
        assert_eq!(SortKey::Channel.toggled(), SortKey::Rssi);
    }
}
