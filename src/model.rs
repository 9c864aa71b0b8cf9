/// Passive data entities shared by the scanner, sniffer and orchestrator.
///
/// Everything here is `Copy` or fixed-capacity so it can cross the
/// sniffer callback boundary without an allocator.
use core::fmt;

use heapless::{String, Vec};
use serde::Serialize;

/// Maximum number of access points kept from one scan cycle
pub const MAX_APS: usize = 64;

/// Maximum number of stations remembered during a station scan
pub const MAX_STATIONS: usize = 64;

/// SSID string (32 bytes + room for the `<HIDDEN>` label)
pub type SsidString = String<33>;

/// Maximum length for MAC address strings ("aa:bb:cc:dd:ee:ff")
pub type MacString = String<18>;

/// Label shown in place of an empty SSID
pub const HIDDEN_LABEL: &str = "<HIDDEN>";

/// A 6-byte IEEE 802 MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Read an address from a 6-byte window of a raw frame.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 6] = bytes.get(..6)?.try_into().ok()?;
        Some(Self(arr))
    }

    /// Parse "AA:BB:CC:DD:EE:FF" (either case, `:` or `-` separated).
    ///
    /// Malformed input degrades to [`MacAddress::ZERO`] instead of failing.
    pub fn parse_lenient(s: &str) -> Self {
        Self::try_parse(s).unwrap_or(Self::ZERO)
    }

    fn try_parse(s: &str) -> Option<Self> {
        let mut out = [0u8; 6];
        let mut parts = s.trim().split(|c: char| c == ':' || c == '-');
        for byte in out.iter_mut() {
            let part = parts.next()?;
            if part.is_empty() || part.len() > 2 {
                return None;
            }
            *byte = u8::from_str_radix(part, 16).ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(Self(out))
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// True for any address starting with `ff:ff` (broadcast and the
    /// multicast ranges the sniffer must never treat as a station).
    pub fn is_broadcast_prefixed(&self) -> bool {
        self.0[0] == 0xFF && self.0[1] == 0xFF
    }

    /// Lowercase colon-separated form, the way stations are listed.
    pub fn to_mac_string(&self) -> MacString {
        let mut buf = MacString::new();
        let _ = fmt::write(&mut buf, format_args!("{}", self));
        buf
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl Serialize for MacAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_mac_string())
    }
}

/// Authentication mode reported by the radio for an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Encryption {
    Open,
    Wep,
    Wpa,
    Wpa2,
    WpaWpa2,
    Wpa2Enterprise,
    Wpa3,
    Wpa2Wpa3,
    Wapi,
    Unknown,
}

impl Encryption {
    /// Short name for the details screen
    pub fn as_str(&self) -> &'static str {
        match self {
            Encryption::Open => "Open",
            Encryption::Wep => "WEP",
            Encryption::Wpa => "WPA",
            Encryption::Wpa2 => "WPA2",
            Encryption::WpaWpa2 => "WPA/WPA2",
            Encryption::Wpa2Enterprise => "WPA2-E",
            Encryption::Wpa3 => "WPA3",
            Encryption::Wpa2Wpa3 => "WPA2/WPA3",
            Encryption::Wapi => "WAPI",
            Encryption::Unknown => "Unknown",
        }
    }
}

/// One access point from a completed scan cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApRecord {
    /// Display SSID. Hidden networks carry [`HIDDEN_LABEL`] when shown.
    pub ssid: SsidString,
    pub bssid: MacAddress,
    pub channel: u8,
    pub rssi: i8,
    pub encryption: Encryption,
}

impl ApRecord {
    pub fn is_hidden(&self) -> bool {
        self.ssid.is_empty() || self.ssid == HIDDEN_LABEL
    }
}

/// AP list rebuilt on every scan cycle
pub type ApList = Vec<ApRecord, MAX_APS>;

/// Stations discovered for the current target, in discovery order
pub type StationList = Vec<MacAddress, MAX_STATIONS>;
