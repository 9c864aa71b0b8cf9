/// JSON message protocol between the device and a serial host.
///
/// All messages are newline-delimited JSON (NDJSON).
/// Uses `heapless` types for no_std/no-alloc operation.
use heapless::{String, Vec};
use serde::{Deserialize, Serialize};

use crate::config::SortKey;
use crate::model::{MacAddress, SsidString};
use crate::module::Button;

/// Messages sent from the device to the host
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// One access point from a completed scan cycle
    #[serde(rename = "ap")]
    Ap {
        ssid: &'a SsidString,
        bssid: MacAddress,
        ch: u8,
        rssi: i8,
        /// Encryption display name
        enc: &'static str,
        /// Scan cycle this result belongs to
        cycle: u32,
    },
    /// Client station discovered for the current target
    #[serde(rename = "station")]
    Station { mac: MacAddress, bssid: MacAddress },
    /// Device and session status report
    #[serde(rename = "status")]
    Status {
        /// Attack mode: "idle", "deauth", "handshake", "mixed", "station_scan"
        mode: &'static str,
        scanning: bool,
        aps: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<&'a SsidString>,
        #[serde(skip_serializing_if = "Option::is_none")]
        bssid: Option<MacAddress>,
        #[serde(skip_serializing_if = "Option::is_none")]
        station: Option<MacAddress>,
        deauth: u32,
        handshakes: u32,
        stations: u8,
        dropped: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        capture: Option<&'a str>,
        /// Uptime in seconds
        uptime: u32,
        /// Board identifier
        board: &'static str,
        /// Firmware version
        version: &'static str,
    },
}

/// Commands sent from the host to the device.
///
/// Deserialized manually via [`RawCommand`] in `comm::parse_command()` because
/// `serde_json_core` does not support internally tagged enums (`deserialize_any`).
#[derive(Debug, PartialEq)]
pub enum HostCommand {
    /// Simulate a button press
    Press(Button),
    /// Request current status
    GetStatus,
    /// Set the deauthentication reason code
    SetReason { reason: u16 },
    /// Set scan dwell time per channel
    SetScanTime { ms: u32 },
    /// Show or filter hidden networks
    SetHidden { enabled: bool },
    SetSort { key: SortKey },
    /// Aim deauthentication at one station, or broadcast with `None`
    SetStation { mac: Option<MacAddress> },
    /// Disarm any running attack
    Stop,
}

/// Wire format for host commands: a flat struct that `serde_json_core` can
/// deserialize without `deserialize_any`. Converted to [`HostCommand`] in
/// `comm::parse_command()`.
#[derive(Deserialize)]
pub(crate) struct RawCommand {
    pub cmd: String<16>,
    #[serde(default)]
    pub button: Option<Button>,
    /// Legacy numeric button code
    #[serde(default)]
    pub code: Option<u8>,
    #[serde(default)]
    pub reason: Option<u16>,
    #[serde(default)]
    pub ms: Option<u32>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub key: Option<SortKey>,
    #[serde(default)]
    pub mac: Option<String<24>>,
}

/// Firmware version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 512;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;

#[cfg(test)]
mod tests {
    use super::*;

    const BSSID: MacAddress = MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    fn to_json<'b>(msg: &DeviceMessage, buf: &'b mut [u8]) -> &'b str {
        let len = serde_json_core::to_slice(msg, buf).unwrap();
        core::str::from_utf8(&buf[..len]).unwrap()
    }

    // ── HostCommand parsing (via comm::parse_command) ──────────────

    #[test]
    fn host_command_equality() {
        assert_eq!(HostCommand::Stop, HostCommand::Stop);
        assert_eq!(
            HostCommand::SetReason { reason: 7 },
            HostCommand::SetReason { reason: 7 }
        );
        assert_ne!(HostCommand::Press(Button::Up), HostCommand::Press(Button::Back));
    }

    // ── DeviceMessage serialization ─────────────────────────────────

    #[test]
    fn serialize_ap_message() {
        let ssid = SsidString::try_from("Lab Net").unwrap();
        let msg = DeviceMessage::Ap {
            ssid: &ssid,
            bssid: BSSID,
            ch: 6,
            rssi: -45,
            enc: "WPA2",
            cycle: 3,
        };
        let mut buf = [0u8; 256];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""type":"ap""#));
        assert!(json.contains(r#""ssid":"Lab Net""#));
        assert!(json.contains(r#""bssid":"aa:bb:cc:dd:ee:ff""#));
        assert!(json.contains(r#""ch":6"#));
        assert!(json.contains(r#""rssi":-45"#));
        assert!(json.contains(r#""enc":"WPA2""#));
    }

    #[test]
    fn serialize_station_message() {
        let msg = DeviceMessage::Station {
            mac: MacAddress::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
            bssid: BSSID,
        };
        let mut buf = [0u8; 128];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""type":"station""#));
        assert!(json.contains(r#""mac":"11:22:33:44:55:66""#));
    }

    #[test]
    fn serialize_idle_status_omits_session_fields() {
        let msg = DeviceMessage::Status {
            mode: "idle",
            scanning: true,
            aps: 12,
            target: None,
            bssid: None,
            station: None,
            deauth: 0,
            handshakes: 0,
            stations: 0,
            dropped: 0,
            capture: None,
            uptime: 120,
            board: "test_board",
            version: "0.1.0",
        };
        let mut buf = [0u8; 512];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""type":"status""#));
        assert!(json.contains(r#""scanning":true"#));
        assert!(json.contains(r#""aps":12"#));
        assert!(json.contains(r#""board":"test_board""#));
        assert!(!json.contains("target"));
        assert!(!json.contains("capture"));
    }

    #[test]
    fn serialize_armed_status() {
        let ssid = SsidString::try_from("Lab Net").unwrap();
        let msg = DeviceMessage::Status {
            mode: "mixed",
            scanning: false,
            aps: 3,
            target: Some(&ssid),
            bssid: Some(BSSID),
            station: None,
            deauth: 250,
            handshakes: 4,
            stations: 2,
            dropped: 1,
            capture: Some("/capture/Lab_Net_1000.pcap"),
            uptime: 60,
            board: "lilygo_tdisplay_s3",
            version: VERSION,
        };
        let mut buf = [0u8; 512];
        let json = to_json(&msg, &mut buf);
        assert!(json.contains(r#""mode":"mixed""#));
        assert!(json.contains(r#""target":"Lab Net""#));
        assert!(json.contains(r#""deauth":250"#));
        assert!(json.contains(r#""handshakes":4"#));
        assert!(json.contains(r#""capture":"/capture/Lab_Net_1000.pcap""#));
    }

    // ── Version constant ────────────────────────────────────────────

    #[test]
    fn version_is_semver() {
        let parts: heapless::Vec<&str, 4> = VERSION.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "VERSION should be semver (major.minor.patch)"
        );
        for part in &parts {
            assert!(part.parse::<u32>().is_ok(), "'{part}' is not a number");
        }
    }
}
