/// Serial NDJSON transport.
///
/// The device streams scan results, discovered stations and periodic status
/// as newline-delimited JSON. Host commands arrive on the same serial line,
/// accumulated byte-wise by [`LineReader`].
use crate::attack::{AttackSession, Orchestrator};
use crate::model::{ApRecord, MacAddress};
use crate::module::{Button, Module, WifiModule};
use crate::protocol::{DeviceMessage, HostCommand, RawCommand, VERSION};
use crate::radio::{Clock, Radio, Storage};

/// Serial baud rate
pub const SERIAL_BAUD: u32 = 115200;

/// Line buffer size for incoming commands
pub const MAX_CMD_LEN: usize = 128;

// ── Serialization helpers ──────────────────────────────────────────────

/// Serialize a DeviceMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written, or None if serialization failed.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                Some(len)
            }
        }
        Err(_) => None,
    }
}

/// Scan result message for one AP
pub fn ap_message(ap: &ApRecord, cycle: u32) -> DeviceMessage<'_> {
    DeviceMessage::Ap {
        ssid: &ap.ssid,
        bssid: ap.bssid,
        ch: ap.channel,
        rssi: ap.rssi,
        enc: ap.encryption.as_str(),
        cycle,
    }
}

/// Status message from an orchestrator snapshot.
///
/// `session` must come from `orch.session()`; it is passed in so the message
/// can borrow its strings.
pub fn status_message<'a, R: Radio, S: Storage, C: Clock>(
    orch: &Orchestrator<R, S, C>,
    session: &'a AttackSession,
    board: &'static str,
) -> DeviceMessage<'a> {
    DeviceMessage::Status {
        mode: session.mode.as_str(),
        scanning: orch.is_scanning(),
        aps: orch.results().len() as u8,
        target: session.target.as_ref().map(|t| &t.ssid),
        bssid: session.target.as_ref().map(|t| t.bssid),
        station: session.station,
        deauth: session.deauth_packets_sent,
        handshakes: session.handshakes_captured,
        stations: orch.sniffer().station_count() as u8,
        dropped: session.frames_dropped,
        capture: session.capture_path.as_deref(),
        uptime: (orch.uptime_ms() / 1000) as u32,
        board,
        version: VERSION,
    }
}

/// Deserialize a HostCommand from a JSON byte slice.
///
/// ```text
/// {"cmd":"press","button":"select"}    {"cmd":"press","code":3}
/// {"cmd":"status"}                     {"cmd":"stop"}
/// {"cmd":"set_reason","reason":1}      {"cmd":"set_scan_time","ms":500}
/// {"cmd":"set_hidden","enabled":false} {"cmd":"set_sort","key":"channel"}
/// {"cmd":"set_station","mac":"aa:bb:cc:dd:ee:ff"}
/// ```
///
/// `set_station` without `mac` goes back to broadcast. A malformed `mac`
/// becomes the zero address.
pub fn parse_command(data: &[u8]) -> Option<HostCommand> {
    // Strip trailing newline/whitespace
    let trimmed = trim_trailing_whitespace(data);
    if trimmed.is_empty() {
        return None;
    }
    let (raw, _) = serde_json_core::from_slice::<RawCommand>(trimmed).ok()?;
    match raw.cmd.as_str() {
        "press" => raw
            .button
            .or_else(|| raw.code.and_then(Button::from_code))
            .map(HostCommand::Press),
        "status" => Some(HostCommand::GetStatus),
        "stop" => Some(HostCommand::Stop),
        "set_reason" => raw.reason.map(|reason| HostCommand::SetReason { reason }),
        "set_scan_time" => raw.ms.map(|ms| HostCommand::SetScanTime { ms }),
        "set_hidden" => raw.enabled.map(|enabled| HostCommand::SetHidden { enabled }),
        "set_sort" => raw.key.map(|key| HostCommand::SetSort { key }),
        "set_station" => Some(HostCommand::SetStation {
            mac: raw.mac.as_deref().map(MacAddress::parse_lenient),
        }),
        _ => None,
    }
}

/// What the caller should do after a command was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    None,
    /// Send a status message now
    Status,
    /// The module asked to exit
    Exit,
}

/// Process a received host command and update state accordingly.
pub fn handle_command<R: Radio, S: Storage, C: Clock>(
    cmd: HostCommand,
    wifi: &mut WifiModule<R, S, C>,
) -> Reply {
    match cmd {
        HostCommand::Press(button) => {
            if wifi.handle_input(button) {
                Reply::None
            } else {
                Reply::Exit
            }
        }
        HostCommand::GetStatus => Reply::Status,
        HostCommand::Stop => {
            wifi.stop_attack();
            log::info!("Attack stopped by host command");
            Reply::Status
        }
        HostCommand::SetReason { reason } => {
            let orch = wifi.orchestrator_mut();
            let mut config = *orch.config();
            config.deauth_reason = reason;
            orch.set_config(config);
            log::info!("Deauth reason set to {}", reason);
            Reply::None
        }
        HostCommand::SetScanTime { ms } => {
            let orch = wifi.orchestrator_mut();
            let mut config = *orch.config();
            config.set_scan_time(ms);
            orch.set_config(config);
            log::info!("Scan time set to {} ms/channel", config.scan_time_ms);
            Reply::None
        }
        HostCommand::SetHidden { enabled } => {
            let orch = wifi.orchestrator_mut();
            let mut config = *orch.config();
            config.show_hidden = enabled;
            orch.set_config(config);
            log::info!("Hidden networks {}", if enabled { "shown" } else { "filtered" });
            Reply::None
        }
        HostCommand::SetSort { key } => {
            let orch = wifi.orchestrator_mut();
            let mut config = *orch.config();
            config.sort = key;
            orch.set_config(config);
            log::info!("Sort by {}", key.as_str());
            Reply::None
        }
        HostCommand::SetStation { mac } => match wifi.orchestrator_mut().select_station(mac) {
            Ok(()) => Reply::Status,
            Err(e) => {
                log::warn!("Station not set: {}", e);
                Reply::None
            }
        },
    }
}

// ── Serial NDJSON reader ───────────────────────────────────────────────

/// Serial NDJSON reader state machine.
/// Accumulates bytes until a newline is found, then yields the line.
pub struct LineReader {
    buf: [u8; MAX_CMD_LEN],
    pos: usize,
    overflow: bool,
}

impl LineReader {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_CMD_LEN],
            pos: 0,
            overflow: false,
        }
    }

    /// Feed a byte into the reader. Returns a complete line (without newline)
    /// when one is detected.
    pub fn feed(&mut self, byte: u8) -> Option<&[u8]> {
        if byte == b'\n' || byte == b'\r' {
            let complete = self.pos > 0 && !self.overflow;
            let len = self.pos;
            self.pos = 0;
            self.overflow = false;
            if complete {
                Some(&self.buf[..len])
            } else {
                None
            }
        } else if self.overflow {
            None
        } else if self.pos < self.buf.len() {
            self.buf[self.pos] = byte;
            self.pos += 1;
            None
        } else {
            // Overflow: discard the rest of this line
            self.overflow = true;
            None
        }
    }
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

fn trim_trailing_whitespace(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    while end > 0 && matches!(data[end - 1], b' ' | b'\n' | b'\r' | b'\t') {
        end -= 1;
    }
    &data[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::Mode;
    use crate::config::{SortKey, WifiConfig};
    use crate::module::View;
    use crate::testing::{leak_sniffer, FakeClock, MemStorage, MockRadio};

    type TestModule<'a> = WifiModule<MockRadio, MemStorage, &'a FakeClock>;

    fn module(clock: &FakeClock) -> TestModule<'_> {
        let mut m = WifiModule::new(Orchestrator::new(
            MockRadio::new(),
            MemStorage::new(),
            clock,
            leak_sniffer(),
            WifiConfig::default(),
        ));
        m.init();
        m
    }

    fn feed_line(reader: &mut LineReader, bytes: &[u8]) -> Option<std::vec::Vec<u8>> {
        let mut line = None;
        for &b in bytes {
            if let Some(l) = reader.feed(b) {
                line = Some(l.to_vec());
            }
        }
        line
    }

    // ── parse_command ───────────────────────────────────────────────

    #[test]
    fn parse_press_by_name_and_code() {
        assert_eq!(
            parse_command(br#"{"cmd":"press","button":"select"}"#),
            Some(HostCommand::Press(Button::Select))
        );
        assert_eq!(
            parse_command(br#"{"cmd":"press","code":3}"#),
            Some(HostCommand::Press(Button::Back))
        );
        assert_eq!(parse_command(br#"{"cmd":"press","code":9}"#), None);
        assert_eq!(parse_command(br#"{"cmd":"press"}"#), None);
    }

    #[test]
    fn parse_settings_commands() {
        assert_eq!(
            parse_command(br#"{"cmd":"set_reason","reason":1}"#),
            Some(HostCommand::SetReason { reason: 1 })
        );
        assert_eq!(
            parse_command(br#"{"cmd":"set_scan_time","ms":500}"#),
            Some(HostCommand::SetScanTime { ms: 500 })
        );
        assert_eq!(
            parse_command(br#"{"cmd":"set_hidden","enabled":false}"#),
            Some(HostCommand::SetHidden { enabled: false })
        );
        assert_eq!(
            parse_command(br#"{"cmd":"set_sort","key":"channel"}"#),
            Some(HostCommand::SetSort { key: SortKey::Channel })
        );
    }

    #[test]
    fn parse_trims_and_rejects_garbage() {
        assert_eq!(
            parse_command(b"{\"cmd\":\"status\"}\r\n"),
            Some(HostCommand::GetStatus)
        );
        assert_eq!(parse_command(br#"{"cmd":"stop"}"#), Some(HostCommand::Stop));
        assert_eq!(parse_command(b"   "), None);
        assert_eq!(parse_command(b"not json"), None);
        assert_eq!(parse_command(br#"{"cmd":"reboot"}"#), None);
        assert_eq!(parse_command(br#"{"cmd":"set_reason"}"#), None);
    }

    #[test]
    fn parse_set_station() {
        assert_eq!(
            parse_command(br#"{"cmd":"set_station","mac":"AA:BB:CC:DD:EE:FF"}"#),
            Some(HostCommand::SetStation {
                mac: Some(MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]))
            })
        );
        assert_eq!(
            parse_command(br#"{"cmd":"set_station","mac":"not-a-mac"}"#),
            Some(HostCommand::SetStation {
                mac: Some(MacAddress::ZERO)
            })
        );
        assert_eq!(
            parse_command(br#"{"cmd":"set_station"}"#),
            Some(HostCommand::SetStation { mac: None })
        );
    }

    // ── handle_command ──────────────────────────────────────────────

    #[test]
    fn press_drives_menu_and_reports_exit() {
        let clock = FakeClock::new();
        let mut m = module(&clock);
        assert_eq!(handle_command(HostCommand::Press(Button::Select), &mut m), Reply::None);
        assert_eq!(m.view(), &View::ScannerMenu { cursor: 0 });
        handle_command(HostCommand::Press(Button::Back), &mut m);
        assert_eq!(handle_command(HostCommand::Press(Button::Back), &mut m), Reply::Exit);
    }

    #[test]
    fn settings_commands_update_config() {
        let clock = FakeClock::new();
        let mut m = module(&clock);
        handle_command(HostCommand::SetReason { reason: 3 }, &mut m);
        handle_command(HostCommand::SetScanTime { ms: 5000 }, &mut m);
        handle_command(HostCommand::SetHidden { enabled: false }, &mut m);
        handle_command(HostCommand::SetSort { key: SortKey::Channel }, &mut m);
        let config = m.orchestrator().config();
        assert_eq!(config.deauth_reason, 3);
        assert_eq!(config.scan_time_ms, 1000);
        assert!(!config.show_hidden);
        assert_eq!(config.sort, SortKey::Channel);
    }

    #[test]
    fn stop_disarms() {
        let clock = FakeClock::new();
        let mut m = module(&clock);
        let orch = m.orchestrator_mut();
        orch.select_target(crate::model::ApRecord {
            ssid: "x".try_into().unwrap(),
            bssid: crate::model::MacAddress::new([1, 2, 3, 4, 5, 6]),
            channel: 1,
            rssi: -50,
            encryption: crate::model::Encryption::Open,
        })
        .unwrap();
        orch.arm(Mode::Mixed).unwrap();
        assert_eq!(handle_command(HostCommand::Stop, &mut m), Reply::Status);
        assert_eq!(m.orchestrator().mode(), Mode::Idle);
        assert!(!m.orchestrator().radio().promiscuous);
    }

    #[test]
    fn set_station_needs_target_then_aims_deauth() {
        let clock = FakeClock::new();
        let mut m = module(&clock);
        let sta = MacAddress::new([2, 4, 6, 8, 10, 12]);
        let cmd = || HostCommand::SetStation { mac: Some(sta) };
        assert_eq!(handle_command(cmd(), &mut m), Reply::None);
        assert_eq!(m.orchestrator().station(), None);

        m.orchestrator_mut()
            .select_target(crate::model::ApRecord {
                ssid: "x".try_into().unwrap(),
                bssid: MacAddress::new([1, 2, 3, 4, 5, 6]),
                channel: 1,
                rssi: -50,
                encryption: crate::model::Encryption::Open,
            })
            .unwrap();
        assert_eq!(handle_command(cmd(), &mut m), Reply::Status);
        assert_eq!(m.orchestrator().station(), Some(sta));
        handle_command(HostCommand::SetStation { mac: None }, &mut m);
        assert_eq!(m.orchestrator().station(), None);
    }

    // ── Messages ────────────────────────────────────────────────────

    #[test]
    fn status_from_session() {
        let clock = FakeClock::new();
        clock.advance_ms(61_500);
        let m = module(&clock);
        let session = m.orchestrator().session();
        let msg = status_message(m.orchestrator(), &session, "test_board");
        let mut buf = [0u8; 512];
        let len = serialize_message(&msg, &mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(json.ends_with('\n'));
        assert!(json.contains(r#""mode":"idle""#));
        assert!(json.contains(r#""uptime":61"#));
    }

    #[test]
    fn ap_message_fields() {
        let ap = crate::testing::raw_ap("cafe", 9, 11, -67);
        let record = crate::scanner::build_ap_list(&[ap], true, SortKey::Rssi);
        let msg = ap_message(&record[0], 2);
        let mut buf = [0u8; 256];
        let len = serialize_message(&msg, &mut buf).unwrap();
        let json = core::str::from_utf8(&buf[..len]).unwrap();
        assert!(json.contains(r#""bssid":"10:20:30:40:50:09""#));
        assert!(json.contains(r#""cycle":2"#));
    }

    #[test]
    fn serialize_fails_on_tiny_buffer() {
        let msg = DeviceMessage::Station {
            mac: crate::model::MacAddress::ZERO,
            bssid: crate::model::MacAddress::ZERO,
        };
        let mut buf = [0u8; 8];
        assert_eq!(serialize_message(&msg, &mut buf), None);
    }

    // ── LineReader ──────────────────────────────────────────────────

    #[test]
    fn line_reader_splits_on_newline() {
        let mut r = LineReader::new();
        assert_eq!(
            feed_line(&mut r, b"{\"cmd\":\"stop\"}\n"),
            Some(b"{\"cmd\":\"stop\"}".to_vec())
        );
        // Blank lines and CRLF pairs yield nothing extra
        assert_eq!(feed_line(&mut r, b"\r\n\n"), None);
    }

    #[test]
    fn line_reader_drops_overlong_line() {
        let mut r = LineReader::new();
        let long = [b'x'; MAX_CMD_LEN + 10];
        assert_eq!(feed_line(&mut r, &long), None);
        assert_eq!(feed_line(&mut r, b"\n"), None);
        assert_eq!(feed_line(&mut r, b"ok\n"), Some(b"ok".to_vec()));
    }
}
