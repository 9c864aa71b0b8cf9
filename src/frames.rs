/// 802.11 deauthentication frame construction.
///
/// The frame is a fixed 26-byte management template. Only the three
/// address fields and the reason code change between sessions.
///
/// ```text
///  0      2      4          10         16         22     24     26
///  | FC   | Dur  | Addr1 DA | Addr2 SA | Addr3    | Seq  | Rsn  |
///  | C0 00| 3A 01| station  | BSSID    | BSSID    | 00 00| LE16 |
/// ```
use crate::model::MacAddress;
use crate::radio::{Radio, RadioError};

/// Frame length in bytes
pub const DEAUTH_LEN: usize = 26;

/// Reason 7: class 3 frame received from nonassociated station
pub const DEFAULT_REASON: u16 = 7;

const ADDR1: usize = 4;
const ADDR2: usize = 10;
const ADDR3: usize = 16;
const REASON: usize = 24;

const TEMPLATE: [u8; DEAUTH_LEN] = [
    0xC0, 0x00, // Frame control: management, subtype deauthentication
    0x3A, 0x01, // Duration
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // Destination
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // Source
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // BSSID
    0x00, 0x00, // Sequence control
    0x07, 0x00, // Reason code
];

/// Build the raw deauthentication frame.
///
/// Destination is `station` when given, broadcast otherwise. `channel` is
/// not encoded in the frame; it is checked against the radio at transmit
/// time by [`DeauthFrame::transmit`].
pub fn build_deauth(
    bssid: MacAddress,
    station: Option<MacAddress>,
    channel: u8,
    reason: u16,
) -> [u8; DEAUTH_LEN] {
    debug_assert!(crate::radio::is_valid_channel(channel));
    let mut frame = TEMPLATE;
    let dest = station.unwrap_or(MacAddress::BROADCAST);
    frame[ADDR1..ADDR1 + 6].copy_from_slice(&dest.0);
    frame[ADDR2..ADDR2 + 6].copy_from_slice(&bssid.0);
    frame[ADDR3..ADDR3 + 6].copy_from_slice(&bssid.0);
    frame[REASON..REASON + 2].copy_from_slice(&reason.to_le_bytes());
    frame
}

/// A pre-built deauth frame bound to the channel it must be sent on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeauthFrame {
    bytes: [u8; DEAUTH_LEN],
    channel: u8,
}

impl DeauthFrame {
    pub fn new(bssid: MacAddress, station: Option<MacAddress>, channel: u8, reason: u16) -> Self {
        Self {
            bytes: build_deauth(bssid, station, channel, reason),
            channel,
        }
    }

    pub fn as_bytes(&self) -> &[u8; DEAUTH_LEN] {
        &self.bytes
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn destination(&self) -> MacAddress {
        MacAddress::from_slice(&self.bytes[ADDR1..]).unwrap_or(MacAddress::BROADCAST)
    }

    pub fn bssid(&self) -> MacAddress {
        MacAddress::from_slice(&self.bytes[ADDR3..]).unwrap_or(MacAddress::ZERO)
    }

    pub fn reason(&self) -> u16 {
        u16::from_le_bytes([self.bytes[REASON], self.bytes[REASON + 1]])
    }

    /// Retarget the frame at a specific station, or broadcast with `None`.
    pub fn set_station(&mut self, station: Option<MacAddress>) {
        let dest = station.unwrap_or(MacAddress::BROADCAST);
        self.bytes[ADDR1..ADDR1 + 6].copy_from_slice(&dest.0);
    }

    pub fn set_reason(&mut self, reason: u16) {
        self.bytes[REASON..REASON + 2].copy_from_slice(&reason.to_le_bytes());
    }

    /// Send the frame once. The radio must already be on `self.channel()`.
    pub fn transmit<R: Radio>(&self, radio: &mut R) -> Result<(), RadioError> {
        let actual = radio.channel();
        if actual != self.channel {
            return Err(RadioError::ChannelMismatch {
                expected: self.channel,
                actual,
            });
        }
        radio.transmit_raw(&self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRadio;

    const BSSID: MacAddress = MacAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    const STA: MacAddress = MacAddress::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

    #[test]
    fn broadcast_frame_matches_reference_bytes() {
        let frame = build_deauth(BSSID, None, 6, 7);
        assert_eq!(
            frame,
            [
                0xC0, 0x00, 0x3A, 0x01, //
                0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, //
                0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, //
                0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, //
                0x00, 0x00, 0x07, 0x00,
            ]
        );
    }

    #[test]
    fn station_becomes_destination() {
        let frame = build_deauth(BSSID, Some(STA), 1, DEFAULT_REASON);
        assert_eq!(&frame[4..10], &STA.0);
        assert_eq!(&frame[10..16], &BSSID.0);
        assert_eq!(&frame[16..22], &BSSID.0);
    }

    #[test]
    fn reason_is_little_endian() {
        let frame = build_deauth(BSSID, None, 1, 0x0102);
        assert_eq!(&frame[24..26], &[0x02, 0x01]);
    }

    #[test]
    fn invariant_bytes_never_change() {
        let a = build_deauth(BSSID, Some(STA), 11, 3);
        let b = build_deauth(MacAddress::ZERO, None, 1, 7);
        assert_eq!(a[..4], b[..4]);
        assert_eq!(a[22..24], b[22..24]);
    }

    #[test]
    fn mutate_station_and_reason() {
        let mut frame = DeauthFrame::new(BSSID, None, 6, DEFAULT_REASON);
        assert!(frame.destination().is_broadcast());
        frame.set_station(Some(STA));
        assert_eq!(frame.destination(), STA);
        frame.set_reason(1);
        assert_eq!(frame.reason(), 1);
        assert_eq!(frame.bssid(), BSSID);
        frame.set_station(None);
        assert!(frame.destination().is_broadcast());
    }

    #[test]
    fn transmit_refuses_wrong_channel() {
        let mut radio = MockRadio::new();
        radio.set_channel(3).unwrap();
        let frame = DeauthFrame::new(BSSID, None, 6, DEFAULT_REASON);
        assert_eq!(
            frame.transmit(&mut radio),
            Err(RadioError::ChannelMismatch { expected: 6, actual: 3 })
        );
        assert!(radio.transmitted.is_empty());

        radio.set_channel(6).unwrap();
        frame.transmit(&mut radio).unwrap();
        assert_eq!(radio.transmitted.len(), 1);
        assert_eq!(radio.transmitted[0], frame.as_bytes().to_vec());
    }
}
