//! In-memory capability doubles for unit tests.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::string::{String, ToString};
use std::vec::Vec;

use crate::model::{Encryption, MacAddress, SsidString};
use crate::radio::{
    Clock, PacketKind, Radio, RadioError, RadioScanState, RawAp, RawScanList, ScanParams, Storage,
    StorageError,
};
use crate::sniffer::Sniffer;

pub fn raw_ap(ssid: &str, last: u8, channel: u8, rssi: i8) -> RawAp {
    RawAp {
        ssid: SsidString::try_from(ssid).unwrap(),
        bssid: MacAddress::new([0x10, 0x20, 0x30, 0x40, 0x50, last]),
        channel,
        rssi,
        encryption: Encryption::Wpa2,
    }
}

pub fn leak_sniffer() -> &'static Sniffer {
    Box::leak(Box::new(Sniffer::new()))
}

/// Minimal 32-byte data frame with the given addr1/addr2.
pub fn data_frame(addr1: MacAddress, addr2: MacAddress) -> Vec<u8> {
    let mut f = vec![0u8; 32];
    f[0] = 0x08;
    f[4..10].copy_from_slice(&addr1.0);
    f[10..16].copy_from_slice(&addr2.0);
    f[16..22].copy_from_slice(&addr2.0);
    f
}

/// QoS data frame from `bssid` to `station` carrying an EAPOL payload.
pub fn eapol_frame(station: MacAddress, bssid: MacAddress) -> Vec<u8> {
    let mut f = vec![0u8; 48];
    f[0] = 0x88;
    f[4..10].copy_from_slice(&station.0);
    f[10..16].copy_from_slice(&bssid.0);
    f[16..22].copy_from_slice(&bssid.0);
    f[26..34].copy_from_slice(&[0xAA, 0xAA, 0x03, 0x00, 0x00, 0x00, 0x88, 0x8E]);
    f
}

#[derive(Default)]
pub struct MockRadio {
    pub channel: u8,
    pub promiscuous: bool,
    pub sniffer: Option<&'static Sniffer>,
    pub transmitted: Vec<Vec<u8>>,
    pub scan_state: Option<RadioScanState>,
    pub scan_starts: Vec<ScanParams>,
    pub scan_stops: u32,
    pub pending: Vec<RawAp>,
    pub fail_scan_start: bool,
    pub fail_promiscuous: bool,
    pub fail_channel: bool,
}

impl MockRadio {
    pub fn new() -> Self {
        Self {
            channel: 1,
            ..Default::default()
        }
    }

    /// Finish the running scan with `results`.
    pub fn complete_scan(&mut self, results: Vec<RawAp>) {
        self.pending = results;
        self.scan_state = Some(RadioScanState::Complete);
    }

    /// Deliver a data frame the way the driver callback would.
    pub fn deliver(&self, frame: &[u8]) {
        if self.promiscuous {
            if let Some(sniffer) = self.sniffer {
                sniffer.on_frame(frame, PacketKind::Data);
            }
        }
    }
}

impl Radio for MockRadio {
    fn set_channel(&mut self, channel: u8) -> Result<(), RadioError> {
        if self.fail_channel || !crate::radio::is_valid_channel(channel) {
            return Err(RadioError::InvalidChannel(channel));
        }
        self.channel = channel;
        Ok(())
    }

    fn channel(&self) -> u8 {
        self.channel
    }

    fn set_promiscuous(&mut self, sniffer: Option<&'static Sniffer>) -> Result<(), RadioError> {
        if sniffer.is_some() && self.fail_promiscuous {
            return Err(RadioError::Promiscuous);
        }
        self.promiscuous = sniffer.is_some();
        self.sniffer = sniffer;
        Ok(())
    }

    fn transmit_raw(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        self.transmitted.push(frame.to_vec());
        Ok(())
    }

    fn scan_start(&mut self, params: &ScanParams) -> Result<(), RadioError> {
        self.scan_starts.push(*params);
        if self.fail_scan_start {
            return Err(RadioError::Scan);
        }
        self.scan_state = Some(RadioScanState::Running);
        Ok(())
    }

    fn scan_poll(&mut self) -> RadioScanState {
        self.scan_state.unwrap_or(RadioScanState::NotStarted)
    }

    fn scan_take(&mut self, out: &mut RawScanList) {
        out.clear();
        for ap in self.pending.drain(..) {
            let _ = out.push(ap);
        }
        self.scan_state = None;
    }

    fn scan_stop(&mut self) {
        self.scan_stops += 1;
        self.scan_state = None;
        self.pending.clear();
    }
}

#[derive(Default)]
pub struct MemStorage {
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: Vec<String>,
    pub opens: u32,
    pub open_handles: u32,
    pub fail_writes: bool,
    pub fail_opens: bool,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self, path: &str) -> Option<&Vec<u8>> {
        self.files.get(path)
    }
}

impl Storage for MemStorage {
    type File = String;

    fn exists(&mut self, path: &str) -> bool {
        self.files.contains_key(path) || self.dirs.iter().any(|d| d == path)
    }

    fn mkdir(&mut self, path: &str) -> Result<(), StorageError> {
        self.dirs.push(path.to_string());
        Ok(())
    }

    fn open_append(&mut self, path: &str) -> Result<String, StorageError> {
        if self.fail_opens {
            return Err(StorageError::Open);
        }
        self.opens += 1;
        self.open_handles += 1;
        self.files.entry(path.to_string()).or_default();
        Ok(path.to_string())
    }

    fn write(&mut self, file: &mut String, bytes: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Write);
        }
        self.files
            .get_mut(file.as_str())
            .ok_or(StorageError::Write)?
            .extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self, _file: String) -> Result<(), StorageError> {
        self.open_handles -= 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeClock {
    micros: Cell<u64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.micros.set(self.micros.get() + ms * 1000);
    }
}

impl Clock for FakeClock {
    fn now_micros(&self) -> u64 {
        self.micros.get()
    }
}
