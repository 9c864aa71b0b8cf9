/// PCAP capture file writer.
///
/// Classic libpcap layout, little-endian, link type 105 (raw 802.11):
///
/// ```text
/// global header (24 B, once at offset 0)
///   magic a1b2c3d4 | ver 2.4 | thiszone 0 | sigfigs 0 | snaplen 65535 | network 105
/// per record (16 B + frame)
///   ts_sec | ts_usec | incl_len | orig_len | frame bytes
/// ```
///
/// Every append reopens the file, writes one record and closes it again, so
/// a card pulled mid-session loses at most the record being written.
use core::fmt::Write;

use heapless::String;
use thiserror::Error;

use crate::radio::{Storage, StorageError};

/// Directory all capture files live in
pub const CAPTURE_DIR: &str = "/capture";

pub const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
pub const PCAP_VERSION_MAJOR: u16 = 2;
pub const PCAP_VERSION_MINOR: u16 = 4;
pub const PCAP_SNAPLEN: u32 = 65535;
/// DLT_IEEE802_11
pub const LINKTYPE_IEEE802_11: u32 = 105;

pub const GLOBAL_HEADER_LEN: usize = 24;
pub const RECORD_HEADER_LEN: usize = 16;

/// SSID characters kept in a capture file name
const SSID_NAME_CHARS: usize = 15;

pub type PathString = String<128>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("capture file already exists")]
    Exists,
    #[error("capture path too long")]
    PathTooLong,
    #[error("frame larger than snaplen")]
    FrameTooLarge,
}

/// 24-byte PCAP global header
pub fn global_header() -> [u8; GLOBAL_HEADER_LEN] {
    let mut h = [0u8; GLOBAL_HEADER_LEN];
    h[0..4].copy_from_slice(&PCAP_MAGIC.to_le_bytes());
    h[4..6].copy_from_slice(&PCAP_VERSION_MAJOR.to_le_bytes());
    h[6..8].copy_from_slice(&PCAP_VERSION_MINOR.to_le_bytes());
    h[8..12].copy_from_slice(&0i32.to_le_bytes()); // thiszone
    h[12..16].copy_from_slice(&0u32.to_le_bytes()); // sigfigs
    h[16..20].copy_from_slice(&PCAP_SNAPLEN.to_le_bytes());
    h[20..24].copy_from_slice(&LINKTYPE_IEEE802_11.to_le_bytes());
    h
}

/// 16-byte record header for a frame captured at `micros` since boot
pub fn record_header(micros: u64, len: u32) -> [u8; RECORD_HEADER_LEN] {
    let ts_sec = (micros / 1_000_000) as u32;
    let ts_usec = (micros % 1_000_000) as u32;
    let mut h = [0u8; RECORD_HEADER_LEN];
    h[0..4].copy_from_slice(&ts_sec.to_le_bytes());
    h[4..8].copy_from_slice(&ts_usec.to_le_bytes());
    h[8..12].copy_from_slice(&len.to_le_bytes());
    h[12..16].copy_from_slice(&len.to_le_bytes());
    h
}

/// `/capture/<ssid>_<millis>.pcap`, spaces and slashes in the SSID replaced
/// with underscores and the SSID cut to 15 characters.
pub fn capture_path(ssid: &str, millis: u64) -> Result<PathString, CaptureError> {
    let mut path = PathString::new();
    write!(path, "{}/", CAPTURE_DIR).map_err(|_| CaptureError::PathTooLong)?;
    for c in ssid.chars().take(SSID_NAME_CHARS) {
        let c = if c == ' ' || c == '/' { '_' } else { c };
        path.push(c).map_err(|_| CaptureError::PathTooLong)?;
    }
    write!(path, "_{}.pcap", millis).map_err(|_| CaptureError::PathTooLong)?;
    Ok(path)
}

/// An open capture session: the path every record of the session goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFile {
    path: PathString,
    records: u32,
}

impl CaptureFile {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Records successfully appended
    pub fn records(&self) -> u32 {
        self.records
    }
}

/// Writes PCAP files through the injected storage backend.
pub struct PcapWriter<S: Storage> {
    storage: S,
    failures: u32,
}

impl<S: Storage> PcapWriter<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            failures: 0,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Open/append failures since boot
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Create a new capture file and write its global header.
    ///
    /// Refuses an existing path so the header can never land mid-file.
    pub fn open(&mut self, path: &str) -> Result<CaptureFile, CaptureError> {
        let result = self.try_open(path);
        if result.is_err() {
            self.failures += 1;
        }
        result
    }

    fn try_open(&mut self, path: &str) -> Result<CaptureFile, CaptureError> {
        if !self.storage.exists(CAPTURE_DIR) {
            self.storage.mkdir(CAPTURE_DIR)?;
        }
        if self.storage.exists(path) {
            return Err(CaptureError::Exists);
        }
        let path = PathString::try_from(path).map_err(|_| CaptureError::PathTooLong)?;
        self.write_parts(&path, &[&global_header()])?;
        log::info!("Capture file opened: {}", path);
        Ok(CaptureFile { path, records: 0 })
    }

    /// Append one frame as a PCAP record stamped `micros` since boot.
    pub fn append(
        &mut self,
        file: &mut CaptureFile,
        frame: &[u8],
        micros: u64,
    ) -> Result<(), CaptureError> {
        if frame.len() > PCAP_SNAPLEN as usize {
            self.failures += 1;
            return Err(CaptureError::FrameTooLarge);
        }
        let header = record_header(micros, frame.len() as u32);
        match self.write_parts(&file.path, &[&header, frame]) {
            Ok(()) => {
                file.records += 1;
                Ok(())
            }
            Err(e) => {
                self.failures += 1;
                Err(e)
            }
        }
    }

    fn write_parts(&mut self, path: &str, parts: &[&[u8]]) -> Result<(), CaptureError> {
        let mut handle = self.storage.open_append(path)?;
        let written = parts
            .iter()
            .try_for_each(|part| self.storage.write(&mut handle, part));
        let closed = self.storage.close(handle);
        written?;
        closed?;
        Ok(())
    }
}
