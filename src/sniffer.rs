/// Promiscuous-mode frame classifier.
///
/// [`Sniffer::on_frame`] runs in the WiFi driver's receive context,
/// concurrently with the main loop. It never allocates, never logs and never
/// blocks: counters are atomics, the station set and target BSSID sit behind
/// a short critical section, and handshake frames are handed to the main
/// loop through a bounded channel (`try_send`, dropped and counted when full).
///
/// The orchestrator binds the sniffer to a target before enabling
/// promiscuous mode and revokes the binding before disabling it, so a frame
/// that races with disarm sees no active classification and is ignored.
use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use critical_section::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

use crate::model::{MacAddress, StationList};
use crate::radio::PacketKind;

/// Largest frame the capture queue will hold
pub const MAX_CAPTURE_FRAME: usize = 1600;

/// Frames buffered between the callback and the next main-loop drain
pub const CAPTURE_QUEUE_DEPTH: usize = 8;

/// Station discovery needs the full 3-address header
const MIN_STATION_FRAME: usize = 24;

/// EtherType for EAPOL (802.1X), as it appears on the wire
const EAPOL_ETHERTYPE: [u8; 2] = [0x88, 0x8E];

pub type CapturedFrame = Vec<u8, MAX_CAPTURE_FRAME>;

type FrameChannel = Channel<CriticalSectionRawMutex, CapturedFrame, CAPTURE_QUEUE_DEPTH>;

const FLAG_STATIONS: u8 = 0b01;
const FLAG_HANDSHAKE: u8 = 0b10;

/// Which classifications the bound session wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classify {
    pub stations: bool,
    pub handshakes: bool,
}

impl Classify {
    fn bits(self) -> u8 {
        let mut bits = 0;
        if self.stations {
            bits |= FLAG_STATIONS;
        }
        if self.handshakes {
            bits |= FLAG_HANDSHAKE;
        }
        bits
    }
}

/// Receive-side context shared between the driver callback and the orchestrator.
pub struct Sniffer {
    flags: AtomicU8,
    target: Mutex<Cell<MacAddress>>,
    stations: Mutex<RefCell<StationList>>,
    handshakes: AtomicU32,
    data_frames: AtomicU32,
    dropped: AtomicU32,
    queue: FrameChannel,
}

impl Sniffer {
    pub const fn new() -> Self {
        Self {
            flags: AtomicU8::new(0),
            target: Mutex::new(Cell::new(MacAddress::ZERO)),
            stations: Mutex::new(RefCell::new(Vec::new())),
            handshakes: AtomicU32::new(0),
            data_frames: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            queue: Channel::new(),
        }
    }

    /// Driver receive hook. Safe to call from ISR or driver-task context.
    pub fn on_frame(&self, payload: &[u8], kind: PacketKind) {
        if kind != PacketKind::Data {
            return;
        }
        let flags = self.flags.load(Ordering::Acquire);
        if flags == 0 {
            return;
        }
        self.data_frames.fetch_add(1, Ordering::Relaxed);

        if flags & FLAG_STATIONS != 0 {
            let target = critical_section::with(|cs| self.target.borrow(cs).get());
            if let Some(station) = station_candidate(payload, target) {
                critical_section::with(|cs| {
                    let mut set = self.stations.borrow(cs).borrow_mut();
                    if !set.contains(&station) {
                        // Full set: further stations are ignored
                        let _ = set.push(station);
                    }
                });
            }
        }

        if flags & FLAG_HANDSHAKE != 0 && find_eapol(payload).is_some() {
            self.handshakes.fetch_add(1, Ordering::Relaxed);
            let queued = CapturedFrame::from_slice(payload)
                .ok()
                .map(|frame| self.queue.try_send(frame).is_ok())
                .unwrap_or(false);
            if !queued {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Attach the sniffer to a target. Must happen before promiscuous mode is enabled.
    pub(crate) fn bind(&self, target: MacAddress, classify: Classify) {
        critical_section::with(|cs| self.target.borrow(cs).set(target));
        self.flags.store(classify.bits(), Ordering::Release);
    }

    /// Stop classifying. Frames delivered after this are ignored.
    pub(crate) fn revoke(&self) {
        self.flags.store(0, Ordering::Release);
    }

    pub fn is_bound(&self) -> bool {
        self.flags.load(Ordering::Acquire) != 0
    }

    pub(crate) fn clear_stations(&self) {
        critical_section::with(|cs| self.stations.borrow(cs).borrow_mut().clear());
    }

    pub(crate) fn reset_counters(&self) {
        self.handshakes.store(0, Ordering::Relaxed);
        self.data_frames.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
    }

    /// Snapshot of discovered stations in discovery order
    pub fn stations(&self) -> StationList {
        critical_section::with(|cs| self.stations.borrow(cs).borrow().clone())
    }

    pub fn station_count(&self) -> usize {
        critical_section::with(|cs| self.stations.borrow(cs).borrow().len())
    }

    pub fn handshakes(&self) -> u32 {
        self.handshakes.load(Ordering::Relaxed)
    }

    /// Data frames classified since the last arm
    pub fn data_frames(&self) -> u32 {
        self.data_frames.load(Ordering::Relaxed)
    }

    /// Handshake frames that could not be queued for storage
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Pop the next queued handshake frame (main loop only).
    pub(crate) fn take_frame(&self) -> Option<CapturedFrame> {
        self.queue.try_receive().ok()
    }

    pub(crate) fn clear_queue(&self) {
        self.queue.clear();
    }
}

impl Default for Sniffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Station evidence: addr1 or addr2 is the target, the other one is a station.
///
/// Exactly one of the two addresses must equal `bssid`; the other must not
/// be broadcast-prefixed. Returns the station address.
pub fn station_candidate(payload: &[u8], bssid: MacAddress) -> Option<MacAddress> {
    if payload.len() <= MIN_STATION_FRAME {
        return None;
    }
    let addr1 = MacAddress::from_slice(&payload[4..10])?;
    let addr2 = MacAddress::from_slice(&payload[10..16])?;

    let other = if addr1 == bssid && addr2 != bssid {
        addr2
    } else if addr2 == bssid && addr1 != bssid {
        addr1
    } else {
        return None;
    };

    if other.is_broadcast_prefixed() {
        return None;
    }
    Some(other)
}

/// Offset of the first EAPOL EtherType in `payload`.
///
/// A raw byte-pattern scan over offsets `0..len-4`, not a header parse, so
/// coincidental `88 8E` sequences also match. Kept as-is for compatibility
/// with captures taken by earlier firmware.
pub fn find_eapol(payload: &[u8]) -> Option<usize> {
    payload
        .windows(2)
        .take(payload.len().saturating_sub(4))
        .position(|w| w == EAPOL_ETHERTYPE)
}
