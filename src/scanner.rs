/// Continuous access-point scanner.
///
/// Scanning is a persistent background state: as soon as one driver scan
/// completes and its results are materialized, the next scan is requested.
/// The main loop calls [`ScanEngine::poll`] every iteration; nothing here
/// blocks.
///
/// Results are rebuilt from scratch each cycle, de-duplicated by BSSID,
/// hidden SSIDs dropped or labeled, then stably sorted.
use crate::config::SortKey;
use crate::model::{ApList, ApRecord, SsidString, HIDDEN_LABEL};
use crate::radio::{Radio, RadioScanState, RawAp, RawScanList, ScanParams};

/// Outcome of one poll
#[derive(Debug, PartialEq, Eq)]
pub enum ScanStatus<'a> {
    /// Scanning is stopped
    NotStarted,
    InProgress,
    /// A cycle just completed; the next one has already been requested
    Done(&'a [ApRecord]),
}

pub struct ScanEngine {
    params: ScanParams,
    sort: SortKey,
    active: bool,
    results: ApList,
    raw: RawScanList,
    cycles: u32,
}

impl ScanEngine {
    pub const fn new() -> Self {
        Self {
            params: ScanParams {
                time_per_channel_ms: 300,
                show_hidden: true,
            },
            sort: SortKey::Rssi,
            active: false,
            results: ApList::new(),
            raw: RawScanList::new(),
            cycles: 0,
        }
    }

    /// Begin continuous scanning.
    pub fn start<R: Radio>(
        &mut self,
        radio: &mut R,
        scan_time_per_channel_ms: u32,
        show_hidden: bool,
    ) {
        self.params = ScanParams {
            time_per_channel_ms: scan_time_per_channel_ms,
            show_hidden,
        };
        self.active = true;
        log::info!(
            "WiFi scan started ({} ms/channel, hidden {})",
            scan_time_per_channel_ms,
            if show_hidden { "shown" } else { "filtered" }
        );
        self.request(radio);
    }

    /// Stop scanning. The last result set stays available.
    pub fn stop<R: Radio>(&mut self, radio: &mut R) {
        if self.active {
            radio.scan_stop();
            self.active = false;
            log::info!("WiFi scan stopped after {} cycles", self.cycles);
        }
    }

    /// Drive the scan state machine once.
    pub fn poll<R: Radio>(&mut self, radio: &mut R) -> ScanStatus<'_> {
        if !self.active {
            return ScanStatus::NotStarted;
        }
        match radio.scan_poll() {
            RadioScanState::NotStarted => {
                // Driver lost or rejected the request: ask again.
                self.request(radio);
                ScanStatus::InProgress
            }
            RadioScanState::Running => ScanStatus::InProgress,
            RadioScanState::Complete => {
                radio.scan_take(&mut self.raw);
                self.results = build_ap_list(&self.raw, self.params.show_hidden, self.sort);
                self.raw.clear();
                self.cycles = self.cycles.wrapping_add(1);
                log::debug!("Scan cycle {}: {} APs", self.cycles, self.results.len());
                self.request(radio);
                ScanStatus::Done(&self.results)
            }
        }
    }

    /// Scan parameters for subsequent cycles
    pub fn reconfigure(&mut self, scan_time_per_channel_ms: u32, show_hidden: bool) {
        self.params.time_per_channel_ms = scan_time_per_channel_ms;
        self.params.show_hidden = show_hidden;
    }

    /// Change the sort key, re-sorting the current results.
    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
        sort_stable(&mut self.results, sort);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn results(&self) -> &[ApRecord] {
        &self.results
    }

    /// Completed scan cycles since boot
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    fn request<R: Radio>(&mut self, radio: &mut R) {
        if let Err(e) = radio.scan_start(&self.params) {
            log::debug!("Scan start deferred: {}", e);
        }
    }
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert raw driver results into a sorted, de-duplicated AP list.
pub fn build_ap_list(raw: &[RawAp], show_hidden: bool, sort: SortKey) -> ApList {
    let mut list = ApList::new();
    for ap in raw {
        if ap.ssid.is_empty() && !show_hidden {
            continue;
        }
        if list.iter().any(|seen| seen.bssid == ap.bssid) {
            continue;
        }
        let ssid = if ap.ssid.is_empty() {
            SsidString::try_from(HIDDEN_LABEL).unwrap_or_default()
        } else {
            ap.ssid.clone()
        };
        let record = ApRecord {
            ssid,
            bssid: ap.bssid,
            channel: ap.channel,
            rssi: ap.rssi,
            encryption: ap.encryption,
        };
        if list.push(record).is_err() {
            break;
        }
    }
    sort_stable(&mut list, sort);
    list
}

/// Insertion sort: stable, in place, no allocator. AP lists are short.
pub fn sort_stable(list: &mut [ApRecord], key: SortKey) {
    for i in 1..list.len() {
        let mut j = i;
        while j > 0 && goes_before(&list[j], &list[j - 1], key) {
            list.swap(j, j - 1);
            j -= 1;
        }
    }
}

fn goes_before(a: &ApRecord, b: &ApRecord, key: SortKey) -> bool {
    match key {
        SortKey::Rssi => a.rssi > b.rssi,
        SortKey::Channel => a.channel < b.channel,
    }
}
