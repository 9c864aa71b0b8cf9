/// Module lifecycle and the WiFi module's menu.
///
/// Every tool on the device is a [`Module`]: the host calls `init` when the
/// module is entered, `tick` on every main-loop iteration, `draw` on each UI
/// refresh, and `handle_input` per button press until it returns false.
///
/// Menu tree of [`WifiModule`]:
///
/// ```text
/// Top ─┬─ Scanner ─┬─ Start/Stop Scan
///      │           └─ View Results ── Details ── Targets ─┬─ Deauth ───────────┐
///      │                                                  ├─ Capture Handshake ├─ Attack
///      │                                                  ├─ Mixed ────────────┘
///      │                                                  └─ Scan Clients ── StationScan ── StationList
///      └─ Settings (scan time, show hidden, sort)
/// ```
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use serde::{Deserialize, Serialize};

use crate::attack::{Mode, Orchestrator};
use crate::display::{self, centered, item, row, Screen, ACCENT, ALERT, DIM, FG};
use crate::model::ApRecord;
use crate::protocol::VERSION;
use crate::radio::{Clock, Radio, Storage};

/// SSID characters shown per results row
const LIST_SSID_CHARS: usize = 14;

/// Blink half-period of the attack banner
const BLINK_MS: u64 = 500;

/// Physical or remote button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    Up,
    Scroll,
    Select,
    Back,
}

impl Button {
    /// Legacy single-byte button codes: 1 scroll, 2 select, 3 back.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Button::Scroll),
            2 => Some(Button::Select),
            3 => Some(Button::Back),
            _ => None,
        }
    }
}

pub trait Module {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Called when the module is entered. Resets navigation.
    fn init(&mut self);

    /// Non-blocking background work, once per main-loop iteration.
    fn tick(&mut self);

    fn draw<D: DrawTarget<Color = Rgb565>>(&self, display: &mut D);

    /// Returns false when the module wants to exit to the host menu.
    fn handle_input(&mut self, button: Button) -> bool;
}

const TOP_ITEMS: [&str; 2] = ["Scanner", "Settings"];
const SCANNER_ITEMS: usize = 2;
const SETTINGS_ITEMS: usize = 3;

/// Attack options offered for a selected target
pub const TARGET_OPTIONS: [(&str, Mode); 4] = [
    ("Deauth", Mode::Deauth),
    ("Capture Handshake", Mode::HandshakeCapture),
    ("Mixed", Mode::Mixed),
    ("Scan Clients", Mode::StationScan),
];

const SCAN_CLIENTS: usize = 3;
/// "Clients (n)" entry shown after the attack options once stations are known
const CLIENTS_ENTRY: usize = TARGET_OPTIONS.len();

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Top { cursor: usize },
    ScannerMenu { cursor: usize },
    Results { cursor: usize },
    Details { ap: ApRecord },
    Targets { cursor: usize },
    Attack,
    StationScan,
    StationList { cursor: usize },
    Settings { cursor: usize },
}

/// WiFi scanner and attack tool
pub struct WifiModule<R: Radio, S: Storage, C: Clock> {
    orch: Orchestrator<R, S, C>,
    view: View,
    /// Results cursor restored when backing out of details/targets
    results_cursor: usize,
    /// Last failure shown on the targets screen until the next press
    notice: Option<&'static str>,
}

impl<R: Radio, S: Storage, C: Clock> WifiModule<R, S, C> {
    pub fn new(orch: Orchestrator<R, S, C>) -> Self {
        Self {
            orch,
            view: View::Top { cursor: 0 },
            results_cursor: 0,
            notice: None,
        }
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn orchestrator(&self) -> &Orchestrator<R, S, C> {
        &self.orch
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator<R, S, C> {
        &mut self.orch
    }

    /// Stop any running attack and leave the live screens.
    pub fn stop_attack(&mut self) {
        self.orch.disarm();
        self.sync_view();
    }

    /// Live screens only make sense while armed
    fn sync_view(&mut self) {
        if self.orch.mode() != Mode::Idle {
            return;
        }
        match self.view {
            View::Attack => self.view = View::Targets { cursor: 0 },
            View::StationScan => self.view = View::Targets { cursor: SCAN_CLIENTS },
            _ => {}
        }
    }

    fn on_top(&mut self, cursor: usize, button: Button) -> bool {
        match button {
            Button::Up | Button::Scroll => {
                self.view = View::Top {
                    cursor: step(cursor, TOP_ITEMS.len(), button),
                }
            }
            Button::Select => {
                self.view = if cursor == 0 {
                    View::ScannerMenu { cursor: 0 }
                } else {
                    View::Settings { cursor: 0 }
                }
            }
            Button::Back => {
                self.orch.disarm();
                self.orch.stop_scan();
                log::info!("WiFi module exit");
                return false;
            }
        }
        true
    }

    fn on_scanner_menu(&mut self, cursor: usize, button: Button) {
        match button {
            Button::Up | Button::Scroll => {
                self.view = View::ScannerMenu {
                    cursor: step(cursor, SCANNER_ITEMS, button),
                }
            }
            Button::Select if cursor == 0 => {
                if self.orch.is_scanning() {
                    self.orch.stop_scan();
                } else {
                    self.orch.start_scan();
                }
            }
            Button::Select => {
                self.view = View::Results {
                    cursor: self.results_cursor,
                }
            }
            // Scanning keeps running in the background
            Button::Back => self.view = View::Top { cursor: 0 },
        }
    }

    fn on_results(&mut self, cursor: usize, button: Button) {
        let len = self.orch.results().len();
        let cursor = if len == 0 { 0 } else { cursor.min(len - 1) };
        match button {
            Button::Up | Button::Scroll => {
                self.view = View::Results {
                    cursor: step(cursor, len, button),
                }
            }
            Button::Select => {
                if let Some(ap) = self.orch.results().get(cursor) {
                    self.results_cursor = cursor;
                    self.view = View::Details { ap: ap.clone() };
                }
            }
            Button::Back => {
                self.results_cursor = cursor;
                self.view = View::ScannerMenu { cursor: 1 };
            }
        }
    }

    fn on_details(&mut self, ap: ApRecord, button: Button) {
        match button {
            Button::Select => match self.orch.select_target(ap) {
                Ok(()) => self.view = View::Targets { cursor: 0 },
                Err(e) => log::warn!("Target not selected: {}", e),
            },
            Button::Back => {
                self.view = View::Results {
                    cursor: self.results_cursor,
                }
            }
            Button::Up | Button::Scroll => {}
        }
    }

    fn on_targets(&mut self, cursor: usize, button: Button) {
        match button {
            Button::Up | Button::Scroll => {
                self.view = View::Targets {
                    cursor: step(cursor, self.target_entries(), button),
                }
            }
            Button::Select if cursor == CLIENTS_ENTRY => {
                if self.orch.sniffer().station_count() > 0 {
                    self.view = View::StationList { cursor: 0 };
                }
            }
            Button::Select => {
                let (_, mode) = TARGET_OPTIONS[cursor.min(TARGET_OPTIONS.len() - 1)];
                match self.orch.arm(mode) {
                    Ok(()) if mode == Mode::StationScan => self.view = View::StationScan,
                    Ok(()) => self.view = View::Attack,
                    Err(e) => {
                        log::warn!("Arm {} failed: {}", mode.as_str(), e);
                        self.notice = Some("Radio error, not armed");
                    }
                }
            }
            Button::Back => {
                self.view = View::Results {
                    cursor: self.results_cursor,
                }
            }
        }
    }

    fn on_station_list(&mut self, cursor: usize, button: Button) {
        let stations = self.orch.stations();
        match button {
            Button::Up | Button::Scroll => {
                self.view = View::StationList {
                    cursor: step(cursor, stations.len(), button),
                }
            }
            Button::Select => {
                if let Some(&mac) = stations.get(cursor) {
                    if let Err(e) = self.orch.select_station(Some(mac)) {
                        log::warn!("Station not selected: {}", e);
                    }
                    self.view = View::Targets { cursor: 0 };
                }
            }
            Button::Back => self.view = View::Targets { cursor: CLIENTS_ENTRY },
        }
    }

    /// Attack options plus the clients entry when stations were found
    fn target_entries(&self) -> usize {
        TARGET_OPTIONS.len() + usize::from(self.orch.sniffer().station_count() > 0)
    }

    fn on_settings(&mut self, cursor: usize, button: Button) {
        match button {
            Button::Up | Button::Scroll => {
                self.view = View::Settings {
                    cursor: step(cursor, SETTINGS_ITEMS, button),
                }
            }
            Button::Select => {
                let mut config = *self.orch.config();
                match cursor {
                    0 => config.step_scan_time(),
                    1 => config.show_hidden = !config.show_hidden,
                    _ => config.sort = config.sort.toggled(),
                }
                self.orch.set_config(config);
            }
            Button::Back => self.view = View::Top { cursor: 1 },
        }
    }

    // ── Rendering ───────────────────────────────────────────────────

    fn render<D: DrawTarget<Color = Rgb565>>(&self, target: &mut D) {
        let mut s = Screen::new(target);
        let (indicator, color) = if self.orch.mode() != Mode::Idle {
            ("[ARM]", ALERT)
        } else if self.orch.is_scanning() {
            ("[SCAN]", Rgb565::GREEN)
        } else {
            ("[IDLE]", DIM)
        };
        s.header(format_args!(" WIFI {}", self.title()), indicator, color);

        match &self.view {
            View::Top { cursor } => {
                for (i, name) in TOP_ITEMS.iter().enumerate() {
                    item!(s, i == *cursor, " {}", name);
                }
                s.divider();
                row!(s, DIM, " ESP-Chain v{}", VERSION);
            }
            View::ScannerMenu { cursor } => {
                let toggle = if self.orch.is_scanning() {
                    "Stop Scan"
                } else {
                    "Start Scan"
                };
                item!(s, *cursor == 0, " {}", toggle);
                item!(s, *cursor == 1, " View Results ({})", self.orch.results().len());
            }
            View::Results { cursor } => self.render_results(&mut s, *cursor),
            View::Details { ap } => {
                row!(s, ACCENT, " SSID: {}", ap.ssid);
                row!(s, FG, " BSSID: {}", ap.bssid);
                row!(s, FG, " Channel: {}", ap.channel);
                row!(s, FG, " RSSI: {} dBm", ap.rssi);
                row!(s, FG, " Encryption: {}", ap.encryption.as_str());
                s.divider();
                row!(s, DIM, " SELECT: attack options");
            }
            View::Targets { cursor } => self.render_targets(&mut s, *cursor),
            View::Attack => self.render_attack(&mut s),
            View::StationScan => {
                let channel = self.orch.target().map_or(0, |t| t.channel);
                row!(s, FG, " Scanning clients on ch {}", channel);
                row!(s, ACCENT, " Found: {}", self.orch.sniffer().station_count());
                s.divider();
                row!(s, DIM, " SELECT: list  BACK: stop");
            }
            View::StationList { cursor } => {
                let stations = self.orch.stations();
                if stations.is_empty() {
                    row!(s, DIM, " No clients found");
                }
                let visible = s.rows_left();
                let start = display::window_start(*cursor, visible);
                for (i, mac) in stations.iter().enumerate().skip(start).take(visible) {
                    let marker = if self.orch.station() == Some(*mac) {
                        "> "
                    } else {
                        "  "
                    };
                    item!(s, i == *cursor, "{}{}", marker, mac);
                }
            }
            View::Settings { cursor } => {
                let config = self.orch.config();
                item!(s, *cursor == 0, " Scan Time: {}ms", config.scan_time_ms);
                item!(
                    s,
                    *cursor == 1,
                    " Show Hidden: {}",
                    if config.show_hidden { "ON" } else { "OFF" }
                );
                item!(s, *cursor == 2, " Sort: {}", config.sort.as_str());
            }
        }
        s.blank_rest();
    }

    fn render_results<D: DrawTarget<Color = Rgb565>>(&self, s: &mut Screen<'_, D>, cursor: usize) {
        let results = self.orch.results();
        if results.is_empty() {
            row!(s, DIM, " No networks yet");
            return;
        }
        let visible = s.rows_left();
        let start = display::window_start(cursor, visible);
        for (i, ap) in results.iter().enumerate().skip(start).take(visible) {
            item!(
                s,
                i == cursor,
                " {:<14} {:>4}",
                display::truncate(&ap.ssid, LIST_SSID_CHARS),
                ap.rssi
            );
        }
    }

    fn render_targets<D: DrawTarget<Color = Rgb565>>(&self, s: &mut Screen<'_, D>, cursor: usize) {
        if let Some(target) = self.orch.target() {
            row!(s, ACCENT, " Target: {}", target.ssid);
        }
        match self.orch.station() {
            Some(mac) => row!(s, FG, " Station: {}", mac),
            None => row!(s, DIM, " Station: broadcast"),
        }
        s.divider();
        for (i, (label, _)) in TARGET_OPTIONS.iter().enumerate() {
            item!(s, i == cursor, " {}", label);
        }
        let found = self.orch.sniffer().station_count();
        if found > 0 {
            item!(s, cursor == CLIENTS_ENTRY, " Clients ({})", found);
        }
        if let Some(notice) = self.notice {
            row!(s, ALERT, " {}", notice);
        }
    }

    fn render_attack<D: DrawTarget<Color = Rgb565>>(&self, s: &mut Screen<'_, D>) {
        let session = self.orch.session();
        if let Some(target) = &session.target {
            row!(s, ACCENT, " Target: {}", target.ssid);
            row!(s, FG, " Channel: {}", target.channel);
            row!(s, FG, " BSSID: {}", target.bssid);
        }
        if session.mode.transmits() {
            row!(s, FG, " Deauth sent: {}", session.deauth_packets_sent);
        }
        if session.mode.captures() {
            row!(s, FG, " Handshakes: {}", session.handshakes_captured);
            match &session.capture_path {
                Some(path) => row!(s, DIM, " {}", path),
                None => row!(s, ALERT, " No capture file"),
            }
        }
        s.divider();
        if (self.orch.uptime_ms() / BLINK_MS) % 2 == 0 {
            centered!(s, ALERT, "ATTACK IN PROGRESS");
        } else {
            row!(s, ALERT, "");
        }
        row!(s, DIM, " BACK: stop");
    }

    fn title(&self) -> &'static str {
        match self.view {
            View::Top { .. } => "",
            View::ScannerMenu { .. } => "SCANNER",
            View::Results { .. } => "RESULTS",
            View::Details { .. } => "DETAILS",
            View::Targets { .. } => "TARGET",
            View::Attack => "ATTACK",
            View::StationScan => "CLIENT SCAN",
            View::StationList { .. } => "CLIENTS",
            View::Settings { .. } => "SETTINGS",
        }
    }
}

impl<R: Radio, S: Storage, C: Clock> Module for WifiModule<R, S, C> {
    fn name(&self) -> &'static str {
        "WiFi"
    }

    fn description(&self) -> &'static str {
        "Scan, deauth, handshake capture"
    }

    fn init(&mut self) {
        self.view = View::Top { cursor: 0 };
        self.results_cursor = 0;
        self.notice = None;
    }

    fn tick(&mut self) {
        self.orch.tick();
        self.sync_view();
    }

    fn draw<D: DrawTarget<Color = Rgb565>>(&self, display: &mut D) {
        self.render(display);
    }

    fn handle_input(&mut self, button: Button) -> bool {
        self.notice = None;
        match self.view.clone() {
            View::Top { cursor } => return self.on_top(cursor, button),
            View::ScannerMenu { cursor } => self.on_scanner_menu(cursor, button),
            View::Results { cursor } => self.on_results(cursor, button),
            View::Details { ap } => self.on_details(ap, button),
            View::Targets { cursor } => self.on_targets(cursor, button),
            View::Attack => {
                if button == Button::Back {
                    self.stop_attack();
                }
            }
            View::StationScan => match button {
                Button::Select => {
                    self.orch.disarm();
                    self.view = View::StationList { cursor: 0 };
                }
                Button::Back => self.stop_attack(),
                Button::Up | Button::Scroll => {}
            },
            View::StationList { cursor } => self.on_station_list(cursor, button),
            View::Settings { cursor } => self.on_settings(cursor, button),
        }
        true
    }
}

/// Wrap-around cursor movement over `len` entries
fn step(cursor: usize, len: usize, button: Button) -> usize {
    if len == 0 {
        return 0;
    }
    match button {
        Button::Up => (cursor + len - 1) % len,
        Button::Scroll => (cursor + 1) % len,
        _ => cursor,
    }
}
