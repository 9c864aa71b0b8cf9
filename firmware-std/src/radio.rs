//! ESP-IDF WiFi driver behind the engine's `Radio` trait.
//!
//! Scans use the driver's non-blocking scan API; channel, promiscuous mode
//! and raw transmit go straight to the `esp_wifi_*` calls.

use std::ffi::c_void;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::time::Duration;

use esp_idf_svc::sys::{
    esp, esp_wifi_80211_tx, esp_wifi_set_channel, esp_wifi_set_promiscuous,
    esp_wifi_set_promiscuous_filter, esp_wifi_set_promiscuous_rx_cb,
    wifi_interface_t_WIFI_IF_STA, wifi_promiscuous_filter_t, wifi_promiscuous_pkt_t,
    wifi_promiscuous_pkt_type_t, wifi_promiscuous_pkt_type_t_WIFI_PKT_CTRL,
    wifi_promiscuous_pkt_type_t_WIFI_PKT_DATA, wifi_promiscuous_pkt_type_t_WIFI_PKT_MGMT,
    wifi_second_chan_t_WIFI_SECOND_CHAN_NONE, WIFI_PROMIS_FILTER_MASK_DATA,
};
use esp_idf_svc::wifi::{AccessPointInfo, AuthMethod, EspWifi, ScanConfig, ScanType};

use espchain::model::{Encryption, MacAddress, SsidString, MAX_APS};
use espchain::radio::{
    is_valid_channel, PacketKind, Radio, RadioError, RadioScanState, RawAp, RawScanList,
    ScanParams,
};
use espchain::sniffer::Sniffer;

/// Receive context the driver callback forwards to. Null while promiscuous
/// mode is off.
static RX_SNIFFER: AtomicPtr<Sniffer> = AtomicPtr::new(std::ptr::null_mut());

/// WiFi promiscuous mode callback.
///
/// Runs in the WiFi driver task context and must not block; `Sniffer::on_frame`
/// only touches atomics, a short critical section and a `try_send`.
unsafe extern "C" fn promisc_rx_cb(buf: *mut c_void, pkt_type: wifi_promiscuous_pkt_type_t) {
    let sniffer = RX_SNIFFER.load(Ordering::Acquire);
    if sniffer.is_null() || buf.is_null() {
        return;
    }

    let pkt = unsafe { &*(buf as *const wifi_promiscuous_pkt_t) };
    let sig_len = pkt.rx_ctrl.sig_len() as usize;
    if sig_len == 0 {
        return;
    }

    // Safety: payload is `sig_len` bytes starting at pkt.payload
    let payload = unsafe { std::slice::from_raw_parts(pkt.payload.as_ptr(), sig_len) };

    let kind = match pkt_type {
        wifi_promiscuous_pkt_type_t_WIFI_PKT_MGMT => PacketKind::Management,
        wifi_promiscuous_pkt_type_t_WIFI_PKT_CTRL => PacketKind::Control,
        wifi_promiscuous_pkt_type_t_WIFI_PKT_DATA => PacketKind::Data,
        _ => PacketKind::Misc,
    };

    // Safety: only `&'static Sniffer`s are ever stored
    unsafe { &*sniffer }.on_frame(payload, kind);
}

pub struct EspRadio {
    wifi: EspWifi<'static>,
    channel: u8,
    scanning: bool,
}

impl EspRadio {
    /// Wrap a started STA-mode driver.
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self {
            wifi,
            channel: 1,
            scanning: false,
        }
    }
}

impl Radio for EspRadio {
    fn set_channel(&mut self, channel: u8) -> Result<(), RadioError> {
        if !is_valid_channel(channel) {
            return Err(RadioError::InvalidChannel(channel));
        }
        esp!(unsafe { esp_wifi_set_channel(channel, wifi_second_chan_t_WIFI_SECOND_CHAN_NONE) })
            .map_err(|e| {
                log::warn!("esp_wifi_set_channel({}): {}", channel, e);
                RadioError::InvalidChannel(channel)
            })?;
        self.channel = channel;
        Ok(())
    }

    fn channel(&self) -> u8 {
        self.channel
    }

    fn set_promiscuous(&mut self, sniffer: Option<&'static Sniffer>) -> Result<(), RadioError> {
        match sniffer {
            Some(sniffer) => {
                RX_SNIFFER.store(sniffer as *const Sniffer as *mut Sniffer, Ordering::Release);
                let filter = wifi_promiscuous_filter_t {
                    filter_mask: WIFI_PROMIS_FILTER_MASK_DATA,
                };
                let enabled = unsafe {
                    esp!(esp_wifi_set_promiscuous_filter(&filter))
                        .and_then(|_| esp!(esp_wifi_set_promiscuous_rx_cb(Some(promisc_rx_cb))))
                        .and_then(|_| esp!(esp_wifi_set_promiscuous(true)))
                };
                if let Err(e) = enabled {
                    RX_SNIFFER.store(std::ptr::null_mut(), Ordering::Release);
                    log::warn!("Promiscuous enable: {}", e);
                    return Err(RadioError::Promiscuous);
                }
            }
            None => {
                let disabled = esp!(unsafe { esp_wifi_set_promiscuous(false) });
                RX_SNIFFER.store(std::ptr::null_mut(), Ordering::Release);
                disabled.map_err(|_| RadioError::Promiscuous)?;
            }
        }
        Ok(())
    }

    fn transmit_raw(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        esp!(unsafe {
            esp_wifi_80211_tx(
                wifi_interface_t_WIFI_IF_STA,
                frame.as_ptr() as *const c_void,
                frame.len() as i32,
                false,
            )
        })
        .map_err(|_| RadioError::Transmit)
    }

    fn scan_start(&mut self, params: &ScanParams) -> Result<(), RadioError> {
        let dwell = Duration::from_millis(u64::from(params.time_per_channel_ms));
        let config = ScanConfig {
            scan_type: ScanType::Active {
                min: Duration::ZERO,
                max: dwell,
            },
            show_hidden: params.show_hidden,
            ..Default::default()
        };
        self.wifi.start_scan(&config, false).map_err(|e| {
            log::debug!("start_scan: {}", e);
            RadioError::Scan
        })?;
        self.scanning = true;
        Ok(())
    }

    fn scan_poll(&mut self) -> RadioScanState {
        if !self.scanning {
            return RadioScanState::NotStarted;
        }
        match self.wifi.is_scan_done() {
            Ok(true) => RadioScanState::Complete,
            Ok(false) => RadioScanState::Running,
            Err(_) => {
                self.scanning = false;
                RadioScanState::NotStarted
            }
        }
    }

    fn scan_take(&mut self, out: &mut RawScanList) {
        out.clear();
        self.scanning = false;
        match self.wifi.get_scan_result() {
            Ok(aps) => {
                for ap in aps.iter().take(MAX_APS) {
                    let _ = out.push(raw_ap(ap));
                }
            }
            Err(e) => log::warn!("get_scan_result: {}", e),
        }
    }

    fn scan_stop(&mut self) {
        if self.scanning {
            if let Err(e) = self.wifi.stop_scan() {
                log::debug!("stop_scan: {}", e);
            }
            self.scanning = false;
        }
    }
}

fn raw_ap(ap: &AccessPointInfo) -> RawAp {
    RawAp {
        ssid: SsidString::try_from(ap.ssid.as_str()).unwrap_or_default(),
        bssid: MacAddress::new(ap.bssid),
        channel: ap.channel,
        rssi: ap.signal_strength,
        encryption: encryption(ap.auth_method),
    }
}

fn encryption(auth: Option<AuthMethod>) -> Encryption {
    match auth {
        Some(AuthMethod::None) => Encryption::Open,
        Some(AuthMethod::WEP) => Encryption::Wep,
        Some(AuthMethod::WPA) => Encryption::Wpa,
        Some(AuthMethod::WPA2Personal) => Encryption::Wpa2,
        Some(AuthMethod::WPAWPA2Personal) => Encryption::WpaWpa2,
        Some(AuthMethod::WPA2Enterprise) => Encryption::Wpa2Enterprise,
        Some(AuthMethod::WPA3Personal) => Encryption::Wpa3,
        Some(AuthMethod::WPA2WPA3Personal) => Encryption::Wpa2Wpa3,
        Some(AuthMethod::WAPIPersonal) => Encryption::Wapi,
        _ => Encryption::Unknown,
    }
}
