//! WiFi radio adapter.
//!
//! Implements [`StationPort`], the hexagonal boundary for radio control.
//! Connection outcomes are not returned from these calls: the ESP-IDF
//! system event loop reports them, and [`forward_net_events`] turns those
//! reports into [`NetEvent`](crate::events::NetEvent)s for the monitor.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: a recording simulation for host-side tests.
//!
//! ## Radio mode
//!
//! The access point stays up once started. A station attempt made while
//! it is up runs in mixed (AP + STA) mode so a client on the access point
//! keeps its connection while the node tries the submitted network.

use log::info;

use crate::app::credentials::NetworkCredentials;
use crate::app::ports::{NetworkError, StationPort};
use crate::config::AccessPointConfig;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
};

// ───────────────────────────────────────────────────────────────
// Radio mode
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    Off,
    Station,
    AccessPoint,
    Mixed,
}

impl RadioMode {
    fn select(station: bool, access_point: bool) -> Self {
        match (station, access_point) {
            (false, false) => Self::Off,
            (true, false) => Self::Station,
            (false, true) => Self::AccessPoint,
            (true, true) => Self::Mixed,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiStation {
    station: Option<NetworkCredentials>,
    access_point: Option<AccessPointConfig>,
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    /// Simulation: association requests issued (begin + reconnect).
    #[cfg(not(target_os = "espidf"))]
    connect_requests: u32,
}

impl WifiStation {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self {
            station: None,
            access_point: None,
            wifi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            station: None,
            access_point: None,
            connect_requests: 0,
        }
    }

    pub fn mode(&self) -> RadioMode {
        RadioMode::select(self.station.is_some(), self.access_point.is_some())
    }

    /// SSID of the network currently being joined, if any.
    pub fn station_ssid(&self) -> Option<&str> {
        self.station.as_ref().map(|c| c.ssid.as_str())
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn connect_requests(&self) -> u32 {
        self.connect_requests
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn apply_configuration(&mut self) -> Result<(), NetworkError> {
        let conf = match (&self.station, &self.access_point) {
            (None, None) => Configuration::None,
            (Some(creds), None) => Configuration::Client(client_configuration(creds)?),
            (None, Some(ap)) => Configuration::AccessPoint(ap_configuration(ap)?),
            (Some(creds), Some(ap)) => {
                Configuration::Mixed(client_configuration(creds)?, ap_configuration(ap)?)
            }
        };
        if self.wifi.is_started().unwrap_or(false) {
            // Ignored: fails harmlessly when not associated.
            let _ = self.wifi.disconnect();
        }
        self.wifi.set_configuration(&conf).map_err(driver_error)?;
        if !self.wifi.is_started().map_err(driver_error)? {
            self.wifi.start().map_err(driver_error)?;
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn apply_configuration(&mut self) -> Result<(), NetworkError> {
        info!("WiFi(sim): radio mode {:?}", self.mode());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), NetworkError> {
        self.wifi.connect().map_err(driver_error)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), NetworkError> {
        self.connect_requests += 1;
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiStation {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// StationPort
// ───────────────────────────────────────────────────────────────

impl StationPort for WifiStation {
    fn begin_station(&mut self, creds: &NetworkCredentials) -> Result<(), NetworkError> {
        info!(
            "WiFi: connecting to '{}' ({})",
            creds.ssid,
            if creds.is_open() { "open" } else { "WPA2" }
        );
        self.station = Some(creds.clone());
        self.apply_configuration()?;
        self.platform_connect()
    }

    fn reconnect(&mut self) -> Result<(), NetworkError> {
        if self.station.is_none() {
            return Err(NetworkError::InvalidConfiguration);
        }
        self.platform_connect()
    }

    fn start_access_point(&mut self, ap: &AccessPointConfig) -> Result<(), NetworkError> {
        if ap.ssid.is_empty() {
            return Err(NetworkError::InvalidConfiguration);
        }
        self.access_point = Some(ap.clone());
        self.apply_configuration()?;
        info!("WiFi: access point '{}' up on channel {}", ap.ssid, ap.channel);
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF helpers
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn driver_error(e: esp_idf_svc::sys::EspError) -> NetworkError {
    NetworkError::Driver(e.code())
}

#[cfg(target_os = "espidf")]
fn client_configuration(creds: &NetworkCredentials) -> Result<ClientConfiguration, NetworkError> {
    Ok(ClientConfiguration {
        ssid: creds
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| NetworkError::InvalidConfiguration)?,
        password: creds
            .password
            .as_str()
            .try_into()
            .map_err(|_| NetworkError::InvalidConfiguration)?,
        auth_method: if creds.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        },
        ..Default::default()
    })
}

#[cfg(target_os = "espidf")]
fn ap_configuration(ap: &AccessPointConfig) -> Result<AccessPointConfiguration, NetworkError> {
    Ok(AccessPointConfiguration {
        ssid: ap
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| NetworkError::InvalidConfiguration)?,
        password: ap
            .password
            .as_str()
            .try_into()
            .map_err(|_| NetworkError::InvalidConfiguration)?,
        auth_method: if ap.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        channel: ap.channel,
        max_connections: ap.max_connections,
        ..Default::default()
    })
}

// ───────────────────────────────────────────────────────────────
// System event forwarding
// ───────────────────────────────────────────────────────────────

/// Keeps the system event loop subscriptions alive.
#[cfg(target_os = "espidf")]
pub struct NetEventSubscriptions {
    _wifi: esp_idf_svc::eventloop::EspSubscription<'static, esp_idf_svc::eventloop::System>,
    _ip: esp_idf_svc::eventloop::EspSubscription<'static, esp_idf_svc::eventloop::System>,
}

/// Push station link changes into `queue`.
///
/// Runs in the event-loop task, so it only ever enqueues.
#[cfg(target_os = "espidf")]
pub fn forward_net_events(
    sysloop: &esp_idf_svc::eventloop::EspSystemEventLoop,
    queue: &'static crate::events::NetEventQueue,
) -> Result<NetEventSubscriptions, esp_idf_svc::sys::EspError> {
    use crate::events::{push_net_event, NetEvent};
    use esp_idf_svc::netif::IpEvent;
    use esp_idf_svc::wifi::WifiEvent;

    let wifi = sysloop.subscribe::<WifiEvent, _>(move |event| {
        if let WifiEvent::StaDisconnected(_) = event {
            push_net_event(queue, NetEvent::Disconnected);
        }
    })?;
    let ip = sysloop.subscribe::<IpEvent, _>(move |event| {
        if let IpEvent::DhcpIpAssigned(assignment) = event {
            push_net_event(queue, NetEvent::Connected(assignment.ip()));
        }
    })?;
    Ok(NetEventSubscriptions { _wifi: wifi, _ip: ip })
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
