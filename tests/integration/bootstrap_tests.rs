//! Integration tests for the tiered bootstrap: persisted → fallback → AP.
//!
//! Connection attempts run against a scripted radio and a virtual clock,
//! so a timed-out tier costs no wall time.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::mock_hw::{LEASED_IP, ManualClock, MockNvs, RadioCall, RecordingSink, ScriptedStation};

use relaynode::app::connectivity::ConnectivityMonitor;
use relaynode::app::credentials::{CREDENTIAL_NAMESPACE, CredentialStore, NetworkCredentials, SSID_KEY};
use relaynode::app::events::AppEvent;
use relaynode::app::ports::{Clock, EventSink, StationPort};
use relaynode::config::{AccessPointConfig, SystemConfig};
use relaynode::error::Error;
use relaynode::events::NetEvent;
use relaynode::fsm::context::{BootstrapContext, BootstrapPolicy};
use relaynode::fsm::{Bootstrap, BootstrapPhase};

pub struct Rig {
    pub bootstrap: Bootstrap,
    pub station: ScriptedStation,
    pub nvs: Arc<MockNvs>,
    pub clock: Arc<ManualClock>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub sink: Arc<RecordingSink>,
}

pub fn rig(reachable: &[&str], fallback: Option<&str>) -> Rig {
    let cfg = SystemConfig::default();
    let station = ScriptedStation::reaching(reachable);
    let nvs = MockNvs::new();
    let clock = Arc::new(ManualClock::default());
    let sink = RecordingSink::new();

    let radio: Arc<Mutex<dyn StationPort>> = Arc::new(Mutex::new(station.clone()));
    let monitor = Arc::new(ConnectivityMonitor::new(
        radio.clone(),
        clock.clone(),
        sink.clone(),
        cfg.network.max_retries,
    ));
    station.attach(&monitor);

    let policy = BootstrapPolicy {
        connect_timeout: Duration::from_millis(u64::from(cfg.network.connect_timeout_ms)),
        fallback: fallback.map(|ssid| NetworkCredentials::new(ssid, "fallback-pass").unwrap()),
        access_point: AccessPointConfig::default(),
    };
    let ctx = BootstrapContext::new(
        CredentialStore::new(nvs.clone()),
        radio,
        monitor.clone(),
        policy,
    );
    let sink_port: Arc<dyn EventSink> = sink.clone();
    Rig {
        bootstrap: Bootstrap::new(ctx, sink_port),
        station,
        nvs,
        clock,
        monitor,
        sink,
    }
}

pub fn persist(rig: &Rig, ssid: &str) {
    CredentialStore::new(rig.nvs.clone())
        .save(&NetworkCredentials::new(ssid, "home-pass").unwrap())
        .unwrap();
}

fn phase_changes(rig: &Rig) -> Vec<(BootstrapPhase, BootstrapPhase)> {
    rig.sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AppEvent::PhaseChanged { from, to } => Some((from, to)),
            _ => None,
        })
        .collect()
}

#[test]
fn first_boot_without_fallback_hosts_access_point() {
    let mut r = rig(&[], None);

    assert_eq!(r.bootstrap.run(), BootstrapPhase::HostAp);

    assert!(r.station.station_attempts().is_empty());
    assert_eq!(
        r.station.calls(),
        vec![RadioCall::AccessPoint("Waveshare-Relay-AP".to_string())]
    );
    assert_eq!(r.clock.now_ms(), 0, "skipped tiers cost no time");
}

#[test]
fn persisted_credentials_connect_first() {
    let mut r = rig(&["Home"], Some("Spare"));
    persist(&r, "Home");

    assert_eq!(r.bootstrap.run(), BootstrapPhase::Connected);

    assert_eq!(r.station.station_attempts(), vec!["Home"]);
    assert!(!r.station.ap_started());
    assert_eq!(r.monitor.address(), Some(LEASED_IP));
    assert_eq!(
        phase_changes(&r),
        vec![(BootstrapPhase::TryPersisted, BootstrapPhase::Connected)]
    );
}

#[test]
fn fallback_connects_after_persisted_times_out_and_is_not_saved() {
    let mut r = rig(&["Spare"], Some("Spare"));
    persist(&r, "Home");

    assert_eq!(r.bootstrap.run(), BootstrapPhase::Connected);

    assert_eq!(r.station.station_attempts(), vec!["Home", "Spare"]);
    assert_eq!(r.clock.now_ms(), 15_000);
    assert_eq!(
        r.nvs.raw(CREDENTIAL_NAMESPACE, SSID_KEY).as_deref(),
        Some(&b"Home"[..])
    );
}

#[test]
fn every_tier_failing_costs_two_timeouts_then_hosts_ap() {
    let mut r = rig(&[], Some("Spare"));
    persist(&r, "Home");

    assert_eq!(r.bootstrap.run(), BootstrapPhase::HostAp);

    assert_eq!(r.clock.now_ms(), 30_000);
    assert!(r.station.ap_started());
    assert!(matches!(
        r.bootstrap.context().last_error,
        Some(Error::Timeout { waited_ms: 15_000 })
    ));
    assert_eq!(
        phase_changes(&r),
        vec![
            (BootstrapPhase::TryPersisted, BootstrapPhase::TryFallback),
            (BootstrapPhase::TryFallback, BootstrapPhase::HostAp),
        ]
    );
}

#[test]
fn unreadable_store_is_treated_as_absent() {
    let mut r = rig(&["Spare"], Some("Spare"));
    persist(&r, "Home");
    r.nvs.break_reads();

    assert_eq!(r.bootstrap.run(), BootstrapPhase::Connected);
    assert_eq!(r.station.station_attempts(), vec!["Spare"]);
}

#[test]
fn connected_run_clears_previous_error() {
    let mut r = rig(&["Spare"], Some("Spare"));
    persist(&r, "Home");

    r.bootstrap.run();

    assert!(r.bootstrap.context().last_error.is_none());
    assert_eq!(r.bootstrap.context().attempts, 2);
}

#[test]
fn new_attempt_resets_exhausted_retry_budget() {
    let mut r = rig(&["Home"], None);
    persist(&r, "Home");
    r.bootstrap.run();

    for _ in 0..8 {
        r.monitor.handle_event(NetEvent::Disconnected);
    }
    let reconnects = |r: &Rig| {
        r.station
            .calls()
            .iter()
            .filter(|c| **c == RadioCall::Reconnect)
            .count()
    };
    assert_eq!(reconnects(&r), 5);
    assert_eq!(r.monitor.snapshot().failure_count, 5);

    let phase = r
        .bootstrap
        .reenter(NetworkCredentials::new("Home", "home-pass").unwrap());

    assert_eq!(phase, BootstrapPhase::Connected);
    assert_eq!(r.station.station_attempts(), vec!["Home", "Home"]);
    assert_eq!(r.monitor.snapshot().failure_count, 0);
    assert_eq!(r.clock.now_ms(), 0, "the new association answered at once");
}

#[test]
fn reentry_while_connected_waits_for_the_new_network() {
    let mut r = rig(&["Home"], None);
    persist(&r, "Home");
    assert_eq!(r.bootstrap.run(), BootstrapPhase::Connected);

    let phase = r
        .bootstrap
        .reenter(NetworkCredentials::new("Typo", "wrong-pass").unwrap());

    assert_eq!(phase, BootstrapPhase::TryPersisted);
    assert_eq!(r.station.station_attempts(), vec!["Home", "Typo"]);
    assert_eq!(r.clock.now_ms(), 15_000, "the full timeout was waited");
    assert!(!r.monitor.is_connected());
    assert_eq!(r.monitor.address(), None);
    assert!(matches!(
        r.bootstrap.context().last_error,
        Some(Error::Timeout { waited_ms: 15_000 })
    ));
}
