//! RelayNode Firmware: Main Entry Point
//!
//! Hexagonal architecture: the relay service and bootstrap orchestrator
//! sit behind port traits; everything ESP-IDF lives in the adapters.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  GpioRelayBank   LogEventSink   NvsAdapter    SystemClock      │
//! │  (RelayDriver)   (EventSink)    (Config+NVS)  (Clock)          │
//! │  WifiStation     MqttBridge     HttpApi       HeapProbe        │
//! │  (StationPort)   (EventSink)    (routes)      (SystemInfo)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  RelayService · ConnectivityMonitor · Bootstrap FSM    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Scheduler (heartbeat) · HeapWatch (1 s main loop)             │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Threads: main loop, HTTP server task, `mqtt-rx`, `net-events`,
//! `provision`.
#![deny(unused_must_use)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::wifi::EspWifi;

use relaynode::adapters::http::{self, HttpApi};
use relaynode::adapters::log_sink::LogEventSink;
use relaynode::adapters::mqtt::{self, MqttBridge, MqttTopics};
use relaynode::adapters::nvs::NvsAdapter;
use relaynode::adapters::time::SystemClock;
use relaynode::adapters::wifi::{self, WifiStation};
use relaynode::app::connectivity::ConnectivityMonitor;
use relaynode::app::credentials::CredentialStore;
use relaynode::app::ports::{Clock, ConfigPort, EventSink, StationPort, SystemInfo};
use relaynode::app::service::RelayService;
use relaynode::config::{RELAY_COUNT, SystemConfig};
use relaynode::diagnostics::{self, HeapProbe, HeapWatch};
use relaynode::drivers::relay::GpioRelayBank;
use relaynode::drivers::task_pin::{Core, TaskSpec, spawn_on_core};
use relaynode::events::{NetEventQueue, ProvisionQueue, run_net_event_worker};
use relaynode::fsm::Bootstrap;
use relaynode::fsm::context::{BootstrapContext, BootstrapPolicy};
use relaynode::ota::{self, OtaSession};
use relaynode::pins;
use relaynode::scheduler::{HeartbeatPublisher, Schedule, Scheduler};

/// Fed by the system event loop; drained by the `net-events` worker.
static NET_EVENTS: NetEventQueue = NetEventQueue::new();

const NET_EVENTS_TASK: TaskSpec = TaskSpec {
    name: "net-events\0",
    core: Core::Pro,
    priority: 6,
    stack_kb: 4,
};

const PROVISION_TASK: TaskSpec = TaskSpec {
    name: "provision\0",
    core: Core::App,
    priority: 4,
    stack_kb: 8,
};

const MQTT_RX_TASK: TaskSpec = TaskSpec {
    name: "mqtt-rx\0",
    core: Core::App,
    priority: 5,
    stack_kb: 8,
};

type RelayOutput = PinDriver<'static, AnyOutputPin, Output>;

/// Claim every relay GPIO as an output, in wire index order.
fn relay_outputs() -> Result<[RelayOutput; RELAY_COUNT]> {
    let mut outputs = Vec::with_capacity(RELAY_COUNT);
    for gpio in pins::RELAY_GPIOS {
        // SAFETY: each relay GPIO is claimed exactly once, here.
        let pin = unsafe { AnyOutputPin::new(gpio) };
        outputs.push(PinDriver::output(pin)?);
    }
    outputs
        .try_into()
        .map_err(|_| anyhow::anyhow!("relay output count mismatch"))
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  RelayNode v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    ota::mark_running_valid();
    diagnostics::install_panic_handler();

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    // ── 2. NVS + config ───────────────────────────────────────
    let nvs = Arc::new(match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running without persistence", e);
            NvsAdapter::default()
        }
    });
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    // ── 3. Relays (all off before anything can command them) ──
    info!("Relays: GPIO map {:?}", pins::RELAY_GPIOS);
    let relay_bank = GpioRelayBank::new(relay_outputs()?);

    // ── 4. WiFi + bootstrap ───────────────────────────────────
    let log_sink: Arc<dyn EventSink> = Arc::new(LogEventSink::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());

    let esp_wifi = EspWifi::new(peripherals.modem, sysloop.clone(), None)?;
    let station: Arc<Mutex<dyn StationPort>> = Arc::new(Mutex::new(WifiStation::new(esp_wifi)));
    let monitor = Arc::new(ConnectivityMonitor::new(
        station.clone(),
        clock.clone(),
        log_sink.clone(),
        config.network.max_retries,
    ));

    let _net_subscriptions = wifi::forward_net_events(&sysloop, &NET_EVENTS)?;
    {
        let monitor = monitor.clone();
        spawn_on_core(NET_EVENTS_TASK, move || {
            run_net_event_worker(&NET_EVENTS, &monitor);
        })?;
    }

    let ctx = BootstrapContext::new(
        CredentialStore::new(nvs.clone()),
        station,
        monitor.clone(),
        BootstrapPolicy::from_config(&config),
    );
    let mut bootstrap = Bootstrap::new(ctx, log_sink.clone());
    let phase = bootstrap.run();
    info!("Bootstrap: finished in {:?}", phase);

    let provisioning = Arc::new(ProvisionQueue::new());
    {
        let provisioning = provisioning.clone();
        spawn_on_core(PROVISION_TASK, move || {
            bootstrap.serve(&provisioning);
        })?;
    }

    // ── 5. MQTT + relay service ───────────────────────────────
    let (publisher, mqtt_conn) = mqtt::connect(&config.mqtt)?;
    let bridge = Arc::new(MqttBridge::new(
        publisher,
        MqttTopics::new(&config.mqtt.topic_root),
    ));
    let service = Arc::new(RelayService::new(
        Box::new(relay_bank),
        vec![log_sink.clone(), bridge.clone() as Arc<dyn EventSink>],
    ));
    {
        let bridge = bridge.clone();
        let service = service.clone();
        spawn_on_core(MQTT_RX_TASK, move || {
            mqtt::run_receive_loop(mqtt_conn, &bridge, &service);
        })?;
    }

    // ── 6. HTTP ───────────────────────────────────────────────
    let heap: Arc<dyn SystemInfo> = Arc::new(HeapProbe::new());
    let api = Arc::new(HttpApi::new(
        service.clone(),
        monitor.clone(),
        heap.clone(),
        clock.clone(),
        provisioning,
        config.http.max_body_bytes,
    ));
    let _server = http::start_server(api, &config.http)?;

    // ── 7. OTA ────────────────────────────────────────────────
    let ota_session = OtaSession::new();
    info!("OTA: update session {:?}", ota_session.state());

    info!("System ready. Entering main loop.");

    // ── 8. Main loop ──────────────────────────────────────────
    let tick = Duration::from_millis(u64::from(config.loop_interval_ms));
    let tick_secs = config.loop_interval_ms as f32 / 1000.0;
    let mut sched = Scheduler::new();
    sched.add(Schedule::heartbeat(config.status_interval_secs));
    let mut heartbeat = HeartbeatPublisher::new(&service);
    let mut heap_watch = HeapWatch::new(config.low_heap_warn_bytes);

    loop {
        std::thread::sleep(tick);
        heap_watch.check(heap.as_ref());
        sched.tick(tick_secs, &mut heartbeat);
    }
}
