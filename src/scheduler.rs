//! Timer/scheduler engine and the periodic status publisher.
//!
//! The scheduler counts main-loop ticks and notifies a
//! [`SchedulerDelegate`] when a periodic schedule comes due. The
//! heartbeat delegate turns each firing into exactly one status broadcast,
//! whether or not anything changed since the last one.
//!
//! ```text
//! ┌──────────────┐  tick(1 s)  ┌─────────────┐  fired   ┌────────────────────┐
//! │  main loop   │────────────▶│  Scheduler  │─────────▶│ HeartbeatPublisher │
//! └──────────────┘             └─────────────┘          └─────────┬──────────┘
//!                                                                 ▼
//!                                              RelayService::broadcast_heartbeat
//!                                                  └─▶ MQTT <root>/status
//! ```

use crate::app::ports::SchedulerDelegate;
use crate::app::service::RelayService;
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// A single periodic schedule.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Human-readable label (e.g., "status heartbeat").
    pub label: &'static str,
    /// Fire every `interval_secs` seconds.
    pub interval_secs: u32,
    /// Whether this schedule is currently enabled.
    pub enabled: bool,
}

/// Label of the status heartbeat schedule.
pub const HEARTBEAT_LABEL: &str = "status heartbeat";

impl Schedule {
    pub fn heartbeat(interval_secs: u32) -> Self {
        Self {
            label: HEARTBEAT_LABEL,
            interval_secs,
            enabled: true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of concurrent schedules (stack-allocated).
const MAX_SCHEDULES: usize = 4;

/// The scheduler engine. Decoupled from the broadcast path through
/// [`SchedulerDelegate`] so it is testable on its own.
pub struct Scheduler {
    schedules: [Option<ScheduleEntry>; MAX_SCHEDULES],
}

/// Internal bookkeeping for a live schedule.
#[derive(Debug, Clone)]
struct ScheduleEntry {
    schedule: Schedule,
    /// Ticks elapsed since last fire.
    elapsed_ticks: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            schedules: [None, None, None, None],
        }
    }

    /// Add a schedule. Returns the slot index, or `None` if full.
    pub fn add(&mut self, schedule: Schedule) -> Option<usize> {
        for (i, slot) in self.schedules.iter_mut().enumerate() {
            if slot.is_none() {
                info!(
                    "Scheduler: added '{}' at slot {} (every {}s)",
                    schedule.label, i, schedule.interval_secs
                );
                *slot = Some(ScheduleEntry {
                    schedule,
                    elapsed_ticks: 0,
                });
                return Some(i);
            }
        }
        None // All slots full.
    }

    /// Tick the scheduler. Call once per main loop iteration.
    ///
    /// * `tick_secs`: duration of one tick in seconds.
    /// * `delegate`: receives fire notifications.
    pub fn tick(&mut self, tick_secs: f32, delegate: &mut dyn SchedulerDelegate) {
        for slot in &mut self.schedules {
            let entry = match slot {
                Some(e) if e.schedule.enabled => e,
                _ => continue,
            };

            entry.elapsed_ticks += 1;
            let elapsed_secs = entry.elapsed_ticks as f32 * tick_secs;
            if elapsed_secs >= entry.schedule.interval_secs as f32 {
                debug!(
                    "Scheduler: '{}' periodic fire (every {}s)",
                    entry.schedule.label, entry.schedule.interval_secs
                );
                delegate.on_schedule_fired(entry.schedule.label);
                entry.elapsed_ticks = 0;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Periodic status publisher
// ═══════════════════════════════════════════════════════════════

/// Delegate that broadcasts relay status every time the heartbeat fires.
pub struct HeartbeatPublisher<'a> {
    service: &'a RelayService,
    fired: u64,
}

impl<'a> HeartbeatPublisher<'a> {
    pub fn new(service: &'a RelayService) -> Self {
        Self { service, fired: 0 }
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }
}

impl SchedulerDelegate for HeartbeatPublisher<'_> {
    fn on_schedule_fired(&mut self, label: &str) {
        if label == HEARTBEAT_LABEL {
            self.fired += 1;
            self.service.broadcast_heartbeat();
        }
    }
}
