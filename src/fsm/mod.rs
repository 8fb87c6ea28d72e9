//! Function-pointer bootstrap state machine.
//!
//! Sequences the connection tiers at boot and handles direct re-entry when
//! a user submits new credentials:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  PhaseTable                                              │
//! │  ┌──────────────┬───────────┬────────────────────────┐   │
//! │  │ Phase        │ on_enter  │ on_update              │   │
//! │  ├──────────────┼───────────┼────────────────────────┤   │
//! │  │ TryPersisted │ -         │ fn(ctx) -> Option<>    │   │
//! │  │ TryFallback  │ -         │ fn(ctx) -> Option<>    │   │
//! │  │ HostAp       │ fn(ctx)   │ terminal               │   │
//! │  │ Connected    │ fn(ctx)   │ terminal               │   │
//! │  └──────────────┴───────────┴────────────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Unlike a ticked control FSM, a bootstrap run drives `on_update`
//! back-to-back until a handler returns `None`. Each non-terminal handler
//! performs one bounded connection attempt, so a full run takes at most
//! two connect timeouts.

pub mod context;
pub mod states;

use std::sync::Arc;

use context::BootstrapContext;
use log::info;

use crate::app::credentials::NetworkCredentials;
use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::events::ProvisionQueue;

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Must stay in sync with the table built in [`states::build_phase_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BootstrapPhase {
    TryPersisted = 0,
    TryFallback = 1,
    HostAp = 2,
    Connected = 3,
}

impl BootstrapPhase {
    /// Total number of phases: used to size the table array.
    pub const COUNT: usize = 4;

    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::TryPersisted,
            1 => Self::TryFallback,
            2 => Self::HostAp,
            3 => Self::Connected,
            _ => {
                debug_assert!(false, "invalid phase index: {idx}");
                Self::HostAp
            }
        }
    }

    /// `Connected` and `HostAp` end a tiered run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Connected | Self::HostAp)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Runs once each time the phase is entered.
pub type PhaseActionFn = fn(&mut BootstrapContext);

/// Returns `Some(next)` to move on, or `None` to stop driving.
pub type PhaseUpdateFn = fn(&mut BootstrapContext) -> Option<BootstrapPhase>;

/// Static descriptor for a single phase.
pub struct PhaseDescriptor {
    pub id: BootstrapPhase,
    pub name: &'static str,
    pub on_enter: Option<PhaseActionFn>,
    pub on_update: PhaseUpdateFn,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Bootstrap {
    table: [PhaseDescriptor; BootstrapPhase::COUNT],
    current: usize,
    ctx: BootstrapContext,
    sink: Arc<dyn EventSink>,
}

impl Bootstrap {
    pub fn new(ctx: BootstrapContext, sink: Arc<dyn EventSink>) -> Self {
        Self {
            table: states::build_phase_table(),
            current: BootstrapPhase::TryPersisted as usize,
            ctx,
            sink,
        }
    }

    pub fn phase(&self) -> BootstrapPhase {
        BootstrapPhase::from_index(self.current)
    }

    pub fn context(&self) -> &BootstrapContext {
        &self.ctx
    }

    /// Tiered startup run: persisted → fallback → access point.
    pub fn run(&mut self) -> BootstrapPhase {
        self.current = BootstrapPhase::TryPersisted as usize;
        info!("Bootstrap: starting in phase {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(&mut self.ctx);
        }
        self.drive()
    }

    /// Direct re-entry with user-supplied credentials.
    ///
    /// Persists them first, then attempts only the persisted tier. On
    /// failure the phase is left at `TryPersisted`.
    pub fn reenter(&mut self, creds: NetworkCredentials) -> BootstrapPhase {
        info!("Bootstrap: direct re-entry for '{}'", creds.ssid);
        if let Err(e) = self.ctx.credentials.save(&creds) {
            self.ctx.fail(e.into());
        }
        self.ctx.direct = Some(creds);
        self.transition(BootstrapPhase::TryPersisted);
        self.drive()
    }

    /// Handle one queued credential submission, if any.
    pub fn service_pending(&mut self, queue: &ProvisionQueue) -> Option<BootstrapPhase> {
        let creds = queue.try_receive().ok()?;
        let phase = self.reenter(creds);
        info!("Bootstrap: re-entry finished in {:?}", phase);
        Some(phase)
    }

    /// Provisioning worker body: park until a submission is queued, then
    /// service it. This worker is the queue's only consumer.
    pub fn serve(mut self, queue: &ProvisionQueue) -> ! {
        loop {
            futures_lite::future::block_on(queue.ready_to_receive());
            self.service_pending(queue);
        }
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn drive(&mut self) -> BootstrapPhase {
        while let Some(next) = (self.table[self.current].on_update)(&mut self.ctx) {
            self.transition(next);
        }
        self.phase()
    }

    fn transition(&mut self, next: BootstrapPhase) {
        let from = self.phase();
        let next_idx = next as usize;

        if next_idx != self.current {
            info!(
                "Bootstrap transition: {} -> {}",
                self.table[self.current].name, self.table[next_idx].name
            );
            self.sink.emit(&AppEvent::PhaseChanged { from, to: next });
        }

        self.current = next_idx;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(&mut self.ctx);
        }
    }
}
