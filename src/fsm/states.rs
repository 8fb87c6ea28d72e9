//! Concrete phase handler functions and table builder.
//!
//! Each phase is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch in the table itself.
//!
//! ```text
//!  TRY_PERSISTED ──[connected]──────────────────────────▶ CONNECTED
//!      │ [absent / timeout]                                   ▲
//!      ▼                                                      │
//!  TRY_FALLBACK ──[connected]─────────────────────────────────┘
//!      │ [not configured / timeout]
//!      ▼
//!  HOST_AP   (terminal until a credential submission re-enters)
//!
//!  direct re-entry ──▶ TRY_PERSISTED ──[connected]──▶ CONNECTED
//!                           └──[timeout]──▶ stays (unresolved)
//! ```

use super::context::BootstrapContext;
use super::{BootstrapPhase, PhaseDescriptor};
use log::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static phase table. Called once per orchestrator.
pub fn build_phase_table() -> [PhaseDescriptor; BootstrapPhase::COUNT] {
    [
        // Index 0: TryPersisted
        PhaseDescriptor {
            id: BootstrapPhase::TryPersisted,
            name: "TryPersisted",
            on_enter: None,
            on_update: try_persisted_update,
        },
        // Index 1: TryFallback
        PhaseDescriptor {
            id: BootstrapPhase::TryFallback,
            name: "TryFallback",
            on_enter: None,
            on_update: try_fallback_update,
        },
        // Index 2: HostAp
        PhaseDescriptor {
            id: BootstrapPhase::HostAp,
            name: "HostAp",
            on_enter: Some(host_ap_enter),
            on_update: terminal_update,
        },
        // Index 3: Connected
        PhaseDescriptor {
            id: BootstrapPhase::Connected,
            name: "Connected",
            on_enter: Some(connected_enter),
            on_update: terminal_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  TRY_PERSISTED
// ═══════════════════════════════════════════════════════════════════════════

fn try_persisted_update(ctx: &mut BootstrapContext) -> Option<BootstrapPhase> {
    let (creds, direct) = match ctx.direct.take() {
        Some(creds) => (Some(creds), true),
        None => (ctx.credentials.load(), false),
    };

    let Some(creds) = creds else {
        info!("Bootstrap: no persisted credentials");
        return Some(BootstrapPhase::TryFallback);
    };

    match ctx.attempt("persisted", &creds) {
        Ok(_) => Some(BootstrapPhase::Connected),
        Err(e) => {
            ctx.fail(e);
            if direct {
                // Re-entry never escalates; a human supplies the next credentials.
                warn!("Bootstrap: submitted credentials for '{}' did not connect", creds.ssid);
                None
            } else {
                Some(BootstrapPhase::TryFallback)
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  TRY_FALLBACK
// ═══════════════════════════════════════════════════════════════════════════

fn try_fallback_update(ctx: &mut BootstrapContext) -> Option<BootstrapPhase> {
    let Some(creds) = ctx.policy.fallback.clone() else {
        info!("Bootstrap: no fallback credentials configured");
        return Some(BootstrapPhase::HostAp);
    };

    // Fallback credentials are never written to the store.
    match ctx.attempt("fallback", &creds) {
        Ok(_) => Some(BootstrapPhase::Connected),
        Err(e) => {
            ctx.fail(e);
            Some(BootstrapPhase::HostAp)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  HOST_AP
// ═══════════════════════════════════════════════════════════════════════════

fn host_ap_enter(ctx: &mut BootstrapContext) {
    let ap = &ctx.policy.access_point;
    info!(
        "Bootstrap: starting access point '{}' ({})",
        ap.ssid,
        if ap.password.is_empty() { "open" } else { "WPA2" }
    );
    let result = ctx
        .station
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .start_access_point(ap);
    if let Err(e) = result {
        warn!("Bootstrap: access point start failed: {}", e);
        ctx.last_error = Some(e.into());
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONNECTED
// ═══════════════════════════════════════════════════════════════════════════

fn connected_enter(ctx: &mut BootstrapContext) {
    ctx.last_error = None;
    match ctx.monitor.address() {
        Some(addr) => info!("Bootstrap: connected, IP {}", addr),
        None => info!("Bootstrap: connected"),
    }
}

/// Terminal phases stay put until an external re-entry.
fn terminal_update(_ctx: &mut BootstrapContext) -> Option<BootstrapPhase> {
    None
}
