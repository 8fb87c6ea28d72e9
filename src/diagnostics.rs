//! Runtime diagnostics: heap telemetry and the low-memory watch.
//!
//! [`HeapProbe`] is the [`SystemInfo`] adapter that feeds `free_heap` into
//! the status document. [`HeapWatch`] runs once per main-loop tick and
//! logs `Low memory warning` on each tick spent below the threshold.

use log::{info, warn};

use crate::app::ports::SystemInfo;

// ───────────────────────────────────────────────────────────────
// Heap probe
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct HeapProbe;

impl HeapProbe {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "espidf")]
impl SystemInfo for HeapProbe {
    fn free_heap(&self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }

    fn min_free_heap(&self) -> u32 {
        unsafe { esp_idf_svc::sys::esp_get_minimum_free_heap_size() }
    }
}

/// Simulation: a fixed, comfortable heap so host runs never trip the watch.
#[cfg(not(target_os = "espidf"))]
impl SystemInfo for HeapProbe {
    fn free_heap(&self) -> u32 {
        307_200
    }

    fn min_free_heap(&self) -> u32 {
        261_120
    }
}

// ───────────────────────────────────────────────────────────────
// Low-memory watch
// ───────────────────────────────────────────────────────────────

pub struct HeapWatch {
    threshold: u32,
    warnings: u64,
}

impl HeapWatch {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            warnings: 0,
        }
    }

    /// Returns `true` when free heap is below the threshold.
    pub fn check(&mut self, info: &dyn SystemInfo) -> bool {
        let free = info.free_heap();
        if free < self.threshold {
            self.warnings += 1;
            warn!(
                "Low memory warning: {} bytes free (min since boot {})",
                free,
                info.min_free_heap()
            );
            return true;
        }
        false
    }

    pub fn warnings(&self) -> u64 {
        self.warnings
    }
}

/// Log every panic before the default handler resets the chip.
pub fn install_panic_handler() {
    let default = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let reason = if let Some(msg) = panic.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = panic.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        match panic.location() {
            Some(loc) => log::error!("PANIC: {} at {}:{}", reason, loc.file(), loc.line()),
            None => log::error!("PANIC: {}", reason),
        }
        default(panic);
    }));
    info!("Diagnostics: panic logging installed");
}
