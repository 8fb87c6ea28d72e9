//! Relay output driver and core-pinned task helpers.

pub mod relay;
pub mod task_pin;
