//! GPIO pin assignments for the Waveshare ESP32-S3-Relay-6CH board.
//!
//! Single source of truth; the relay driver references this module rather
//! than hard-coding pin numbers. Index `i` here is relay `i` on the wire.

use crate::config::RELAY_COUNT;

// ---------------------------------------------------------------------------
// Relay outputs (active HIGH through the driver transistors)
// ---------------------------------------------------------------------------

pub const RELAY_1_GPIO: i32 = 2;
pub const RELAY_2_GPIO: i32 = 3;
pub const RELAY_3_GPIO: i32 = 41;
pub const RELAY_4_GPIO: i32 = 42;
pub const RELAY_5_GPIO: i32 = 45;
pub const RELAY_6_GPIO: i32 = 46;

/// Relay channel → GPIO, in wire index order.
pub const RELAY_GPIOS: [i32; RELAY_COUNT] = [
    RELAY_1_GPIO,
    RELAY_2_GPIO,
    RELAY_3_GPIO,
    RELAY_4_GPIO,
    RELAY_5_GPIO,
    RELAY_6_GPIO,
];
