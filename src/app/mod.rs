//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules for the relay node: the relay
//! state store and its command protocol, status encoding, credential
//! persistence, and the connectivity monitor. All interaction with
//! hardware and the network happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod connectivity;
pub mod credentials;
pub mod events;
pub mod ports;
pub mod relays;
pub mod service;
pub mod status;
