//! Unified error types for the relay node firmware.
//!
//! Command-path errors are recovered locally and reported to the caller
//! that submitted the command. Connectivity and persistence errors are
//! recovered by the bootstrap and monitor logic and never propagate as
//! process-fatal.

use core::fmt;

use crate::app::ports::{NetworkError, StorageError};
use crate::config::RELAY_COUNT;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A relay command was malformed or partly rejected.
    Command(CommandError),
    /// A request body exceeded the configured limit.
    Capacity(CapacityError),
    /// A connection attempt did not complete within its bound.
    Timeout { waited_ms: u32 },
    /// Durable storage read or write failed.
    Persistence(StorageError),
    /// The network layer refused a request.
    Network(NetworkError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Capacity(e) => write!(f, "capacity: {e}"),
            Self::Timeout { waited_ms } => write!(f, "timed out after {waited_ms} ms"),
            Self::Persistence(e) => write!(f, "persistence: {e}"),
            Self::Network(e) => write!(f, "network: {e}"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

impl From<CapacityError> for Error {
    fn from(e: CapacityError) -> Self {
        Self::Capacity(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Persistence(e)
    }
}

impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Self::Network(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// Top-level payload problems. Nothing is mutated or broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Not valid JSON at all.
    InvalidJson,
    /// Valid JSON, but the top level is not an object.
    NotAnObject,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "invalid JSON"),
            Self::NotAnObject => write!(f, "payload must be a JSON object"),
        }
    }
}

/// Why a single `"index": state` entry was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultReason {
    /// Key is not a decimal integer.
    MalformedIndex,
    /// Key parsed, but names no relay.
    IndexOutOfRange,
    /// Value is not a JSON boolean.
    NotBoolean,
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedIndex => write!(f, "relay index must be a decimal integer"),
            Self::IndexOutOfRange => {
                write!(f, "relay index out of range (0-{})", RELAY_COUNT - 1)
            }
            Self::NotBoolean => write!(f, "relay state must be true or false"),
        }
    }
}

/// Longest key echoed back in an error report.
pub const FAULT_KEY_LEN: usize = 16;

/// One rejected entry of a relay command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFault {
    /// The offending key, truncated to [`FAULT_KEY_LEN`] bytes.
    pub key: heapless::String<FAULT_KEY_LEN>,
    pub reason: FaultReason,
}

impl EntryFault {
    pub fn new(key: &str, reason: FaultReason) -> Self {
        let mut k = heapless::String::new();
        for ch in key.chars() {
            if k.push(ch).is_err() {
                break;
            }
        }
        Self { key: k, reason }
    }
}

impl fmt::Display for EntryFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key \"{}\": {}", self.key, self.reason)
    }
}

/// Faults kept verbatim in a report; the rest are only counted.
pub const MAX_REPORTED_FAULTS: usize = 8;

/// Aggregate of per-entry validation failures.
///
/// The entries that did validate were applied before this was returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectedEntries {
    /// Entries that were valid and took effect.
    pub applied: usize,
    /// Total entries skipped.
    pub rejected: usize,
    /// The first [`MAX_REPORTED_FAULTS`] faults, in payload order.
    pub faults: heapless::Vec<EntryFault, MAX_REPORTED_FAULTS>,
}

impl RejectedEntries {
    pub fn record(&mut self, fault: EntryFault) {
        self.rejected += 1;
        // Overflow is still counted in `rejected`.
        let _ = self.faults.push(fault);
    }

    pub fn is_empty(&self) -> bool {
        self.rejected == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Parse(ParseError),
    Rejected(RejectedEntries),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Rejected(r) => {
                write!(
                    f,
                    "rejected {} of {} entries",
                    r.rejected,
                    r.rejected + r.applied
                )?;
                for (i, fault) in r.faults.iter().enumerate() {
                    let sep = if i == 0 { ": " } else { "; " };
                    write!(f, "{sep}{fault}")?;
                }
                if r.rejected > r.faults.len() {
                    write!(f, "; ...")?;
                }
                Ok(())
            }
        }
    }
}

impl From<ParseError> for CommandError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Capacity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityError {
    pub limit: usize,
    pub actual: usize,
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes exceeds the {} byte limit", self.actual, self.limit)
    }
}
