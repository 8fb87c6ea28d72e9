//! Inbound relay commands.
//!
//! Both control surfaces (HTTP `POST /relay`, MQTT `<root>/set`) carry the
//! same payload: a JSON object mapping relay index (as a decimal string)
//! to the desired boolean state.
//!
//! ```text
//! {"0": true, "3": false}
//! ```
//!
//! Decoding is best-effort per entry. A bad key or non-boolean value is
//! recorded against that entry and the rest of the payload still decodes;
//! only a payload that is not a JSON object at the top level is refused
//! outright.
//!
//! Entries are applied in payload order, duplicates included, so
//! `{"3": true, "03": false}` leaves relay 3 off.

use core::fmt;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::Value;

use crate::config::RELAY_COUNT;
use crate::error::{EntryFault, FaultReason, ParseError, RejectedEntries};

/// One validated `index → state` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayCommand {
    pub index: usize,
    pub on: bool,
}

/// Result of decoding a payload: the entries to apply plus the ones skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedCommand {
    /// Valid entries, in payload iteration order.
    pub entries: Vec<RelayCommand>,
    /// Per-entry faults. `rejected.applied` is filled by the service.
    pub rejected: RejectedEntries,
}

impl DecodedCommand {
    /// An empty object decodes to nothing and is still a valid command.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.rejected.is_empty()
    }
}

/// Top-level payload shape. Object members keep their wire order.
enum Payload {
    Object(Vec<(String, Value)>),
    Other,
}

impl<'de> serde::Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PayloadVisitor)
    }
}

struct PayloadVisitor;

impl<'de> Visitor<'de> for PayloadVisitor {
    type Value = Payload;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Payload, A::Error> {
        let mut members = Vec::new();
        while let Some(member) = map.next_entry::<String, Value>()? {
            members.push(member);
        }
        Ok(Payload::Object(members))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Payload, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(Payload::Other)
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Payload, E> {
        Ok(Payload::Other)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Payload, E> {
        Ok(Payload::Other)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Payload, E> {
        Ok(Payload::Other)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Payload, E> {
        Ok(Payload::Other)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<Payload, E> {
        Ok(Payload::Other)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Payload, E> {
        Ok(Payload::Other)
    }
}

/// Decode a raw relay command payload.
pub fn parse_command(payload: &[u8]) -> Result<DecodedCommand, ParseError> {
    let payload: Payload =
        serde_json::from_slice(payload).map_err(|_| ParseError::InvalidJson)?;
    let Payload::Object(members) = payload else {
        return Err(ParseError::NotAnObject);
    };

    let mut decoded = DecodedCommand::default();
    for (key, value) in &members {
        let index = match parse_index(key) {
            Ok(i) => i,
            Err(reason) => {
                decoded.rejected.record(EntryFault::new(key, reason));
                continue;
            }
        };
        let Some(on) = value.as_bool() else {
            decoded
                .rejected
                .record(EntryFault::new(key, FaultReason::NotBoolean));
            continue;
        };
        decoded.entries.push(RelayCommand { index, on });
    }
    Ok(decoded)
}

/// Keys are plain decimal digits: no sign, no whitespace.
fn parse_index(key: &str) -> Result<usize, FaultReason> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FaultReason::MalformedIndex);
    }
    match key.parse::<usize>() {
        Ok(i) if i < RELAY_COUNT => Ok(i),
        // All digits but too large even for usize.
        _ => Err(FaultReason::IndexOutOfRange),
    }
}
