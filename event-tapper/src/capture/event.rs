//! Decoded event records

use super::fields::FieldKey;
use super::flags::Flags;
use super::types::EventType;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A point in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// One (key, value) pair read from a raw event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Field<T> {
    pub key: FieldKey,
    pub value: T,
}

/// Immutable decoded event.
///
/// Built once per delivered callback by [`EventDecoder`](super::decoder::EventDecoder);
/// there are no mutating accessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub(crate) event_type: EventType,
    pub(crate) raw_timestamp: u64,
    pub(crate) date: DateTime<Utc>,
    pub(crate) mouse_location: Point,
    pub(crate) unflipped_location: Option<Point>,
    pub(crate) keyboard_key: Option<i64>,
    pub(crate) keyboard_key_string: Option<String>,
    pub(crate) flags: Flags,
    pub(crate) raw_flags: u64,
    pub(crate) int_fields: Vec<Field<i64>>,
    pub(crate) double_fields: Vec<Field<f64>>,
}

impl Event {
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Monotonic timestamp in raw ticks
    pub fn raw_timestamp(&self) -> u64 {
        self.raw_timestamp
    }

    /// Wall-clock time derived from the raw timestamp
    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Location with the origin at the top-left of the main display
    pub fn mouse_location(&self) -> Point {
        self.mouse_location
    }

    /// Location with the origin at the bottom-left of the main display.
    /// `None` when no screen height was available while decoding.
    pub fn unflipped_location(&self) -> Option<Point> {
        self.unflipped_location
    }

    /// Virtual key code, keyboard-class events only
    pub fn keyboard_key(&self) -> Option<i64> {
        self.keyboard_key
    }

    /// Display string of the key code, keyboard-class events only
    pub fn keyboard_key_string(&self) -> Option<&str> {
        self.keyboard_key_string.as_deref()
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn raw_flags(&self) -> u64 {
        self.raw_flags
    }

    /// Integer values for every decoded key, in key order
    pub fn int_fields(&self) -> &[Field<i64>] {
        &self.int_fields
    }

    /// Double values for every decoded key, in key order
    pub fn double_fields(&self) -> &[Field<f64>] {
        &self.double_fields
    }

    pub fn int_field(&self, key: FieldKey) -> Option<i64> {
        find_field(&self.int_fields, key)
    }

    pub fn double_field(&self, key: FieldKey) -> Option<f64> {
        find_field(&self.double_fields, key)
    }
}

fn find_field<T: Copy>(fields: &[Field<T>], key: FieldKey) -> Option<T> {
    fields
        .binary_search_by_key(&key, |field| field.key)
        .ok()
        .map(|index| fields[index].value)
}

/// Session-unique identity of a captured event.
///
/// The epoch advances on every log reset, so identities issued before a
/// reset never resolve afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EventId {
    pub epoch: u32,
    pub sequence: u64,
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.epoch, self.sequence)
    }
}

/// An event plus the identity assigned when it entered the log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifiedEvent {
    pub id: EventId,
    pub event: Arc<Event>,
}

impl IdentifiedEvent {
    pub(crate) fn new(id: EventId, event: Arc<Event>) -> Self {
        Self { id, event }
    }

    pub fn info(&self) -> &Event {
        &self.event
    }
}
