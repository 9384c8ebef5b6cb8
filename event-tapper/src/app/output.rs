//! Event rendering for the command line
//!
//! Table rows padded into `Type │ Details │ Fields` columns, or one JSON
//! object per line.

use crate::capture::{Event, EventType, Field, TapLocation, TapPlacement};
use chrono::Local;
use clap::ValueEnum;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;

const TYPE_WIDTH: usize = 15;
const DETAILS_WIDTH: usize = 30;
const COLUMN_SEPARATOR: &str = " │ ";

/// Which events the monitor prints.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    #[default]
    All,
    Mouse,
    Keyboard,
}

impl EventFilter {
    pub fn matches(&self, event_type: EventType) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Mouse => event_type.is_mouse(),
            EventFilter::Keyboard => event_type.is_keyboard(),
        }
    }
}

/// Table renderer.
#[derive(Debug, Clone)]
pub struct TableFormatter {
    fields: BTreeSet<u32>,
    labeled_fields: bool,
    timestamp: bool,
}

impl TableFormatter {
    pub fn new(
        fields: impl IntoIterator<Item = u32>,
        labeled_fields: bool,
        timestamp: bool,
    ) -> Self {
        Self {
            fields: fields.into_iter().collect(),
            labeled_fields,
            timestamp,
        }
    }

    /// Column titles and the rule below them
    pub fn header(&self) -> String {
        let titles = [
            pad("Type", TYPE_WIDTH),
            pad("Details", DETAILS_WIDTH),
            "Fields".to_string(),
        ]
        .join(COLUMN_SEPARATOR);
        let rule = format!(
            "{}┼{}┼{}",
            "─".repeat(TYPE_WIDTH + 1),
            "─".repeat(DETAILS_WIDTH + 2),
            "─".repeat(30)
        );
        format!("{titles}\n{rule}")
    }

    pub fn row(&self, event: &Event) -> String {
        let row = [
            type_column(event),
            self.details_column(event),
            self.fields_column(event),
        ]
        .join(COLUMN_SEPARATOR);

        if self.timestamp {
            let time = event.date().with_timezone(&Local).format("%H:%M:%S%.3f");
            format!("{time}{COLUMN_SEPARATOR}{row}")
        } else {
            row
        }
    }

    fn details_column(&self, event: &Event) -> String {
        let mut details = Vec::new();

        if let Some(key) = event.keyboard_key_string() {
            details.push(format!("Key: {key}"));
        }
        if event.event_type().is_mouse() {
            let location = event.mouse_location();
            details.push(format!("({}, {})", location.x as i64, location.y as i64));
        }
        if !event.flags().is_empty() {
            details.push(format!("[{}]", event.flags().short_description()));
        }

        pad(&details.join(" "), DETAILS_WIDTH)
    }

    fn fields_column(&self, event: &Event) -> String {
        let mut out = String::new();
        for field in event.int_fields().iter().filter(|f| self.shows(f, |v| *v != 0)) {
            self.push_field(&mut out, field.key.raw_value(), &field.value.to_string());
        }
        for field in event.double_fields().iter().filter(|f| self.shows(f, |v| *v != 0.0)) {
            self.push_field(&mut out, field.key.raw_value(), &format!("{:.2}", field.value));
        }
        out
    }

    fn shows<T>(&self, field: &Field<T>, non_zero: impl Fn(&T) -> bool) -> bool {
        self.fields.contains(&field.key.raw_value()) && non_zero(&field.value)
    }

    fn push_field(&self, out: &mut String, key: u32, value: &str) {
        if !out.is_empty() {
            out.push_str(", ");
        }
        if self.labeled_fields {
            let label = crate::capture::FieldKey(key).label();
            let _ = write!(out, "{label}: {value}");
        } else {
            let _ = write!(out, "{key}: {value}");
        }
    }
}

/// A selectable tap location or placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TapOption {
    pub value: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

impl TapOption {
    /// `value  Name: description`, value padded to `width`
    pub fn line(&self, width: usize) -> String {
        format!("{}  {}: {}", pad(self.value, width), self.name, self.description)
    }
}

pub fn tap_locations() -> Vec<TapOption> {
    TapLocation::ALL
        .iter()
        .map(|location| TapOption {
            value: location.as_str(),
            name: location.name(),
            description: location.description(),
        })
        .collect()
}

pub fn tap_placements() -> Vec<TapOption> {
    TapPlacement::ALL
        .iter()
        .map(|placement| TapOption {
            value: placement.as_str(),
            name: placement.name(),
            description: placement.description(),
        })
        .collect()
}

/// One event as a single-line JSON object
pub fn json_line(event: &Event) -> crate::Result<String> {
    Ok(serde_json::to_string(event)?)
}

fn type_column(event: &Event) -> String {
    let event_type = event.event_type();
    let label = format!("{} {}", event_type.code(), event_type.label().unwrap_or("Unknown"));
    pad(&label, TYPE_WIDTH)
}

/// Pad with spaces to exactly `width` characters, truncating longer text
fn pad(text: &str, width: usize) -> String {
    let mut out: String = text.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat(' ').take(width - len));
    out
}
