//! Event decoding
//!
//! Turns a borrowed [`RawEvent`] into an owned, immutable [`Event`]. Decoding
//! is pure: it reads the raw event and the static registry tables, holds no
//! shared mutable state and is cheap enough to run inside the capture
//! callback (one read per field key).

use super::event::{Event, Field, Point};
use super::fields::{key_code_string, FieldKey, FIELD_KEY_RANGE, KEYBOARD_KEYCODE_FIELD};
use super::flags::Flags;
use super::types::{EventType, RawEvent};
use crate::time::{TimeReference, Timestamp};

/// Decodes raw events captured during one monitoring session.
#[derive(Debug, Clone, Copy)]
pub struct EventDecoder {
    screen_height: Option<f64>,
    time_reference: TimeReference,
}

impl EventDecoder {
    /// `screen_height` is the height of the main display in points; without
    /// it the unflipped location is left empty.
    pub fn new(screen_height: Option<f64>, time_reference: TimeReference) -> Self {
        Self {
            screen_height,
            time_reference,
        }
    }

    pub fn screen_height(&self) -> Option<f64> {
        self.screen_height
    }

    /// Decode one raw event of the given type.
    pub fn decode(&self, raw: &dyn RawEvent, event_type: EventType) -> Event {
        let raw_timestamp = raw.timestamp();
        let (x, y) = raw.location();
        let mouse_location = Point::new(x, y);
        let unflipped_location = self
            .screen_height
            .map(|height| Point::new(x, height - y));

        let int_fields: Vec<Field<i64>> = FIELD_KEY_RANGE
            .map(|key| Field {
                key: FieldKey(key),
                value: raw.integer_field(key),
            })
            .collect();
        let double_fields: Vec<Field<f64>> = FIELD_KEY_RANGE
            .map(|key| Field {
                key: FieldKey(key),
                value: raw.double_field(key),
            })
            .collect();

        let keyboard_key = event_type
            .is_keyboard()
            .then(|| raw.integer_field(KEYBOARD_KEYCODE_FIELD.raw_value()));
        let keyboard_key_string = keyboard_key.map(|code| key_code_string(code).into_owned());

        let raw_flags = raw.flags();

        Event {
            event_type,
            raw_timestamp,
            date: self
                .time_reference
                .wall_clock(Timestamp::from_ticks(raw_timestamp)),
            mouse_location,
            unflipped_location,
            keyboard_key,
            keyboard_key_string,
            flags: Flags::from_mask(raw_flags),
            raw_flags,
            int_fields,
            double_fields,
        }
    }

    /// Decode using the type code carried by the raw event itself.
    pub fn decode_raw(&self, raw: &dyn RawEvent) -> Event {
        self.decode(raw, EventType::from_code(raw.type_code()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::fields::FieldKey;
    use crate::capture::flags::EventFlag;
    use crate::capture::synthetic::SyntheticEvent;
    use chrono::{TimeZone, Utc};

    fn decoder() -> EventDecoder {
        let wall = Utc.with_ymd_and_hms(2024, 12, 14, 9, 30, 0).unwrap();
        EventDecoder::new(Some(1080.0), TimeReference::new(Timestamp::from_ticks(0), wall))
    }

    #[test]
    fn test_decode_return_with_shift() {
        let raw = SyntheticEvent::key_down(36, 0x0002_0000);
        let event = decoder().decode(&raw, EventType::KeyDown);

        assert_eq!(event.event_type(), EventType::KeyDown);
        assert_eq!(event.flags(), [EventFlag::Shift].into_iter().collect());
        assert_eq!(event.keyboard_key(), Some(36));
        assert_eq!(event.keyboard_key_string(), Some("Return"));
    }

    #[test]
    fn test_mouse_event_has_no_keyboard_fields() {
        // A stray keycode value on a mouse event must not be resolved
        let raw = SyntheticEvent::mouse_moved(10.0, 20.0).with_int_field(9, 36);
        let event = decoder().decode(&raw, EventType::MouseMoved);

        assert!(event.keyboard_key().is_none());
        assert!(event.keyboard_key_string().is_none());
        assert_eq!(event.int_field(FieldKey(9)), Some(36));
    }

    #[test]
    fn test_both_coordinate_spaces() {
        let raw = SyntheticEvent::mouse_moved(100.0, 200.0);
        let event = decoder().decode_raw(&raw);

        assert_eq!(event.mouse_location(), Point::new(100.0, 200.0));
        assert_eq!(event.unflipped_location(), Some(Point::new(100.0, 880.0)));
    }

    #[test]
    fn test_no_screen_height_leaves_unflipped_empty() {
        let decoder = EventDecoder::new(None, TimeReference::now());
        let event = decoder.decode_raw(&SyntheticEvent::mouse_moved(1.0, 2.0));
        assert!(event.unflipped_location().is_none());
    }

    #[test]
    fn test_full_field_range_including_zeros() {
        let raw = SyntheticEvent::mouse_moved(0.0, 0.0).with_int_field(4, 7);
        let event = decoder().decode_raw(&raw);

        let expected = FIELD_KEY_RANGE.count();
        assert_eq!(event.int_fields().len(), expected);
        assert_eq!(event.double_fields().len(), expected);
        assert_eq!(event.int_field(FieldKey(4)), Some(7));
        assert_eq!(event.int_field(FieldKey(5)), Some(0));

        let keys: Vec<u32> = event.int_fields().iter().map(|f| f.key.raw_value()).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn test_unknown_field_key_decodes_without_metadata() {
        let raw = SyntheticEvent::mouse_moved(0.0, 0.0)
            .with_int_field(150, -12)
            .with_double_field(150, 0.5);
        let event = decoder().decode_raw(&raw);

        let field = event
            .int_fields()
            .iter()
            .find(|field| field.key == FieldKey(150))
            .unwrap();
        assert_eq!(field.value, -12);
        assert!(field.key.metadata().is_none());
        assert_eq!(event.double_field(FieldKey(150)), Some(0.5));
    }

    #[test]
    fn test_unknown_key_code_falls_back_to_number() {
        let raw = SyntheticEvent::key_down(52, 0);
        let event = decoder().decode_raw(&raw);
        assert_eq!(event.keyboard_key_string(), Some("52"));
    }

    #[test]
    fn test_unknown_event_type_decodes() {
        let raw = SyntheticEvent::new(EventType::Unknown(99));
        let event = decoder().decode_raw(&raw);
        assert_eq!(event.event_type(), EventType::Unknown(99));
        assert!(event.keyboard_key().is_none());
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let raw = SyntheticEvent::key_down(12, 0x0010_0000)
            .with_timestamp(123_456_789)
            .with_double_field(2, 0.75);
        let decoder = decoder();

        let first = decoder.decode_raw(&raw);
        let second = decoder.decode_raw(&raw);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_date_derived_from_reference() {
        let raw = SyntheticEvent::mouse_moved(0.0, 0.0).with_timestamp(0);
        let event = decoder().decode_raw(&raw);
        assert_eq!(event.date(), Utc.with_ymd_and_hms(2024, 12, 14, 9, 30, 0).unwrap());
        assert_eq!(event.raw_timestamp(), 0);
    }
}
