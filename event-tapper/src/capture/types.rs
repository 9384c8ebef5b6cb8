//! Core types for event capture
//!
//! Defines the raw event abstraction handed to capture handlers, the event
//! type classification and the tap location/placement selectors.

use serde::{Deserialize, Serialize};

/// Read access to one OS-delivered event.
///
/// Implementations borrow platform memory that is only valid for the duration
/// of a capture callback; handlers receive `&dyn RawEvent` and must copy out
/// whatever they need before returning.
pub trait RawEvent {
    /// Raw event type code
    fn type_code(&self) -> u32;
    /// Monotonic timestamp in raw ticks
    fn timestamp(&self) -> u64;
    /// Mouse location in global display coordinates, origin top-left
    fn location(&self) -> (f64, f64);
    /// Raw modifier flag bitmask
    fn flags(&self) -> u64;
    /// Integer value of a field; unknown keys read as 0
    fn integer_field(&self, key: u32) -> i64;
    /// Double value of a field; unknown keys read as 0.0
    fn double_field(&self, key: u32) -> f64;
}

/// Coarse classification deciding which fields apply to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventClass {
    Mouse,
    Keyboard,
    Other,
}

/// Event types delivered by the event tap.
///
/// Codes outside the known set are preserved as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum EventType {
    Null,
    LeftMouseDown,
    LeftMouseUp,
    RightMouseDown,
    RightMouseUp,
    MouseMoved,
    LeftMouseDragged,
    RightMouseDragged,
    KeyDown,
    KeyUp,
    FlagsChanged,
    ScrollWheel,
    TabletPointer,
    TabletProximity,
    OtherMouseDown,
    OtherMouseUp,
    OtherMouseDragged,
    /// The OS disabled the tap because a callback took too long
    TapDisabledByTimeout,
    /// The tap was disabled by user input (secure input, etc.)
    TapDisabledByUserInput,
    Unknown(u32),
}

impl EventType {
    /// Decode a raw type code
    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => EventType::Null,
            1 => EventType::LeftMouseDown,
            2 => EventType::LeftMouseUp,
            3 => EventType::RightMouseDown,
            4 => EventType::RightMouseUp,
            5 => EventType::MouseMoved,
            6 => EventType::LeftMouseDragged,
            7 => EventType::RightMouseDragged,
            10 => EventType::KeyDown,
            11 => EventType::KeyUp,
            12 => EventType::FlagsChanged,
            22 => EventType::ScrollWheel,
            23 => EventType::TabletPointer,
            24 => EventType::TabletProximity,
            25 => EventType::OtherMouseDown,
            26 => EventType::OtherMouseUp,
            27 => EventType::OtherMouseDragged,
            0xFFFF_FFFE => EventType::TapDisabledByTimeout,
            0xFFFF_FFFF => EventType::TapDisabledByUserInput,
            other => EventType::Unknown(other),
        }
    }

    /// The raw type code
    pub const fn code(&self) -> u32 {
        match self {
            EventType::Null => 0,
            EventType::LeftMouseDown => 1,
            EventType::LeftMouseUp => 2,
            EventType::RightMouseDown => 3,
            EventType::RightMouseUp => 4,
            EventType::MouseMoved => 5,
            EventType::LeftMouseDragged => 6,
            EventType::RightMouseDragged => 7,
            EventType::KeyDown => 10,
            EventType::KeyUp => 11,
            EventType::FlagsChanged => 12,
            EventType::ScrollWheel => 22,
            EventType::TabletPointer => 23,
            EventType::TabletProximity => 24,
            EventType::OtherMouseDown => 25,
            EventType::OtherMouseUp => 26,
            EventType::OtherMouseDragged => 27,
            EventType::TapDisabledByTimeout => 0xFFFF_FFFE,
            EventType::TapDisabledByUserInput => 0xFFFF_FFFF,
            EventType::Unknown(code) => *code,
        }
    }

    /// Human label, `None` for unknown codes
    pub const fn label(&self) -> Option<&'static str> {
        let label = match self {
            EventType::Null => "Null",
            EventType::LeftMouseDown => "Left Mouse Down",
            EventType::LeftMouseUp => "Left Mouse Up",
            EventType::RightMouseDown => "Right Mouse Down",
            EventType::RightMouseUp => "Right Mouse Up",
            EventType::MouseMoved => "Mouse Moved",
            EventType::LeftMouseDragged => "Left Mouse Dragged",
            EventType::RightMouseDragged => "Right Mouse Dragged",
            EventType::KeyDown => "Key Down",
            EventType::KeyUp => "Key Up",
            EventType::FlagsChanged => "Flags Changed",
            EventType::ScrollWheel => "Scroll Wheel",
            EventType::TabletPointer => "Tablet Pointer",
            EventType::TabletProximity => "Tablet Proximity",
            EventType::OtherMouseDown => "Other Mouse Down",
            EventType::OtherMouseUp => "Other Mouse Up",
            EventType::OtherMouseDragged => "Other Mouse Dragged",
            EventType::TapDisabledByTimeout => "Tap Disabled (Timeout)",
            EventType::TapDisabledByUserInput => "Tap Disabled (User Input)",
            EventType::Unknown(_) => return None,
        };
        Some(label)
    }

    /// Classification used to decide which fields apply
    pub const fn class(&self) -> EventClass {
        match self {
            EventType::LeftMouseDown
            | EventType::LeftMouseUp
            | EventType::RightMouseDown
            | EventType::RightMouseUp
            | EventType::MouseMoved
            | EventType::LeftMouseDragged
            | EventType::RightMouseDragged
            | EventType::ScrollWheel
            | EventType::OtherMouseDown
            | EventType::OtherMouseUp
            | EventType::OtherMouseDragged => EventClass::Mouse,
            EventType::KeyDown | EventType::KeyUp | EventType::FlagsChanged => {
                EventClass::Keyboard
            }
            _ => EventClass::Other,
        }
    }

    /// Check if this is a mouse-class event
    pub const fn is_mouse(&self) -> bool {
        matches!(self.class(), EventClass::Mouse)
    }

    /// Check if this is a keyboard-class event
    pub const fn is_keyboard(&self) -> bool {
        matches!(self.class(), EventClass::Keyboard)
    }

    /// Check if this is one of the tap-disabled notifications
    pub const fn is_tap_disabled(&self) -> bool {
        matches!(
            self,
            EventType::TapDisabledByTimeout | EventType::TapDisabledByUserInput
        )
    }
}

impl From<u32> for EventType {
    fn from(code: u32) -> Self {
        EventType::from_code(code)
    }
}

impl From<EventType> for u32 {
    fn from(event_type: EventType) -> Self {
        event_type.code()
    }
}

/// Where in the event delivery chain the tap is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u32)]
pub enum TapLocation {
    /// Events entering the window server from HID devices
    Hid = 0,
    /// Events entering the login session
    #[default]
    Session = 1,
    /// Session events annotated for delivery to a specific application
    AnnotatedSession = 2,
}

impl TapLocation {
    pub const ALL: [TapLocation; 3] = [
        TapLocation::Hid,
        TapLocation::Session,
        TapLocation::AnnotatedSession,
    ];

    /// Spelling used in config files and on the command line
    pub const fn as_str(&self) -> &'static str {
        match self {
            TapLocation::Hid => "hid",
            TapLocation::Session => "session",
            TapLocation::AnnotatedSession => "annotated-session",
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            TapLocation::Hid => "HID",
            TapLocation::Session => "Session",
            TapLocation::AnnotatedSession => "Annotated Session",
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            TapLocation::Hid => {
                "Tap at the point where HID system events enter the window server."
            }
            TapLocation::Session => {
                "Tap at the point where HID and remote control events enter a login session."
            }
            TapLocation::AnnotatedSession => {
                "Tap at the point where session events have been annotated to flow to an application."
            }
        }
    }
}

/// Ordering of the tap relative to other installed taps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u32)]
pub enum TapPlacement {
    /// Insert before any existing taps
    #[default]
    Head = 0,
    /// Append after any existing taps
    Tail = 1,
}

impl TapPlacement {
    pub const ALL: [TapPlacement; 2] = [TapPlacement::Head, TapPlacement::Tail];

    pub const fn as_str(&self) -> &'static str {
        match self {
            TapPlacement::Head => "head",
            TapPlacement::Tail => "tail",
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            TapPlacement::Head => "Head",
            TapPlacement::Tail => "Tail",
        }
    }

    pub const fn description(&self) -> &'static str {
        match self {
            TapPlacement::Head => "Observe events before other event taps at the same location.",
            TapPlacement::Tail => "Observe events after other event taps at the same location.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_conversion() {
        assert_eq!(EventType::from_code(5), EventType::MouseMoved);
        assert_eq!(EventType::from_code(1), EventType::LeftMouseDown);
        assert_eq!(EventType::from_code(10), EventType::KeyDown);
        assert_eq!(EventType::from_code(999), EventType::Unknown(999));
    }

    #[test]
    fn test_event_type_code_round_trip_for_known_codes() {
        for code in [0, 1, 2, 3, 4, 5, 6, 7, 10, 11, 12, 22, 23, 24, 25, 26, 27] {
            let event_type = EventType::from_code(code);
            assert!(!matches!(event_type, EventType::Unknown(_)), "code {code}");
            assert_eq!(event_type.code(), code);
        }
    }

    #[test]
    fn test_unknown_event_type_keeps_code_without_label() {
        let event_type = EventType::from_code(42);
        assert_eq!(event_type.code(), 42);
        assert!(event_type.label().is_none());
        assert_eq!(event_type.class(), EventClass::Other);
    }

    #[test]
    fn test_event_type_classes() {
        assert!(EventType::MouseMoved.is_mouse());
        assert!(EventType::ScrollWheel.is_mouse());
        assert!(EventType::OtherMouseDragged.is_mouse());
        assert!(EventType::KeyDown.is_keyboard());
        assert!(EventType::FlagsChanged.is_keyboard());
        assert!(!EventType::KeyUp.is_mouse());
        assert_eq!(EventType::TabletProximity.class(), EventClass::Other);
        assert_eq!(EventType::Null.class(), EventClass::Other);
    }

    #[test]
    fn test_tap_disabled_codes() {
        assert!(EventType::from_code(0xFFFF_FFFE).is_tap_disabled());
        assert!(EventType::from_code(0xFFFF_FFFF).is_tap_disabled());
        assert!(!EventType::KeyDown.is_tap_disabled());
    }

    #[test]
    fn test_event_type_serializes_as_code() {
        let json = serde_json::to_string(&EventType::KeyDown).unwrap();
        assert_eq!(json, "10");
        let parsed: EventType = serde_json::from_str("77").unwrap();
        assert_eq!(parsed, EventType::Unknown(77));
    }

    #[test]
    fn test_tap_location_defaults_and_names() {
        assert_eq!(TapLocation::default(), TapLocation::Session);
        assert_eq!(TapPlacement::default(), TapPlacement::Head);
        assert_eq!(TapLocation::Hid as u32, 0);
        assert_eq!(TapLocation::AnnotatedSession as u32, 2);
        assert_eq!(TapPlacement::Tail as u32, 1);
        for location in TapLocation::ALL {
            assert!(!location.name().is_empty());
            assert!(!location.description().is_empty());
        }
    }

    #[test]
    fn test_tap_location_serde_names() {
        let json = serde_json::to_string(&TapLocation::AnnotatedSession).unwrap();
        assert_eq!(json, "\"annotated-session\"");
        let parsed: TapPlacement = serde_json::from_str("\"tail\"").unwrap();
        assert_eq!(parsed, TapPlacement::Tail);
    }

    #[test]
    fn test_as_str_matches_serde_names() {
        for location in TapLocation::ALL {
            let json = serde_json::to_string(&location).unwrap();
            assert_eq!(json, format!("\"{}\"", location.as_str()));
        }
        for placement in TapPlacement::ALL {
            let json = serde_json::to_string(&placement).unwrap();
            assert_eq!(json, format!("\"{}\"", placement.as_str()));
        }
    }
}
