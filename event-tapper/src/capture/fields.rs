//! Field metadata registry
//!
//! Static tables describing the numeric fields that can be queried on a raw
//! event, and the names of keyboard key codes. Lookups never fail: keys
//! outside the tables simply carry no metadata.

use super::types::{EventClass, EventType};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::ops::RangeInclusive;

/// Every field key queried when decoding an event.
pub const FIELD_KEY_RANGE: RangeInclusive<u32> = 0..=200;

/// Field carrying the virtual key code of keyboard events.
pub const KEYBOARD_KEYCODE_FIELD: FieldKey = FieldKey(9);

/// Identifies one queryable field on a raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldKey(pub u32);

impl FieldKey {
    pub const fn raw_value(&self) -> u32 {
        self.0
    }

    /// Registry metadata, `None` for keys outside the known set
    pub fn metadata(&self) -> Option<&'static FieldMetadata> {
        field_metadata(self.0)
    }

    /// Human label, falling back to the numeric key
    pub fn label(&self) -> Cow<'static, str> {
        match self.metadata() {
            Some(metadata) => Cow::Borrowed(metadata.label),
            None => Cow::Owned(self.0.to_string()),
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which events a field is meaningful for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldScope {
    Any,
    Mouse,
    Keyboard,
    ScrollWheel,
    Tablet,
}

impl FieldScope {
    pub fn includes(&self, event_type: EventType) -> bool {
        match self {
            FieldScope::Any => true,
            FieldScope::Mouse => event_type.class() == EventClass::Mouse,
            FieldScope::Keyboard => event_type.class() == EventClass::Keyboard,
            FieldScope::ScrollWheel => event_type == EventType::ScrollWheel,
            FieldScope::Tablet => matches!(
                event_type,
                EventType::TabletPointer | EventType::TabletProximity
            ) || event_type.class() == EventClass::Mouse,
        }
    }
}

/// Descriptive metadata for a known field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldMetadata {
    pub key: u32,
    pub label: &'static str,
    pub description: &'static str,
    pub applies_to: FieldScope,
}

impl FieldMetadata {
    const fn new(
        key: u32,
        label: &'static str,
        description: &'static str,
        applies_to: FieldScope,
    ) -> Self {
        Self {
            key,
            label,
            description,
            applies_to,
        }
    }
}

use FieldScope::{Any, Keyboard, Mouse, ScrollWheel, Tablet};

/// Known fields, sorted by key.
#[rustfmt::skip]
static FIELDS: &[FieldMetadata] = &[
    FieldMetadata::new(0, "Mouse Event Number", "Identifies the mouse-down group this event belongs to.", Mouse),
    FieldMetadata::new(1, "Mouse Click State", "Click count of a mouse-down or mouse-up event.", Mouse),
    FieldMetadata::new(2, "Mouse Pressure", "Pressure of a mouse or tablet event, from 0 to 1.", Mouse),
    FieldMetadata::new(3, "Mouse Button Number", "Number of the mouse button that changed state.", Mouse),
    FieldMetadata::new(4, "Mouse Delta X", "Horizontal mouse movement since the last mouse event.", Mouse),
    FieldMetadata::new(5, "Mouse Delta Y", "Vertical mouse movement since the last mouse event.", Mouse),
    FieldMetadata::new(6, "Mouse Instant Mouser", "Non-zero if the event was generated by an instant mouser.", Mouse),
    FieldMetadata::new(7, "Mouse Subtype", "Subtype of the mouse event (default, tablet point, tablet proximity).", Mouse),
    FieldMetadata::new(8, "Keyboard Autorepeat", "Non-zero when the key event is an autorepeat of a held key.", Keyboard),
    FieldMetadata::new(9, "Keyboard Keycode", "Virtual key code of the key event.", Keyboard),
    FieldMetadata::new(10, "Keyboard Type", "Keyboard type identifier of the generating keyboard.", Keyboard),
    FieldMetadata::new(11, "Scroll Delta Axis 1", "Line-based scroll change on the vertical axis.", ScrollWheel),
    FieldMetadata::new(12, "Scroll Delta Axis 2", "Line-based scroll change on the horizontal axis.", ScrollWheel),
    FieldMetadata::new(13, "Scroll Delta Axis 3", "Line-based scroll change on the third axis (unused).", ScrollWheel),
    FieldMetadata::new(14, "Scroll Instant Mouser", "Non-zero if the scroll was generated by an instant mouser.", ScrollWheel),
    FieldMetadata::new(15, "Tablet Point X", "Absolute X coordinate in tablet space.", Tablet),
    FieldMetadata::new(16, "Tablet Point Y", "Absolute Y coordinate in tablet space.", Tablet),
    FieldMetadata::new(17, "Tablet Point Z", "Absolute Z coordinate in tablet space.", Tablet),
    FieldMetadata::new(18, "Tablet Point Buttons", "Bit field of the tablet buttons that are down.", Tablet),
    FieldMetadata::new(19, "Tablet Pressure", "Tip pressure of the tablet pen, from 0 to 1.", Tablet),
    FieldMetadata::new(20, "Tablet Tilt X", "Horizontal tilt of the pen, from -1 to 1.", Tablet),
    FieldMetadata::new(21, "Tablet Tilt Y", "Vertical tilt of the pen, from -1 to 1.", Tablet),
    FieldMetadata::new(22, "Tablet Rotation", "Rotation of the pen in degrees.", Tablet),
    FieldMetadata::new(23, "Tablet Tangential Pressure", "Tangential pressure on the device, from -1 to 1.", Tablet),
    FieldMetadata::new(24, "Tablet Device ID", "System-assigned identifier of the tablet device.", Tablet),
    FieldMetadata::new(25, "Tablet Vendor 1", "First vendor-specified value.", Tablet),
    FieldMetadata::new(26, "Tablet Vendor 2", "Second vendor-specified value.", Tablet),
    FieldMetadata::new(27, "Tablet Vendor 3", "Third vendor-specified value.", Tablet),
    FieldMetadata::new(28, "Proximity Vendor ID", "Vendor-defined identifier of the tablet.", Tablet),
    FieldMetadata::new(29, "Proximity Tablet ID", "Vendor-defined tablet identifier.", Tablet),
    FieldMetadata::new(30, "Proximity Pointer ID", "Vendor-defined identifier of the pointing device.", Tablet),
    FieldMetadata::new(31, "Proximity Device ID", "System-assigned device identifier.", Tablet),
    FieldMetadata::new(32, "Proximity System Tablet ID", "System-assigned identifier of the tablet.", Tablet),
    FieldMetadata::new(33, "Proximity Vendor Pointer Type", "Vendor-assigned pointer type.", Tablet),
    FieldMetadata::new(34, "Proximity Pointer Serial", "Vendor-defined serial number of the pointing device.", Tablet),
    FieldMetadata::new(35, "Proximity Vendor Unique ID", "Vendor-defined unique identifier.", Tablet),
    FieldMetadata::new(36, "Proximity Capability Mask", "Bit field of the capabilities of the device.", Tablet),
    FieldMetadata::new(37, "Proximity Pointer Type", "Type of pointing device (pen, cursor, eraser).", Tablet),
    FieldMetadata::new(38, "Proximity Enter", "Non-zero when the pen enters proximity.", Tablet),
    FieldMetadata::new(39, "Target Process Serial Number", "Serial number of the process the event is posted to.", Any),
    FieldMetadata::new(40, "Target Unix Process ID", "Process ID of the event target.", Any),
    FieldMetadata::new(41, "Source Unix Process ID", "Process ID of the event source.", Any),
    FieldMetadata::new(42, "Source User Data", "User-supplied data attached by the event source.", Any),
    FieldMetadata::new(43, "Source User ID", "User ID of the event source.", Any),
    FieldMetadata::new(44, "Source Group ID", "Group ID of the event source.", Any),
    FieldMetadata::new(45, "Source State ID", "State ID of the event source that generated the event.", Any),
    FieldMetadata::new(88, "Scroll Is Continuous", "Non-zero when the scroll came from a continuous device such as a trackpad.", ScrollWheel),
    FieldMetadata::new(91, "Window Under Pointer", "Window number under the mouse pointer.", Mouse),
    FieldMetadata::new(92, "Window Under Pointer Accepting Event", "Window number under the pointer that can handle the event.", Mouse),
    FieldMetadata::new(93, "Scroll Fixed Delta Axis 1", "Fixed-point scroll change on the vertical axis.", ScrollWheel),
    FieldMetadata::new(94, "Scroll Fixed Delta Axis 2", "Fixed-point scroll change on the horizontal axis.", ScrollWheel),
    FieldMetadata::new(95, "Scroll Fixed Delta Axis 3", "Fixed-point scroll change on the third axis.", ScrollWheel),
    FieldMetadata::new(96, "Scroll Point Delta Axis 1", "Pixel-based scroll change on the vertical axis.", ScrollWheel),
    FieldMetadata::new(97, "Scroll Point Delta Axis 2", "Pixel-based scroll change on the horizontal axis.", ScrollWheel),
    FieldMetadata::new(98, "Scroll Point Delta Axis 3", "Pixel-based scroll change on the third axis.", ScrollWheel),
    FieldMetadata::new(99, "Scroll Phase", "Phase of a continuous scroll gesture.", ScrollWheel),
    FieldMetadata::new(100, "Scroll Count", "Number of scroll events in the current gesture.", ScrollWheel),
    FieldMetadata::new(123, "Scroll Momentum Phase", "Momentum phase of a continuous scroll.", ScrollWheel),
    FieldMetadata::new(170, "Unaccelerated Delta X", "Horizontal pointer movement before acceleration.", Mouse),
    FieldMetadata::new(171, "Unaccelerated Delta Y", "Vertical pointer movement before acceleration.", Mouse),
];

/// Look up metadata for a raw field key.
pub fn field_metadata(key: u32) -> Option<&'static FieldMetadata> {
    FIELDS
        .binary_search_by_key(&key, |metadata| metadata.key)
        .ok()
        .map(|index| &FIELDS[index])
}

/// All known field metadata, sorted by key.
pub fn known_fields() -> &'static [FieldMetadata] {
    FIELDS
}

/// Canonical display string for a virtual key code.
///
/// Unknown codes render as their decimal value.
pub fn key_code_string(key_code: i64) -> Cow<'static, str> {
    match u16::try_from(key_code).ok().and_then(key_code_name) {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(key_code.to_string()),
    }
}

/// Name of a virtual key code on an ANSI layout.
pub fn key_code_name(key_code: u16) -> Option<&'static str> {
    let name = match key_code {
        0 => "A",
        1 => "S",
        2 => "D",
        3 => "F",
        4 => "H",
        5 => "G",
        6 => "Z",
        7 => "X",
        8 => "C",
        9 => "V",
        10 => "§",
        11 => "B",
        12 => "Q",
        13 => "W",
        14 => "E",
        15 => "R",
        16 => "Y",
        17 => "T",
        18 => "1",
        19 => "2",
        20 => "3",
        21 => "4",
        22 => "6",
        23 => "5",
        24 => "=",
        25 => "9",
        26 => "7",
        27 => "-",
        28 => "8",
        29 => "0",
        30 => "]",
        31 => "O",
        32 => "U",
        33 => "[",
        34 => "I",
        35 => "P",
        36 => "Return",
        37 => "L",
        38 => "J",
        39 => "'",
        40 => "K",
        41 => ";",
        42 => "\\",
        43 => ",",
        44 => "/",
        45 => "N",
        46 => "M",
        47 => ".",
        48 => "Tab",
        49 => "Space",
        50 => "`",
        51 => "Delete",
        53 => "Escape",
        54 => "Right Command",
        55 => "Command",
        56 => "Shift",
        57 => "Caps Lock",
        58 => "Option",
        59 => "Control",
        60 => "Right Shift",
        61 => "Right Option",
        62 => "Right Control",
        63 => "Function",
        64 => "F17",
        65 => "Keypad .",
        67 => "Keypad *",
        69 => "Keypad +",
        71 => "Keypad Clear",
        72 => "Volume Up",
        73 => "Volume Down",
        74 => "Mute",
        75 => "Keypad /",
        76 => "Keypad Enter",
        78 => "Keypad -",
        79 => "F18",
        80 => "F19",
        81 => "Keypad =",
        82 => "Keypad 0",
        83 => "Keypad 1",
        84 => "Keypad 2",
        85 => "Keypad 3",
        86 => "Keypad 4",
        87 => "Keypad 5",
        88 => "Keypad 6",
        89 => "Keypad 7",
        90 => "F20",
        91 => "Keypad 8",
        92 => "Keypad 9",
        93 => "¥",
        94 => "_",
        95 => "Keypad ,",
        96 => "F5",
        97 => "F6",
        98 => "F7",
        99 => "F3",
        100 => "F8",
        101 => "F9",
        102 => "Eisu",
        103 => "F11",
        104 => "Kana",
        105 => "F13",
        106 => "F16",
        107 => "F14",
        109 => "F10",
        110 => "Context Menu",
        111 => "F12",
        113 => "F15",
        114 => "Help",
        115 => "Home",
        116 => "Page Up",
        117 => "Forward Delete",
        118 => "F4",
        119 => "End",
        120 => "F2",
        121 => "Page Down",
        122 => "F1",
        123 => "Left Arrow",
        124 => "Right Arrow",
        125 => "Down Arrow",
        126 => "Up Arrow",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_sorted_and_unique() {
        for pair in FIELDS.windows(2) {
            assert!(pair[0].key < pair[1].key, "{} before {}", pair[0].key, pair[1].key);
        }
    }

    #[test]
    fn test_known_fields_inside_decode_range() {
        for metadata in known_fields() {
            assert!(FIELD_KEY_RANGE.contains(&metadata.key));
        }
    }

    #[test]
    fn test_lookup_known_field() {
        let metadata = FieldKey(9).metadata().unwrap();
        assert_eq!(metadata.label, "Keyboard Keycode");
        assert_eq!(metadata.applies_to, FieldScope::Keyboard);
        assert_eq!(KEYBOARD_KEYCODE_FIELD.label(), "Keyboard Keycode");
    }

    #[test]
    fn test_unknown_field_has_no_metadata() {
        assert!(FieldKey(150).metadata().is_none());
        assert!(FieldKey(u32::MAX).metadata().is_none());
        assert_eq!(FieldKey(150).label(), "150");
    }

    #[test]
    fn test_key_code_strings() {
        assert_eq!(key_code_string(36), "Return");
        assert_eq!(key_code_string(0), "A");
        assert_eq!(key_code_string(49), "Space");
        assert_eq!(key_code_string(126), "Up Arrow");
    }

    #[test]
    fn test_unknown_key_code_falls_back_to_number() {
        assert_eq!(key_code_string(52), "52");
        assert_eq!(key_code_string(500), "500");
        assert_eq!(key_code_string(-3), "-3");
    }

    #[test]
    fn test_field_scope_applicability() {
        assert!(FieldScope::Any.includes(EventType::Null));
        assert!(FieldScope::Mouse.includes(EventType::LeftMouseDown));
        assert!(!FieldScope::Mouse.includes(EventType::KeyDown));
        assert!(FieldScope::Keyboard.includes(EventType::FlagsChanged));
        assert!(FieldScope::ScrollWheel.includes(EventType::ScrollWheel));
        assert!(!FieldScope::ScrollWheel.includes(EventType::MouseMoved));
        assert!(FieldScope::Tablet.includes(EventType::TabletProximity));
    }
}
