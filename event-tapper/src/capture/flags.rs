//! Modifier flag decoding
//!
//! The raw flag bitmask is decoded into a set over the closed [`EventFlag`]
//! enumeration with one explicit bit test per variant.

use serde::{Serialize, Serializer};
use std::fmt;

/// One modifier or state bit of an event's flag mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventFlag {
    NonCoalesced,
    CapsLock,
    Shift,
    Control,
    Option,
    Command,
    NumericPad,
    Help,
    Function,
}

impl EventFlag {
    /// All variants in bit order
    pub const ALL: [EventFlag; 9] = [
        EventFlag::NonCoalesced,
        EventFlag::CapsLock,
        EventFlag::Shift,
        EventFlag::Control,
        EventFlag::Option,
        EventFlag::Command,
        EventFlag::NumericPad,
        EventFlag::Help,
        EventFlag::Function,
    ];

    /// Bit of the raw flag mask carrying this flag
    pub const fn mask(&self) -> u64 {
        match self {
            EventFlag::NonCoalesced => 0x0000_0100,
            EventFlag::CapsLock => 0x0001_0000,
            EventFlag::Shift => 0x0002_0000,
            EventFlag::Control => 0x0004_0000,
            EventFlag::Option => 0x0008_0000,
            EventFlag::Command => 0x0010_0000,
            EventFlag::NumericPad => 0x0020_0000,
            EventFlag::Help => 0x0040_0000,
            EventFlag::Function => 0x0080_0000,
        }
    }

    pub const fn short_description(&self) -> &'static str {
        match self {
            EventFlag::NonCoalesced => "nc",
            EventFlag::CapsLock => "⇪",
            EventFlag::Shift => "⇧",
            EventFlag::Control => "⌃",
            EventFlag::Option => "⌥",
            EventFlag::Command => "⌘",
            EventFlag::NumericPad => "#",
            EventFlag::Help => "?",
            EventFlag::Function => "fn",
        }
    }

    pub const fn long_description(&self) -> &'static str {
        match self {
            EventFlag::NonCoalesced => "Non-Coalesced",
            EventFlag::CapsLock => "Caps Lock",
            EventFlag::Shift => "Shift",
            EventFlag::Control => "Control",
            EventFlag::Option => "Option",
            EventFlag::Command => "Command",
            EventFlag::NumericPad => "Numeric Pad",
            EventFlag::Help => "Help",
            EventFlag::Function => "Function",
        }
    }
}

impl fmt::Display for EventFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.long_description())
    }
}

/// Set of decoded flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Flags {
    // bit i set <=> EventFlag::ALL[i] present
    members: u16,
}

impl Flags {
    pub const fn empty() -> Self {
        Self { members: 0 }
    }

    /// Decode a raw flag mask. Bits outside the known set are ignored.
    pub fn from_mask(mask: u64) -> Self {
        let mut flags = Self::empty();
        for flag in EventFlag::ALL {
            if mask & flag.mask() != 0 {
                flags.insert(flag);
            }
        }
        flags
    }

    fn slot(flag: EventFlag) -> u16 {
        1 << (flag as u16)
    }

    pub fn insert(&mut self, flag: EventFlag) {
        self.members |= Self::slot(flag);
    }

    pub fn contains(&self, flag: EventFlag) -> bool {
        self.members & Self::slot(flag) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.members == 0
    }

    pub fn len(&self) -> usize {
        self.members.count_ones() as usize
    }

    /// Members in bit order
    pub fn iter(&self) -> impl Iterator<Item = EventFlag> + '_ {
        EventFlag::ALL.into_iter().filter(|flag| self.contains(*flag))
    }

    /// Concatenated short descriptions, e.g. `⇧⌘`
    pub fn short_description(&self) -> String {
        self.iter().map(|flag| flag.short_description()).collect()
    }
}

impl FromIterator<EventFlag> for Flags {
    fn from_iter<I: IntoIterator<Item = EventFlag>>(iter: I) -> Self {
        let mut flags = Flags::empty();
        for flag in iter {
            flags.insert(flag);
        }
        flags
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for flag in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{flag}")?;
        }
        Ok(())
    }
}

impl Serialize for Flags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_only() {
        let flags = Flags::from_mask(0x0002_0000);
        assert!(flags.contains(EventFlag::Shift));
        assert_eq!(flags.len(), 1);
        assert_eq!(flags, [EventFlag::Shift].into_iter().collect());
    }

    #[test]
    fn test_multiple_flags_in_bit_order() {
        // Command + Shift + Option, listed out of order on purpose
        let flags = Flags::from_mask(0x0010_0000 | 0x0002_0000 | 0x0008_0000);
        let members: Vec<_> = flags.iter().collect();
        assert_eq!(
            members,
            vec![EventFlag::Shift, EventFlag::Option, EventFlag::Command]
        );
        assert_eq!(flags.short_description(), "⇧⌥⌘");
    }

    #[test]
    fn test_unknown_bits_ignored() {
        let flags = Flags::from_mask(0x0000_0001 | 0x8000_0000);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_all_flags() {
        let mask = EventFlag::ALL.iter().fold(0u64, |acc, flag| acc | flag.mask());
        let flags = Flags::from_mask(mask);
        assert_eq!(flags.len(), EventFlag::ALL.len());
        for flag in EventFlag::ALL {
            assert!(flags.contains(flag));
        }
    }

    #[test]
    fn test_masks_are_distinct_single_bits() {
        for (i, a) in EventFlag::ALL.iter().enumerate() {
            assert_eq!(a.mask().count_ones(), 1);
            for b in &EventFlag::ALL[i + 1..] {
                assert_ne!(a.mask(), b.mask());
            }
        }
    }

    #[test]
    fn test_display_and_serialize() {
        let flags = Flags::from_mask(0x0004_0000 | 0x0080_0000);
        assert_eq!(flags.to_string(), "Control, Function");
        assert_eq!(
            serde_json::to_string(&flags).unwrap(),
            "[\"control\",\"function\"]"
        );
    }
}
