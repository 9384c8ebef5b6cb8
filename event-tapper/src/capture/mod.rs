//! Event capture module
//!
//! Everything that runs on the capture thread: the raw event abstraction,
//! the static field and flag registries, the pure decoder, the tap session
//! and its backends, and the lock-free hand-off to the delivery thread.

pub mod decoder;
pub mod event;
pub mod fields;
pub mod flags;
pub mod ring_buffer;
pub mod session;
pub mod synthetic;
pub mod types;

#[cfg(target_os = "macos")]
pub mod macos;

pub use decoder::EventDecoder;
pub use event::{Event, EventId, Field, IdentifiedEvent, Point};
pub use fields::{
    field_metadata, key_code_string, known_fields, FieldKey, FieldMetadata, FieldScope,
};
pub use flags::{EventFlag, Flags};
pub use ring_buffer::{DeliveryStats, EventRingBuffer};
pub use session::{
    CaptureHandler, RunOutcome, TapBackend, TapControl, TapError, TapRequest, TapSession,
};
pub use synthetic::{SyntheticEvent, SyntheticTap, SyntheticTapHandle};
pub use types::{EventClass, EventType, RawEvent, TapLocation, TapPlacement};

#[cfg(target_os = "macos")]
pub use macos::CgEventTapBackend;

use std::sync::Arc;

/// The native backend for this platform, if there is one
pub fn native_backend() -> Option<Arc<dyn TapBackend>> {
    #[cfg(target_os = "macos")]
    {
        Some(Arc::new(CgEventTapBackend::new()))
    }
    #[cfg(not(target_os = "macos"))]
    {
        None
    }
}
