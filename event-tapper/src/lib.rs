//! # Event Tapper
//!
//! Intercepts system-wide keyboard, mouse and tablet input through the
//! macOS Quartz Event Tap API, decodes each event into a self-contained
//! record and streams the records to inspectors.
//!
//! ## Quick Start
//!
//! ```no_run
//! use event_tapper::capture::{native_backend, TapLocation, TapPlacement};
//! use event_tapper::pipeline::TapCoordinator;
//! use std::time::Duration;
//!
//! let backend = native_backend().expect("event taps need macOS");
//! let coordinator = TapCoordinator::new(backend);
//! let events = coordinator.subscribe();
//!
//! coordinator.start_monitoring(TapLocation::Session, TapPlacement::Head, Duration::ZERO);
//! for event in events.iter().take(10) {
//!     println!("{:?}", event.info().event_type());
//! }
//! coordinator.stop_monitoring();
//! ```
//!
//! ## Architecture
//!
//! - [`time`]: Monotonic tick conversion and wall-clock anchoring
//! - [`capture`]: Event model, decoding, tap sessions and backends
//! - [`pipeline`]: Throttling, the event log and the coordinator
//! - [`app`]: CLI, configuration and output formatting
//!
//! ## Event Pipeline
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  CGEventTap │───▶│   Decode &  │───▶│ Ring Buffer │───▶│  Event Log  │
//! │ (event-tap) │    │   Throttle  │    │ (lock-free) │    │ (delivery)  │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//! ```
//!
//! ## Permissions
//!
//! Listening to events of other applications requires the Input Monitoring
//! permission: System Settings → Privacy & Security → Input Monitoring

pub mod time;
pub mod capture;
pub mod pipeline;
pub mod app;

// Re-export commonly used types
pub use capture::{
    Event, EventId, EventType, IdentifiedEvent, TapError, TapLocation, TapPlacement,
};
pub use pipeline::{MonitoringState, StopReason, TapCoordinator};
pub use time::timebase::MachTimebase;

/// Result type alias for the event tapper
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the event tapper
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Event capture error: {0}")]
    Capture(#[from] TapError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
