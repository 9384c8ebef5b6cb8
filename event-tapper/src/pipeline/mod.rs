//! Event pipeline
//!
//! Throttling on the capture thread, the identity-addressable log and the
//! coordinator that wires a tap session to both.

pub mod coordinator;
pub mod log;
pub mod throttle;

pub use coordinator::{
    CoordinatorOptions, MonitoringSettings, MonitoringState, MonitoringStatus, StopReason,
    TapCoordinator,
};
pub use log::EventLog;
pub use throttle::Throttler;
