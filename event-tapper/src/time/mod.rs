//! Monotonic timing
//!
//! Raw event timestamps are monotonic tick counts. This module converts
//! them and anchors them to the wall clock.

pub mod timebase;

pub use timebase::{MachTimebase, TimeReference, Timestamp};
