//! Monotonic timebase bridge
//!
//! Event timestamps delivered by the event tap are raw `mach_absolute_time`
//! ticks. This module converts them to nanoseconds and anchors them to the
//! wall clock so every decoded event can carry both representations.
//!
//! On platforms without a mach timebase the tick source is a process-local
//! monotonic clock with a 1/1 tick-to-nanosecond ratio, which keeps the
//! decoding pipeline and its tests platform independent.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::OnceLock;

/// Global timebase info, initialized once
static TIMEBASE_INFO: OnceLock<TimebaseInfo> = OnceLock::new();

#[cfg(not(target_os = "macos"))]
static PROCESS_EPOCH: OnceLock<std::time::Instant> = OnceLock::new();

/// Cached timebase conversion factors
#[derive(Debug, Clone, Copy)]
struct TimebaseInfo {
    numer: u32,
    denom: u32,
}

/// High-precision monotonic timebase.
#[derive(Debug, Clone, Copy)]
pub struct MachTimebase;

impl MachTimebase {
    /// Initialize the timebase. Safe to call any number of times.
    pub fn init() {
        Self::info();
    }

    fn info() -> TimebaseInfo {
        *TIMEBASE_INFO.get_or_init(Self::query_info)
    }

    #[cfg(target_os = "macos")]
    fn query_info() -> TimebaseInfo {
        let mut info = mach2::mach_time::mach_timebase_info_data_t { numer: 0, denom: 0 };
        // Safety: mach_timebase_info only writes into the provided struct
        unsafe {
            mach2::mach_time::mach_timebase_info(&mut info);
        }
        if info.numer == 0 || info.denom == 0 {
            return TimebaseInfo { numer: 1, denom: 1 };
        }
        TimebaseInfo {
            numer: info.numer,
            denom: info.denom,
        }
    }

    #[cfg(not(target_os = "macos"))]
    fn query_info() -> TimebaseInfo {
        PROCESS_EPOCH.get_or_init(std::time::Instant::now);
        TimebaseInfo { numer: 1, denom: 1 }
    }

    /// Current raw tick value of the monotonic counter.
    #[cfg(target_os = "macos")]
    #[inline(always)]
    pub fn now_ticks() -> u64 {
        // Safety: mach_absolute_time is always safe to call
        unsafe { mach2::mach_time::mach_absolute_time() }
    }

    /// Current raw tick value of the monotonic counter.
    #[cfg(not(target_os = "macos"))]
    #[inline(always)]
    pub fn now_ticks() -> u64 {
        let epoch = *PROCESS_EPOCH.get_or_init(std::time::Instant::now);
        u64::try_from(epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Convert raw ticks to nanoseconds.
    #[inline]
    pub fn ticks_to_nanos(ticks: u64) -> u64 {
        let info = Self::info();
        // u128 keeps large tick counts from overflowing
        ((ticks as u128 * info.numer as u128) / info.denom as u128) as u64
    }

    /// Get the timebase ratio for logging.
    pub fn get_timebase_info() -> (u32, u32) {
        let info = Self::info();
        (info.numer, info.denom)
    }
}

/// A timestamp wrapper that stores raw ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a new timestamp from raw ticks.
    #[inline]
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    /// Capture current timestamp.
    #[inline]
    pub fn now() -> Self {
        Self(MachTimebase::now_ticks())
    }

    /// Get the raw tick value.
    #[inline]
    pub const fn ticks(&self) -> u64 {
        self.0
    }

    /// Convert to nanoseconds.
    #[inline]
    pub fn as_nanos(&self) -> u64 {
        MachTimebase::ticks_to_nanos(self.0)
    }
}

/// Pairs a monotonic instant with the wall-clock time observed at that instant.
///
/// Deriving an event's wall-clock date through a fixed reference keeps decoding
/// deterministic: the same raw timestamp always maps to the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeReference {
    monotonic: Timestamp,
    wall: DateTime<Utc>,
}

impl TimeReference {
    /// Create a reference from an explicit pair.
    pub const fn new(monotonic: Timestamp, wall: DateTime<Utc>) -> Self {
        Self { monotonic, wall }
    }

    /// Capture the current monotonic and wall-clock time.
    pub fn now() -> Self {
        Self::new(Timestamp::now(), Utc::now())
    }

    /// Wall-clock time corresponding to a monotonic timestamp.
    pub fn wall_clock(&self, timestamp: Timestamp) -> DateTime<Utc> {
        let event_nanos = timestamp.as_nanos() as i128;
        let anchor_nanos = self.monotonic.as_nanos() as i128;
        let offset = (event_nanos - anchor_nanos).clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        self.wall
            .checked_add_signed(TimeDelta::nanoseconds(offset))
            .unwrap_or(self.wall)
    }
}
