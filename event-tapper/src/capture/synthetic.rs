//! Synthetic capture backend
//!
//! An in-process [`TapBackend`] fed through a [`SyntheticTapHandle`]. Used by
//! the test suite, the benchmarks and platforms without a native event tap.

use super::session::{CaptureHandler, RunOutcome, TapBackend, TapControl, TapError, TapRequest};
use super::types::{EventType, RawEvent};
use crate::time::MachTimebase;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use tracing::trace;

/// How long the synthetic run loop waits for input between ticks
const IDLE_POLL: Duration = Duration::from_millis(10);

/// A raw event built in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticEvent {
    event_type: EventType,
    timestamp: u64,
    location: (f64, f64),
    flags: u64,
    int_fields: BTreeMap<u32, i64>,
    double_fields: BTreeMap<u32, f64>,
}

impl SyntheticEvent {
    /// A new event of the given type stamped with the current time
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            timestamp: MachTimebase::now_ticks(),
            location: (0.0, 0.0),
            flags: 0,
            int_fields: BTreeMap::new(),
            double_fields: BTreeMap::new(),
        }
    }

    pub fn mouse_moved(x: f64, y: f64) -> Self {
        Self::new(EventType::MouseMoved).with_location(x, y)
    }

    /// Key-down event carrying `key_code` in the keyboard keycode field
    pub fn key_down(key_code: i64, flags: u64) -> Self {
        Self::new(EventType::KeyDown)
            .with_flags(flags)
            .with_int_field(9, key_code)
    }

    pub fn with_location(mut self, x: f64, y: f64) -> Self {
        self.location = (x, y);
        self
    }

    pub fn with_flags(mut self, flags: u64) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_timestamp(mut self, ticks: u64) -> Self {
        self.timestamp = ticks;
        self
    }

    pub fn with_int_field(mut self, key: u32, value: i64) -> Self {
        self.int_fields.insert(key, value);
        self
    }

    pub fn with_double_field(mut self, key: u32, value: f64) -> Self {
        self.double_fields.insert(key, value);
        self
    }
}

impl RawEvent for SyntheticEvent {
    fn type_code(&self) -> u32 {
        self.event_type.code()
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn location(&self) -> (f64, f64) {
        self.location
    }

    fn flags(&self) -> u64 {
        self.flags
    }

    fn integer_field(&self, key: u32) -> i64 {
        self.int_fields.get(&key).copied().unwrap_or(0)
    }

    fn double_field(&self, key: u32) -> f64 {
        self.double_fields.get(&key).copied().unwrap_or(0.0)
    }
}

enum Injection {
    Event(SyntheticEvent),
    Disable,
    Wake,
}

/// Backend that delivers injected events instead of OS input.
pub struct SyntheticTap {
    sender: Sender<Injection>,
    inbox: Mutex<Receiver<Injection>>,
    listen_access: AtomicBool,
    grant_on_request: AtomicBool,
    failing_installs: AtomicU32,
    installs: AtomicU32,
    screen_height: Option<f64>,
}

impl SyntheticTap {
    pub fn new() -> Self {
        let (sender, inbox) = mpsc::channel();
        Self {
            sender,
            inbox: Mutex::new(inbox),
            listen_access: AtomicBool::new(true),
            grant_on_request: AtomicBool::new(false),
            failing_installs: AtomicU32::new(0),
            installs: AtomicU32::new(0),
            screen_height: Some(1080.0),
        }
    }

    pub fn with_listen_access(self, granted: bool) -> Self {
        self.listen_access.store(granted, Ordering::SeqCst);
        self
    }

    /// Grant access when `request_listen_access` is called
    pub fn granting_on_request(self) -> Self {
        self.grant_on_request.store(true, Ordering::SeqCst);
        self
    }

    /// Make the next `count` installs fail
    pub fn failing_installs(self, count: u32) -> Self {
        self.failing_installs.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_screen_height(mut self, height: Option<f64>) -> Self {
        self.screen_height = height;
        self
    }

    pub fn handle(&self) -> SyntheticTapHandle {
        SyntheticTapHandle {
            sender: self.sender.clone(),
        }
    }

    /// Number of successful installs so far
    pub fn install_count(&self) -> u32 {
        self.installs.load(Ordering::SeqCst)
    }

    fn take_install_failure(&self) -> bool {
        self.failing_installs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for SyntheticTap {
    fn default() -> Self {
        Self::new()
    }
}

impl TapBackend for SyntheticTap {
    fn has_listen_access(&self) -> bool {
        self.listen_access.load(Ordering::SeqCst)
    }

    fn request_listen_access(&self) -> bool {
        if self.grant_on_request.load(Ordering::SeqCst) {
            self.listen_access.store(true, Ordering::SeqCst);
        }
        self.has_listen_access()
    }

    fn screen_height(&self) -> Option<f64> {
        self.screen_height
    }

    fn run(
        &self,
        request: TapRequest,
        control: &TapControl,
        handler: &mut dyn CaptureHandler,
    ) -> Result<RunOutcome, TapError> {
        if self.take_install_failure() {
            return Err(TapError::TapInstallFailed(format!(
                "synthetic install failure at {}",
                request.location.name()
            )));
        }

        // One run loop at a time owns the inbox
        let inbox = self.inbox.lock();
        let waker = self.sender.clone();
        control.set_waker(move || {
            let _ = waker.send(Injection::Wake);
        });

        self.installs.fetch_add(1, Ordering::SeqCst);
        handler.on_installed();
        trace!("Synthetic tap installed");

        let poll = handler
            .tick_interval()
            .map_or(IDLE_POLL, |tick| tick.min(IDLE_POLL));

        loop {
            match inbox.recv_timeout(poll) {
                Ok(Injection::Event(event)) => handler.on_event(&event),
                Ok(Injection::Disable) => return Ok(RunOutcome::Disabled),
                Ok(Injection::Wake) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Ok(RunOutcome::Stopped),
            }
            handler.on_tick(Instant::now());

            if !control.is_running() {
                // Deliver whatever was injected before the stop request
                while let Ok(injection) = inbox.try_recv() {
                    if let Injection::Event(event) = injection {
                        handler.on_event(&event);
                    }
                }
                return Ok(RunOutcome::Stopped);
            }
        }
    }
}

/// Feeds a [`SyntheticTap`] from any thread.
#[derive(Clone)]
pub struct SyntheticTapHandle {
    sender: Sender<Injection>,
}

impl SyntheticTapHandle {
    pub fn inject(&self, event: SyntheticEvent) {
        let _ = self.sender.send(Injection::Event(event));
    }

    /// Simulate the OS disabling the hook
    pub fn disable_tap(&self) {
        let _ = self.sender.send(Injection::Disable);
    }
}
