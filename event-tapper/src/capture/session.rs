//! Tap session
//!
//! Owns the dedicated capture thread. The platform hook itself is supplied by
//! a [`TapBackend`]; the session installs it with the requested location and
//! placement, drives the handler, reinstalls the hook once if the OS disables
//! it, and reports terminal failures to the handler instead of unwinding
//! across the thread boundary.

use super::types::{RawEvent, TapLocation, TapPlacement};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Failures surfaced by the capture layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TapError {
    #[error("permission to listen for input events has not been granted")]
    PermissionDenied,
    #[error("failed to install event tap: {0}")]
    TapInstallFailed(String),
    #[error("event tap was disabled by the operating system")]
    TapDisabledByOS,
}

/// Where and how to install the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TapRequest {
    pub location: TapLocation,
    pub placement: TapPlacement,
}

/// Why a backend's run loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stop was requested through [`TapControl`]
    Stopped,
    /// The OS disabled the hook
    Disabled,
}

/// Receives everything that happens on the capture thread.
///
/// All methods run on the capture thread. `on_event` runs inside the OS
/// delivery chain and must return quickly.
pub trait CaptureHandler: Send {
    /// The hook is installed and events will follow
    fn on_installed(&mut self) {}

    fn on_event(&mut self, event: &dyn RawEvent);

    /// How often `on_tick` should run while the hook is idle
    fn tick_interval(&self) -> Option<Duration> {
        None
    }

    fn on_tick(&mut self, _now: Instant) {}

    /// The session ended with an error
    fn on_failure(&mut self, error: TapError);

    /// Last call before the capture thread exits
    fn on_stopped(&mut self) {}
}

/// Platform binding for the input-event hook.
pub trait TapBackend: Send + Sync {
    fn has_listen_access(&self) -> bool;

    /// Ask the OS for the listen capability. Returns the resulting grant state.
    fn request_listen_access(&self) -> bool;

    /// Height of the main display, if known
    fn screen_height(&self) -> Option<f64>;

    /// Install the hook on the calling thread and pump events into `handler`
    /// until `control` stops or the OS disables the hook. The hook is removed
    /// before returning.
    fn run(
        &self,
        request: TapRequest,
        control: &TapControl,
        handler: &mut dyn CaptureHandler,
    ) -> Result<RunOutcome, TapError>;
}

type Waker = Box<dyn Fn() + Send>;

/// Stop flag shared between a session and its running backend.
pub struct TapControl {
    running: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl TapControl {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            waker: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn arm(&self) -> bool {
        !self.running.swap(true, Ordering::SeqCst)
    }

    /// Clear the running flag and wake the backend's run loop.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(wake) = self.waker.lock().as_ref() {
            wake();
        }
    }

    /// Install the callback used to interrupt a blocked run loop.
    pub fn set_waker(&self, waker: impl Fn() + Send + 'static) {
        *self.waker.lock() = Some(Box::new(waker));
    }

    pub fn clear_waker(&self) {
        *self.waker.lock() = None;
    }
}

impl Default for TapControl {
    fn default() -> Self {
        Self::new()
    }
}

/// One installed hook and its capture thread.
pub struct TapSession {
    backend: Arc<dyn TapBackend>,
    control: Arc<TapControl>,
    thread_handle: Option<JoinHandle<()>>,
}

impl TapSession {
    pub fn new(backend: Arc<dyn TapBackend>) -> Self {
        Self {
            backend,
            control: Arc::new(TapControl::new()),
            thread_handle: None,
        }
    }

    /// Install the hook and start delivering events to `handler`.
    ///
    /// Starting a session that is already running is a no-op.
    ///
    /// # Errors
    /// `PermissionDenied` if the listen capability is absent, `TapInstallFailed`
    /// if the capture thread cannot be spawned. Install failures inside the
    /// capture thread are reported through [`CaptureHandler::on_failure`].
    pub fn start(
        &mut self,
        request: TapRequest,
        handler: Box<dyn CaptureHandler>,
    ) -> Result<(), TapError> {
        if self.thread_handle.is_some() && self.control.is_running() {
            debug!("Tap session already running");
            return Ok(());
        }
        // A previous thread that ended on its own is reaped first
        self.join();

        if !self.backend.has_listen_access() {
            return Err(TapError::PermissionDenied);
        }

        self.control.arm();
        let backend = Arc::clone(&self.backend);
        let control = Arc::clone(&self.control);

        let handle = thread::Builder::new()
            .name("event-tap".into())
            .spawn(move || run_capture_loop(backend, control, request, handler))
            .map_err(|e| {
                self.control.request_stop();
                TapError::TapInstallFailed(format!("failed to spawn capture thread: {e}"))
            })?;

        self.thread_handle = Some(handle);
        info!(
            "Tap session started ({}, {})",
            request.location.name(),
            request.placement.name()
        );
        Ok(())
    }

    /// Remove the hook and wait for the capture thread to exit.
    ///
    /// Idempotent. No handler call begins after this returns.
    pub fn stop(&mut self) {
        if self.thread_handle.is_none() {
            return;
        }
        self.control.request_stop();
        self.join();
        info!("Tap session stopped");
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some() && self.control.is_running()
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for TapSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_capture_loop(
    backend: Arc<dyn TapBackend>,
    control: Arc<TapControl>,
    request: TapRequest,
    mut handler: Box<dyn CaptureHandler>,
) {
    let mut reinstalled = false;

    loop {
        match backend.run(request, &control, handler.as_mut()) {
            Ok(RunOutcome::Stopped) => break,
            Ok(RunOutcome::Disabled) if !control.is_running() => break,
            Ok(RunOutcome::Disabled) if !reinstalled => {
                warn!("Event tap disabled by the OS, reinstalling");
                reinstalled = true;
            }
            Ok(RunOutcome::Disabled) => {
                error!("Event tap disabled by the OS again, giving up");
                handler.on_failure(TapError::TapDisabledByOS);
                break;
            }
            Err(e) => {
                error!("Event tap error: {}", e);
                handler.on_failure(e);
                break;
            }
        }
    }

    control.clear_waker();
    control.running.store(false, Ordering::SeqCst);
    handler.on_stopped();
}
