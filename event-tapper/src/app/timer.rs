//! Fixed-duration stop trigger for a monitoring session

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error};

/// Runs a stop action once a duration elapses, unless cancelled first.
///
/// Dropping the timer cancels it and joins its thread.
pub struct StopTimer {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StopTimer {
    pub fn start(
        duration: Duration,
        stop: impl FnOnce() + Send + 'static,
    ) -> std::io::Result<Self> {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("monitor-timer".into())
            .spawn(move || {
                // Any message or a dropped sender means cancellation
                if let Err(RecvTimeoutError::Timeout) = cancelled.recv_timeout(duration) {
                    debug!("Monitoring duration of {:?} elapsed", duration);
                    stop();
                }
            })?;

        Ok(Self {
            cancel: Some(cancel),
            handle: Some(handle),
        })
    }

    /// Cancel the timer if it has not fired and wait for its thread
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.cancel.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Timer thread panicked");
            }
        }
    }
}

impl Drop for StopTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
