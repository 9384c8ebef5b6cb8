//! Tap coordinator
//!
//! Drives the monitoring state machine and owns the event log.
//!
//! Per monitoring session there are two threads:
//! - `event-tap` (owned by [`TapSession`]): decodes and throttles each raw
//!   event and pushes the survivors into a lock-free ring buffer
//! - `tap-delivery`: drains the ring buffer in arrival order, assigns
//!   identities, appends to the log and notifies subscribers
//!
//! The delivery thread is the only writer of the log. Capture failures are
//! handed over through [`SessionSignals`] and end the session with a stop
//! reason instead of an error crossing the thread boundary.

use crate::capture::ring_buffer::{EventConsumer, EventProducer, RingBufferStats};
use crate::capture::{
    CaptureHandler, DeliveryStats, Event, EventDecoder, EventId, EventRingBuffer, EventType,
    IdentifiedEvent, RawEvent, TapBackend, TapError, TapLocation, TapPlacement, TapRequest,
    TapSession,
};
use crate::pipeline::log::EventLog;
use crate::pipeline::throttle::Throttler;
use crate::time::TimeReference;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Delivery thread sleep when there is nothing to drain
const IDLE_PARK: Duration = Duration::from_millis(20);

/// Bounds for the throttle tick on the capture thread
const MIN_TICK: Duration = Duration::from_millis(1);
const MAX_TICK: Duration = Duration::from_millis(50);

/// Lifecycle of a monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitoringState {
    Idle,
    Starting,
    Monitoring,
    Stopping,
}

/// Why the last monitoring session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "detail")]
pub enum StopReason {
    /// `stop_monitoring` was called
    Requested,
    PermissionDenied,
    TapInstallFailed(String),
    TapDisabledByOS,
}

impl From<TapError> for StopReason {
    fn from(error: TapError) -> Self {
        match error {
            TapError::PermissionDenied => StopReason::PermissionDenied,
            TapError::TapInstallFailed(detail) => StopReason::TapInstallFailed(detail),
            TapError::TapDisabledByOS => StopReason::TapDisabledByOS,
        }
    }
}

impl StopReason {
    pub fn is_failure(&self) -> bool {
        !matches!(self, StopReason::Requested)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Requested => f.write_str("stopped on request"),
            StopReason::PermissionDenied => f.write_str("permission denied"),
            StopReason::TapInstallFailed(detail) => write!(f, "tap install failed: {detail}"),
            StopReason::TapDisabledByOS => f.write_str("tap disabled by the operating system"),
        }
    }
}

/// Parameters of a monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonitoringSettings {
    pub location: TapLocation,
    pub placement: TapPlacement,
    pub throttle: Duration,
}

/// Snapshot of the coordinator's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitoringStatus {
    pub state: MonitoringState,
    /// Reason the previous session ended, `None` before the first one
    pub last_stop_reason: Option<StopReason>,
    /// Settings of the current or most recent session
    pub settings: Option<MonitoringSettings>,
}

/// Coordinator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Capacity of the capture-to-delivery ring buffer
    pub channel_capacity: usize,
    /// Keep delivered events in the log
    pub retain_events: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            channel_capacity: crate::capture::ring_buffer::DEFAULT_CAPACITY,
            retain_events: true,
        }
    }
}

/// Cross-thread flags for one monitoring session.
#[derive(Debug, Default)]
struct SessionSignals {
    /// Hook installed (set by the capture thread)
    installed: AtomicBool,
    /// Capture thread finished its last handler call
    capture_exited: AtomicBool,
    /// Terminal capture failure
    failure: Mutex<Option<StopReason>>,
    /// Delivery thread should drain and exit
    finish: AtomicBool,
}

impl SessionSignals {
    fn failure(&self) -> Option<StopReason> {
        self.failure.lock().clone()
    }
}

struct DeliveryWorker {
    handle: JoinHandle<()>,
    signals: Arc<SessionSignals>,
}

impl DeliveryWorker {
    /// Drain, stop and join the delivery thread. Returns the capture failure,
    /// if one ended the session.
    fn finish(self) -> Option<StopReason> {
        self.signals.finish.store(true, Ordering::Release);
        self.handle.thread().unpark();
        if self.handle.join().is_err() {
            error!("Delivery thread panicked");
        }
        self.signals.failure()
    }
}

struct Control {
    state: MonitoringState,
    reason: Option<StopReason>,
    settings: Option<MonitoringSettings>,
    session: Option<TapSession>,
    worker: Option<DeliveryWorker>,
    stats: Option<Arc<RingBufferStats>>,
    /// Incremented per session so stale threads cannot touch a newer one
    generation: u64,
}

struct Shared {
    backend: Arc<dyn TapBackend>,
    options: CoordinatorOptions,
    control: Mutex<Control>,
    log: EventLog,
    subscribers: Mutex<Vec<Sender<IdentifiedEvent>>>,
}

impl Shared {
    fn append(&self, event: Arc<Event>) {
        let identified = self.log.append(event);
        let mut subscribers = self.subscribers.lock();
        if !subscribers.is_empty() {
            subscribers.retain(|subscriber| subscriber.send(identified.clone()).is_ok());
        }
    }

    fn mark_monitoring(&self, generation: u64) {
        let mut control = self.control.lock();
        if control.generation == generation && control.state == MonitoringState::Starting {
            control.state = MonitoringState::Monitoring;
            info!("Event tap installed, monitoring");
        }
    }

    /// End the session after the capture thread reported a failure.
    fn finish_after_failure(&self, generation: u64, reason: StopReason) {
        let (session, worker) = {
            let mut control = self.control.lock();
            if control.generation != generation
                || !matches!(
                    control.state,
                    MonitoringState::Starting | MonitoringState::Monitoring
                )
            {
                // A concurrent stop owns the transition
                return;
            }
            control.state = MonitoringState::Stopping;
            (control.session.take(), control.worker.take())
        };

        // This runs on the delivery thread; dropping its own handle detaches it
        drop(worker);
        if let Some(mut session) = session {
            session.stop();
        }

        let mut control = self.control.lock();
        if control.generation == generation && control.state == MonitoringState::Stopping {
            warn!("Monitoring ended: {}", reason);
            control.state = MonitoringState::Idle;
            control.reason = Some(reason);
        }
    }
}

/// Orchestrates capture sessions and owns the consumer-visible log.
pub struct TapCoordinator {
    shared: Arc<Shared>,
}

impl TapCoordinator {
    pub fn new(backend: Arc<dyn TapBackend>) -> Self {
        Self::with_options(backend, CoordinatorOptions::default())
    }

    pub fn with_options(backend: Arc<dyn TapBackend>, options: CoordinatorOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                options,
                control: Mutex::new(Control {
                    state: MonitoringState::Idle,
                    reason: None,
                    settings: None,
                    session: None,
                    worker: None,
                    stats: None,
                    generation: 0,
                }),
                log: EventLog::new(options.retain_events),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn has_listen_access(&self) -> bool {
        self.shared.backend.has_listen_access()
    }

    /// Ask the OS for the listen capability; returns the resulting grant.
    pub fn request_listen_access(&self) -> bool {
        self.shared.backend.request_listen_access()
    }

    /// Start a monitoring session.
    ///
    /// Only acts from `Idle`; in any other state this is a no-op. Returns the
    /// state after the call: `Starting` on success (it becomes `Monitoring`
    /// once the hook is installed), `Idle` if the session could not start, in
    /// which case [`status`](Self::status) carries the reason.
    pub fn start_monitoring(
        &self,
        location: TapLocation,
        placement: TapPlacement,
        throttle: Duration,
    ) -> MonitoringState {
        let mut control = self.shared.control.lock();
        if control.state != MonitoringState::Idle {
            debug!("Start ignored while {:?}", control.state);
            return control.state;
        }

        let settings = MonitoringSettings {
            location,
            placement,
            throttle,
        };
        control.settings = Some(settings);

        if !self.shared.backend.has_listen_access() {
            warn!("Listen access not granted, not starting");
            control.reason = Some(StopReason::PermissionDenied);
            return MonitoringState::Idle;
        }

        control.state = MonitoringState::Starting;
        control.reason = None;
        control.generation += 1;
        let generation = control.generation;

        let ring = EventRingBuffer::with_capacity(self.shared.options.channel_capacity);
        let stats = ring.stats();
        let (producer, consumer) = ring.split();
        let signals = Arc::new(SessionSignals::default());

        let worker = {
            let shared = Arc::clone(&self.shared);
            let signals = Arc::clone(&signals);
            thread::Builder::new()
                .name("tap-delivery".into())
                .spawn(move || delivery_loop(&shared, consumer, &signals, generation))
        };
        let worker = match worker {
            Ok(handle) => DeliveryWorker {
                handle,
                signals: Arc::clone(&signals),
            },
            Err(e) => {
                error!("Failed to spawn delivery thread: {}", e);
                control.state = MonitoringState::Idle;
                control.reason = Some(StopReason::TapInstallFailed(format!(
                    "failed to spawn delivery thread: {e}"
                )));
                return MonitoringState::Idle;
            }
        };

        let stage = CaptureStage {
            decoder: EventDecoder::new(self.shared.backend.screen_height(), TimeReference::now()),
            throttler: Throttler::new(throttle),
            producer,
            signals,
            delivery: worker.handle.thread().clone(),
        };

        let mut session = TapSession::new(Arc::clone(&self.shared.backend));
        let request = TapRequest {
            location,
            placement,
        };
        match session.start(request, Box::new(stage)) {
            Ok(()) => {
                control.session = Some(session);
                control.worker = Some(worker);
                control.stats = Some(stats);
                info!(
                    "Monitoring starting (throttle {} ms)",
                    throttle.as_millis()
                );
                MonitoringState::Starting
            }
            Err(e) => {
                warn!("Failed to start tap session: {}", e);
                // The capture thread never ran, so the worker has nothing to
                // drain and never takes the control lock
                worker.finish();
                control.state = MonitoringState::Idle;
                control.reason = Some(e.into());
                MonitoringState::Idle
            }
        }
    }

    /// Stop the current session.
    ///
    /// Acts from `Starting` or `Monitoring` and blocks until the capture and
    /// delivery threads have exited; a no-op otherwise. Every event forwarded
    /// before the hook was removed is in the log when this returns.
    pub fn stop_monitoring(&self) -> MonitoringState {
        let (session, worker, generation) = {
            let mut control = self.shared.control.lock();
            match control.state {
                MonitoringState::Idle | MonitoringState::Stopping => {
                    debug!("Stop ignored while {:?}", control.state);
                    return control.state;
                }
                MonitoringState::Starting | MonitoringState::Monitoring => {}
            }
            control.state = MonitoringState::Stopping;
            (
                control.session.take(),
                control.worker.take(),
                control.generation,
            )
        };

        if let Some(mut session) = session {
            session.stop();
        }
        let failure = worker.and_then(DeliveryWorker::finish);

        let mut control = self.shared.control.lock();
        if control.generation == generation && control.state == MonitoringState::Stopping {
            control.state = MonitoringState::Idle;
            control.reason = Some(failure.unwrap_or(StopReason::Requested));
            info!("Monitoring stopped ({} events in log)", self.shared.log.len());
        }
        control.state
    }

    /// Clear the log. Every identity issued so far stops resolving.
    pub fn reset(&self) {
        self.shared.log.reset();
        info!("Event log reset");
    }

    pub fn state(&self) -> MonitoringState {
        self.shared.control.lock().state
    }

    pub fn status(&self) -> MonitoringStatus {
        let control = self.shared.control.lock();
        MonitoringStatus {
            state: control.state,
            last_stop_reason: control.reason.clone(),
            settings: control.settings,
        }
    }

    /// Snapshot of the log in append order
    pub fn events(&self) -> Vec<IdentifiedEvent> {
        self.shared.log.events()
    }

    pub fn event(&self, id: EventId) -> Option<IdentifiedEvent> {
        self.shared.log.get(id)
    }

    pub fn events_after(&self, id: EventId) -> Vec<IdentifiedEvent> {
        self.shared.log.events_after(id)
    }

    pub fn len(&self) -> usize {
        self.shared.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.log.is_empty()
    }

    /// Receive every event appended from now on.
    pub fn subscribe(&self) -> Receiver<IdentifiedEvent> {
        let (tx, rx) = mpsc::channel();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    /// Ring buffer statistics of the current or most recent session
    pub fn delivery_stats(&self) -> Option<DeliveryStats> {
        self.shared
            .control
            .lock()
            .stats
            .as_ref()
            .map(|stats| stats.snapshot())
    }
}

impl Drop for TapCoordinator {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

/// Capture-thread half of the pipeline: decode, throttle, hand off.
struct CaptureStage {
    decoder: EventDecoder,
    throttler: Throttler<Arc<Event>>,
    producer: EventProducer,
    signals: Arc<SessionSignals>,
    delivery: Thread,
}

impl CaptureStage {
    fn forward(&mut self, event: Arc<Event>) {
        if self.producer.push(event) {
            self.delivery.unpark();
        } else {
            trace!("Delivery buffer full, dropping event");
        }
    }
}

impl CaptureHandler for CaptureStage {
    fn on_installed(&mut self) {
        self.signals.installed.store(true, Ordering::Release);
        self.delivery.unpark();
    }

    fn on_event(&mut self, raw: &dyn RawEvent) {
        let event_type = EventType::from_code(raw.type_code());
        if event_type.is_tap_disabled() {
            return;
        }
        let event = Arc::new(self.decoder.decode(raw, event_type));
        if let Some(ready) = self.throttler.offer(event, Instant::now()) {
            self.forward(ready);
        }
    }

    fn tick_interval(&self) -> Option<Duration> {
        let interval = self.throttler.interval();
        (!interval.is_zero()).then(|| (interval / 2).clamp(MIN_TICK, MAX_TICK))
    }

    fn on_tick(&mut self, now: Instant) {
        if let Some(ready) = self.throttler.poll(now) {
            self.forward(ready);
        }
    }

    fn on_failure(&mut self, error: TapError) {
        *self.signals.failure.lock() = Some(error.into());
    }

    fn on_stopped(&mut self) {
        if let Some(ready) = self.throttler.flush() {
            self.forward(ready);
        }
        self.signals.capture_exited.store(true, Ordering::Release);
        self.delivery.unpark();
    }
}

fn drain(shared: &Shared, consumer: &mut EventConsumer) -> usize {
    let mut delivered = 0;
    while let Some(slot) = consumer.pop() {
        shared.append(slot.event);
        delivered += 1;
    }
    delivered
}

fn delivery_loop(
    shared: &Shared,
    mut consumer: EventConsumer,
    signals: &SessionSignals,
    generation: u64,
) {
    let mut announced = false;

    loop {
        if !announced && signals.installed.load(Ordering::Acquire) {
            announced = true;
            shared.mark_monitoring(generation);
        }

        let delivered = drain(shared, &mut consumer);

        if signals.capture_exited.load(Ordering::Acquire) {
            drain(shared, &mut consumer);
            if let Some(reason) = signals.failure() {
                shared.finish_after_failure(generation, reason);
                return;
            }
        }

        if signals.finish.load(Ordering::Acquire) {
            drain(shared, &mut consumer);
            return;
        }

        if delivered == 0 {
            thread::park_timeout(IDLE_PARK);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{SyntheticEvent, SyntheticTap};

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_start_reaches_monitoring() {
        let coordinator = TapCoordinator::new(Arc::new(SyntheticTap::new()));
        let state = coordinator.start_monitoring(
            TapLocation::Session,
            TapPlacement::Head,
            Duration::ZERO,
        );
        assert_eq!(state, MonitoringState::Starting);
        assert!(wait_for(|| coordinator.state() == MonitoringState::Monitoring));

        assert_eq!(coordinator.stop_monitoring(), MonitoringState::Idle);
        assert_eq!(
            coordinator.status().last_stop_reason,
            Some(StopReason::Requested)
        );
    }

    #[test]
    fn test_start_while_running_is_noop() {
        let tap = Arc::new(SyntheticTap::new());
        let coordinator = TapCoordinator::new(tap.clone());
        coordinator.start_monitoring(TapLocation::Session, TapPlacement::Head, Duration::ZERO);
        assert!(wait_for(|| coordinator.state() == MonitoringState::Monitoring));

        let state =
            coordinator.start_monitoring(TapLocation::Hid, TapPlacement::Tail, Duration::ZERO);
        assert_eq!(state, MonitoringState::Monitoring);
        assert_eq!(tap.install_count(), 1);
        assert_eq!(
            coordinator.status().settings.map(|s| s.location),
            Some(TapLocation::Session)
        );
        coordinator.stop_monitoring();
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let coordinator = TapCoordinator::new(Arc::new(SyntheticTap::new()));
        assert_eq!(coordinator.stop_monitoring(), MonitoringState::Idle);
        assert!(coordinator.status().last_stop_reason.is_none());
    }

    #[test]
    fn test_permission_denied_leaves_idle_with_reason() {
        let coordinator =
            TapCoordinator::new(Arc::new(SyntheticTap::new().with_listen_access(false)));
        let state =
            coordinator.start_monitoring(TapLocation::Session, TapPlacement::Head, Duration::ZERO);

        assert_eq!(state, MonitoringState::Idle);
        assert_eq!(
            coordinator.status().last_stop_reason,
            Some(StopReason::PermissionDenied)
        );
    }

    #[test]
    fn test_events_flow_into_log_and_subscribers() {
        let tap = Arc::new(SyntheticTap::new());
        let handle = tap.handle();
        let coordinator = TapCoordinator::new(tap);
        let rx = coordinator.subscribe();

        coordinator.start_monitoring(TapLocation::Session, TapPlacement::Head, Duration::ZERO);
        handle.inject(SyntheticEvent::mouse_moved(3.0, 4.0));
        assert!(wait_for(|| coordinator.len() == 1));

        let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(received, coordinator.events()[0]);
        assert_eq!(coordinator.event(received.id), Some(received.clone()));
        coordinator.stop_monitoring();

        let stats = coordinator.delivery_stats().unwrap();
        assert_eq!(stats.pushed, 1);
        assert_eq!(stats.consumed, 1);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_capture_tick_interval_bounds() {
        let ring = EventRingBuffer::with_capacity(4);
        let (producer, _consumer) = ring.split();
        let mut stage = CaptureStage {
            decoder: EventDecoder::new(None, TimeReference::now()),
            throttler: Throttler::new(Duration::ZERO),
            producer,
            signals: Arc::new(SessionSignals::default()),
            delivery: thread::current(),
        };
        assert_eq!(stage.tick_interval(), None);

        stage.throttler = Throttler::new(Duration::from_millis(500));
        assert_eq!(stage.tick_interval(), Some(MAX_TICK));

        stage.throttler = Throttler::new(Duration::from_micros(600));
        assert_eq!(stage.tick_interval(), Some(MIN_TICK));

        stage.throttler = Throttler::new(Duration::from_millis(40));
        assert_eq!(stage.tick_interval(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_stop_reason_from_tap_error() {
        assert_eq!(
            StopReason::from(TapError::TapDisabledByOS),
            StopReason::TapDisabledByOS
        );
        assert!(StopReason::PermissionDenied.is_failure());
        assert!(!StopReason::Requested.is_failure());
        assert_eq!(
            StopReason::TapInstallFailed("boom".into()).to_string(),
            "tap install failed: boom"
        );
    }
}
