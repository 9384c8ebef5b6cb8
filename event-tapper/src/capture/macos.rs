//! Quartz Event Tap backend
//!
//! Installs a listen-only CGEventTap on the calling thread and pumps its
//! CFRunLoop in bounded slices so the handler gets regular ticks and a stop
//! request is honoured even when no input arrives.
//!
//! # Permissions
//!
//! Requires Input Monitoring in System Settings > Privacy & Security.

use super::session::{CaptureHandler, RunOutcome, TapBackend, TapControl, TapError, TapRequest};
use super::types::{EventType, RawEvent};
use crate::time::MachTimebase;
use core_foundation::base::{CFRelease, CFTypeRef};
use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode};
use core_graphics::display::CGDisplay;
use std::ffi::c_void;
use std::ptr;
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};

type CGEventRef = CFTypeRef;
type CGEventTapProxy = *const c_void;
type CGEventMask = u64;

// Every event type, including the tap-disabled notifications
const ALL_EVENTS_MASK: CGEventMask = !0;

// kCGEventTapOptionListenOnly
const LISTEN_ONLY: u32 = 1;

// CFRunLoopRunInMode results
const RUN_LOOP_FINISHED: i32 = 1;

/// Longest the run loop sleeps before checking the stop flag
const MAX_SLICE: Duration = Duration::from_millis(100);

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: CGEventMask,
        callback: extern "C" fn(CGEventTapProxy, u32, CGEventRef, *mut c_void) -> CGEventRef,
        user_info: *mut c_void,
    ) -> CFTypeRef;

    fn CGEventTapEnable(tap: CFTypeRef, enable: bool);

    fn CGEventGetLocation(event: CGEventRef) -> CGPoint;
    fn CGEventGetIntegerValueField(event: CGEventRef, field: u32) -> i64;
    fn CGEventGetDoubleValueField(event: CGEventRef, field: u32) -> f64;
    fn CGEventGetFlags(event: CGEventRef) -> u64;
    fn CGEventGetTimestamp(event: CGEventRef) -> u64;

    fn CGPreflightListenEventAccess() -> bool;
    fn CGRequestListenEventAccess() -> bool;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFMachPortCreateRunLoopSource(
        allocator: CFTypeRef,
        port: CFTypeRef,
        order: i64,
    ) -> CFTypeRef;

    fn CFRunLoopGetCurrent() -> CFTypeRef;
    fn CFRunLoopAddSource(rl: CFTypeRef, source: CFTypeRef, mode: CFTypeRef);
    fn CFRunLoopRemoveSource(rl: CFTypeRef, source: CFTypeRef, mode: CFTypeRef);
    fn CFRunLoopRunInMode(mode: CFTypeRef, seconds: f64, return_after_source_handled: bool)
        -> i32;
    fn CFRunLoopStop(rl: CFTypeRef);
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
struct CGPoint {
    x: f64,
    y: f64,
}

/// Borrowed CGEvent valid for one callback.
struct CgEvent {
    event_type: u32,
    event: CGEventRef,
}

impl RawEvent for CgEvent {
    fn type_code(&self) -> u32 {
        self.event_type
    }

    fn timestamp(&self) -> u64 {
        unsafe { CGEventGetTimestamp(self.event) }
    }

    fn location(&self) -> (f64, f64) {
        let point = unsafe { CGEventGetLocation(self.event) };
        (point.x, point.y)
    }

    fn flags(&self) -> u64 {
        unsafe { CGEventGetFlags(self.event) }
    }

    fn integer_field(&self, key: u32) -> i64 {
        unsafe { CGEventGetIntegerValueField(self.event, key) }
    }

    fn double_field(&self, key: u32) -> f64 {
        unsafe { CGEventGetDoubleValueField(self.event, key) }
    }
}

/// State reachable from the C callback through `user_info`.
struct CallbackContext<'a> {
    handler: &'a mut dyn CaptureHandler,
    control: &'a TapControl,
    disabled: bool,
    event_count: u64,
}

/// The event tap callback, called on the run loop thread for each event
extern "C" fn event_tap_callback(
    _proxy: CGEventTapProxy,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef {
    if user_info.is_null() {
        return event;
    }
    // Safety: user_info points at the CallbackContext owned by `run`, which
    // outlives the run loop, and the callback only runs on that thread.
    let context = unsafe { &mut *(user_info as *mut CallbackContext) };

    if EventType::from_code(event_type).is_tap_disabled() {
        context.disabled = true;
        unsafe { CFRunLoopStop(CFRunLoopGetCurrent()) };
        return event;
    }

    if !context.control.is_running() {
        return event;
    }

    context.event_count += 1;
    context.handler.on_event(&CgEvent { event_type, event });
    trace!("Delivered event type {}", event_type);

    // Listen-only: the event continues unchanged
    event
}

/// RAII guard for a CGEventTap handle. Disables and releases the tap on drop.
struct EventTapGuard(CFTypeRef);

impl Drop for EventTapGuard {
    fn drop(&mut self) {
        unsafe {
            CGEventTapEnable(self.0, false);
            CFRelease(self.0);
        }
    }
}

/// RAII guard for a CFRunLoopSource. Detaches and releases the source on drop.
struct RunLoopSourceGuard {
    run_loop: CFTypeRef,
    source: CFTypeRef,
}

impl Drop for RunLoopSourceGuard {
    fn drop(&mut self) {
        unsafe {
            CFRunLoopRemoveSource(self.run_loop, self.source, kCFRunLoopCommonModes as CFTypeRef);
            CFRelease(self.source);
        }
    }
}

/// RAII guard that drops the stop waker before the run loop goes away.
struct WakerGuard<'a>(&'a TapControl);

impl Drop for WakerGuard<'_> {
    fn drop(&mut self) {
        self.0.clear_waker();
    }
}

/// Run loop reference handed to the stop waker.
struct RunLoopHandle(CFTypeRef);

// Safety: CFRunLoopStop may be called from any thread, and the waker is
// cleared before the owning thread leaves `run`.
unsafe impl Send for RunLoopHandle {}

impl RunLoopHandle {
    fn stop(&self) {
        unsafe { CFRunLoopStop(self.0) };
    }
}

/// CoreGraphics event tap backend
#[derive(Debug, Default, Clone, Copy)]
pub struct CgEventTapBackend;

impl CgEventTapBackend {
    pub fn new() -> Self {
        MachTimebase::init();
        Self
    }
}

impl TapBackend for CgEventTapBackend {
    fn has_listen_access(&self) -> bool {
        unsafe { CGPreflightListenEventAccess() }
    }

    fn request_listen_access(&self) -> bool {
        unsafe { CGRequestListenEventAccess() }
    }

    fn screen_height(&self) -> Option<f64> {
        let height = CGDisplay::main().bounds().size.height;
        (height > 0.0).then_some(height)
    }

    fn run(
        &self,
        request: TapRequest,
        control: &TapControl,
        handler: &mut dyn CaptureHandler,
    ) -> Result<RunOutcome, TapError> {
        let mut context = CallbackContext {
            handler,
            control,
            disabled: false,
            event_count: 0,
        };
        let context_ptr: *mut CallbackContext = &mut context;

        let tap = unsafe {
            CGEventTapCreate(
                request.location as u32,
                request.placement as u32,
                LISTEN_ONLY,
                ALL_EVENTS_MASK,
                event_tap_callback,
                context_ptr as *mut c_void,
            )
        };
        if tap.is_null() {
            return Err(TapError::TapInstallFailed(format!(
                "CGEventTapCreate returned null at {} location",
                request.location.name()
            )));
        }
        let _tap_guard = EventTapGuard(tap);

        let source = unsafe { CFMachPortCreateRunLoopSource(ptr::null(), tap, 0) };
        if source.is_null() {
            return Err(TapError::TapInstallFailed(
                "failed to create run loop source".into(),
            ));
        }

        let run_loop = unsafe { CFRunLoopGetCurrent() };
        unsafe {
            CFRunLoopAddSource(run_loop, source, kCFRunLoopCommonModes as CFTypeRef);
        }
        let _source_guard = RunLoopSourceGuard { run_loop, source };

        let run_loop_handle = RunLoopHandle(run_loop);
        control.set_waker(move || run_loop_handle.stop());
        let _waker_guard = WakerGuard(control);

        unsafe { CGEventTapEnable(tap, true) };

        // Safety: the callback only runs inside CFRunLoopRunInMode below, on
        // this thread, so these accesses never overlap with it.
        let slice = unsafe { (*context_ptr).handler.tick_interval() }
            .map_or(MAX_SLICE, |tick| tick.min(MAX_SLICE))
            .as_secs_f64();
        unsafe { (*context_ptr).handler.on_installed() };
        info!(
            "Event tap installed ({}, {})",
            request.location.name(),
            request.placement.name()
        );

        let outcome = loop {
            if !control.is_running() {
                break Ok(RunOutcome::Stopped);
            }

            let result =
                unsafe { CFRunLoopRunInMode(kCFRunLoopDefaultMode as CFTypeRef, slice, false) };

            let context = unsafe { &mut *context_ptr };
            if context.disabled {
                warn!("Event tap disabled after {} events", context.event_count);
                break Ok(RunOutcome::Disabled);
            }
            context.handler.on_tick(Instant::now());

            if result == RUN_LOOP_FINISHED {
                break Err(TapError::TapInstallFailed(
                    "run loop has no event tap source".into(),
                ));
            }
        };

        let count = unsafe { (*context_ptr).event_count };
        info!("Event tap removed after delivering {} events", count);
        outcome
    }
}
