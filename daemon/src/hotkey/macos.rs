//! Global hotkey backend using macOS CGEventTap
//!
//! Each registration runs a listen-only event tap on a dedicated thread
//! with its own CFRunLoop. Unregistering stops the loop and joins the
//! thread, which drops the tap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventType, EventField,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::keys::{HotkeyCombo, Modifiers};
use super::listener::{HotkeyBackend, HotkeyError, HotkeyEvent};

/// Event-tap backend
#[derive(Default)]
pub struct EventTapBackend {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EventTapBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HotkeyBackend for EventTapBackend {
    fn register(
        &mut self,
        combo: &HotkeyCombo,
        event_tx: mpsc::Sender<HotkeyEvent>,
    ) -> Result<(), HotkeyError> {
        if self.thread.is_some() {
            return Err(HotkeyError::AlreadyRegistered);
        }
        if combo.key.mac_keycode() == u16::MAX {
            return Err(HotkeyError::UnsupportedCombo(combo.to_string()));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let combo = *combo;
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let handle = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                if let Err(e) = run_event_loop(combo, event_tx, running.clone(), ready_tx) {
                    error!(?e, "hotkey listener error");
                }

                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                HotkeyError::ThreadSpawn(e.to_string())
            })?;

        // The tap is created on the listener thread; wait for its verdict
        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.thread = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(HotkeyError::PermissionDenied)
            }
        }
    }

    fn unregister(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                warn!("hotkey listener thread panicked");
            }
        }
    }
}

impl Drop for EventTapBackend {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// Run the CFRunLoop with the event tap
fn run_event_loop(
    combo: HotkeyCombo,
    event_tx: mpsc::Sender<HotkeyEvent>,
    running: Arc<AtomicBool>,
    ready_tx: std::sync::mpsc::Sender<Result<(), HotkeyError>>,
) -> Result<(), HotkeyError> {
    let keycode = combo.key.mac_keycode();

    // Callback -> loop: (flags, keycode) of non-repeat key presses
    let (callback_tx, callback_rx) = std::sync::mpsc::channel::<(CGEventFlags, u16)>();
    let (disabled_tx, disabled_rx) = std::sync::mpsc::channel::<()>();

    // CGEventTap callback - must be fast and non-blocking
    let callback = move |_proxy: core_graphics::event::CGEventTapProxy,
                         event_type: CGEventType,
                         event: &CGEvent|
                         -> Option<CGEvent> {
        match event_type {
            CGEventType::KeyDown => {
                let repeat = event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT);
                if repeat == 0 {
                    let code =
                        event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
                    let _ = callback_tx.send((event.get_flags(), code));
                }
            }
            CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                let _ = disabled_tx.send(());
            }
            _ => {}
        }
        Some(event.clone())
    };

    let tap = match CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        callback,
    ) {
        Ok(tap) => tap,
        Err(()) => {
            error!("failed to create event tap - is Accessibility permission granted?");
            let _ = ready_tx.send(Err(HotkeyError::PermissionDenied));
            return Err(HotkeyError::PermissionDenied);
        }
    };

    let run_loop_source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            let _ = ready_tx.send(Err(HotkeyError::PermissionDenied));
            return Err(HotkeyError::PermissionDenied);
        }
    };

    tap.enable();
    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
    }

    info!(%combo, "event tap created and enabled");
    let _ = ready_tx.send(Ok(()));

    while running.load(Ordering::SeqCst) {
        // Run the loop for a short interval, then check for new events
        unsafe {
            CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, Duration::from_millis(100), true);
        }

        if disabled_rx.try_recv().is_ok() {
            warn!("event tap disabled by the system, re-enabling");
            tap.enable();
            if event_tx.blocking_send(HotkeyEvent::TapDisabled).is_err() {
                break;
            }
        }

        while let Ok((flags, code)) = callback_rx.try_recv() {
            if code != keycode {
                continue;
            }

            let held = Modifiers::from_flags(flags);
            if !combo.matches(held, combo.key) {
                continue;
            }

            debug!(%combo, "hotkey pressed");
            if event_tx.blocking_send(HotkeyEvent::Triggered).is_err() {
                warn!("failed to send hotkey event - channel closed?");
                return Ok(());
            }
        }
    }

    // Tap and run loop source are released when they go out of scope
    Ok(())
}
