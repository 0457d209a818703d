//! Global hotkey backend using rdev (X11 / Windows)
//!
//! `rdev::listen` cannot be stopped once started, so one listener thread
//! lives for the process and the registered combo is swapped in and out
//! of a shared slot. An empty slot delivers nothing.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use rdev::{listen, Event, EventType};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::keys::{HotkeyCombo, Key, Modifiers};
use super::listener::{HotkeyBackend, HotkeyError, HotkeyEvent};

type Slot = Arc<Mutex<Option<(HotkeyCombo, mpsc::Sender<HotkeyEvent>)>>>;

/// rdev-based backend
#[derive(Default)]
pub struct RdevBackend {
    slot: Slot,
    started: bool,
}

impl RdevBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&mut self) -> Result<(), HotkeyError> {
        let slot = Arc::clone(&self.slot);
        let (err_tx, err_rx) = std::sync::mpsc::channel();

        thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("rdev hotkey listener started");
                let mut held = Modifiers::default();
                if let Err(e) = listen(move |event| handle_event(&slot, &mut held, event)) {
                    error!("rdev listen error: {:?}", e);
                    let _ = err_tx.send(());
                }
            })
            .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

        // listen() only returns on failure, which happens right away
        if err_rx.recv_timeout(Duration::from_millis(250)).is_ok() {
            return Err(HotkeyError::PermissionDenied);
        }
        self.started = true;
        Ok(())
    }
}

impl HotkeyBackend for RdevBackend {
    fn register(
        &mut self,
        combo: &HotkeyCombo,
        event_tx: mpsc::Sender<HotkeyEvent>,
    ) -> Result<(), HotkeyError> {
        {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            if slot.is_some() {
                return Err(HotkeyError::AlreadyRegistered);
            }
            *slot = Some((*combo, event_tx));
        }

        if !self.started {
            if let Err(e) = self.start() {
                self.unregister();
                return Err(e);
            }
        }
        Ok(())
    }

    fn unregister(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        *slot = None;
    }
}

fn handle_event(slot: &Slot, held: &mut Modifiers, event: Event) {
    let (key, pressed) = match event.event_type {
        EventType::KeyPress(key) => (key, true),
        EventType::KeyRelease(key) => (key, false),
        _ => return,
    };

    let flag = match key {
        rdev::Key::ControlLeft | rdev::Key::ControlRight => Some(&mut held.control),
        rdev::Key::Alt | rdev::Key::AltGr => Some(&mut held.alt),
        rdev::Key::ShiftLeft | rdev::Key::ShiftRight => Some(&mut held.shift),
        rdev::Key::MetaLeft | rdev::Key::MetaRight => Some(&mut held.meta),
        _ => None,
    };
    if let Some(flag) = flag {
        *flag = pressed;
        return;
    }

    if !pressed {
        return;
    }

    let Some(key) = convert_key(key) else {
        return;
    };

    let slot = slot.lock().unwrap_or_else(|e| e.into_inner());
    if let Some((combo, tx)) = slot.as_ref() {
        if combo.matches(*held, key) {
            debug!(%combo, "hotkey pressed");
            // Never block the OS callback; a full queue means a trigger is pending anyway
            let _ = tx.try_send(HotkeyEvent::Triggered);
        }
    }
}

fn convert_key(key: rdev::Key) -> Option<Key> {
    use rdev::Key as R;

    let c = match key {
        R::KeyA => 'a',
        R::KeyB => 'b',
        R::KeyC => 'c',
        R::KeyD => 'd',
        R::KeyE => 'e',
        R::KeyF => 'f',
        R::KeyG => 'g',
        R::KeyH => 'h',
        R::KeyI => 'i',
        R::KeyJ => 'j',
        R::KeyK => 'k',
        R::KeyL => 'l',
        R::KeyM => 'm',
        R::KeyN => 'n',
        R::KeyO => 'o',
        R::KeyP => 'p',
        R::KeyQ => 'q',
        R::KeyR => 'r',
        R::KeyS => 's',
        R::KeyT => 't',
        R::KeyU => 'u',
        R::KeyV => 'v',
        R::KeyW => 'w',
        R::KeyX => 'x',
        R::KeyY => 'y',
        R::KeyZ => 'z',
        R::Num0 => '0',
        R::Num1 => '1',
        R::Num2 => '2',
        R::Num3 => '3',
        R::Num4 => '4',
        R::Num5 => '5',
        R::Num6 => '6',
        R::Num7 => '7',
        R::Num8 => '8',
        R::Num9 => '9',
        R::Space => return Some(Key::Space),
        R::F1 => return Some(Key::Function(1)),
        R::F2 => return Some(Key::Function(2)),
        R::F3 => return Some(Key::Function(3)),
        R::F4 => return Some(Key::Function(4)),
        R::F5 => return Some(Key::Function(5)),
        R::F6 => return Some(Key::Function(6)),
        R::F7 => return Some(Key::Function(7)),
        R::F8 => return Some(Key::Function(8)),
        R::F9 => return Some(Key::Function(9)),
        R::F10 => return Some(Key::Function(10)),
        R::F11 => return Some(Key::Function(11)),
        R::F12 => return Some(Key::Function(12)),
        _ => return None,
    };
    Some(Key::Char(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_key() {
        assert_eq!(convert_key(rdev::Key::KeyE), Some(Key::Char('e')));
        assert_eq!(convert_key(rdev::Key::F7), Some(Key::Function(7)));
        assert_eq!(convert_key(rdev::Key::Escape), None);
    }
}
