//! Global hotkey listener
//!
//! Owns the single system-wide registration. The platform backend does
//! the OS work; this type guarantees at most one live registration and
//! that a replaced combo is released before the new one is taken.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::keys::HotkeyCombo;

/// Events sent from the hotkey listener to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyEvent {
    /// The registered combo was pressed
    Triggered,
    /// The OS disabled the listener; presses may be missed
    TapDisabled,
}

/// Errors that can occur registering a hotkey
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HotkeyError {
    #[error("a hotkey is already registered with this backend")]
    AlreadyRegistered,

    #[error("hotkey access denied - check Accessibility/input permissions")]
    PermissionDenied,

    #[error("unsupported hotkey combination: {0:?}")]
    UnsupportedCombo(String),

    #[error("global hotkeys are not available in this build")]
    Unavailable,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

/// OS facility that delivers presses of one combo
pub trait HotkeyBackend: Send {
    /// Start delivering presses of `combo` to `event_tx`
    fn register(
        &mut self,
        combo: &HotkeyCombo,
        event_tx: mpsc::Sender<HotkeyEvent>,
    ) -> Result<(), HotkeyError>;

    /// Stop delivering presses; must release every OS resource
    fn unregister(&mut self);
}

/// Process-wide hotkey registration
pub struct HotkeyListener {
    backend: Box<dyn HotkeyBackend>,
    event_tx: mpsc::Sender<HotkeyEvent>,
    current: Option<HotkeyCombo>,
}

impl HotkeyListener {
    /// Create a new hotkey listener
    pub fn new(backend: Box<dyn HotkeyBackend>, event_tx: mpsc::Sender<HotkeyEvent>) -> Self {
        Self {
            backend,
            event_tx,
            current: None,
        }
    }

    /// Register `combo`, replacing any previous combo
    ///
    /// Registering the current combo again is a no-op. If the new combo
    /// cannot be taken the previous one is registered again.
    pub fn register(&mut self, combo: HotkeyCombo) -> Result<(), HotkeyError> {
        if self.current == Some(combo) {
            debug!(%combo, "hotkey already registered");
            return Ok(());
        }

        let previous = self.current.take();
        if let Some(old) = previous {
            info!(%old, "releasing previous hotkey");
            self.backend.unregister();
        }

        if let Err(e) = self.backend.register(&combo, self.event_tx.clone()) {
            warn!(%combo, error = %e, "hotkey registration failed");
            if let Some(old) = previous {
                match self.backend.register(&old, self.event_tx.clone()) {
                    Ok(()) => {
                        self.current = Some(old);
                        info!(%old, "previous hotkey restored");
                    }
                    Err(restore) => {
                        warn!(%old, error = %restore, "previous hotkey could not be restored");
                    }
                }
            }
            return Err(e);
        }

        self.current = Some(combo);
        info!(%combo, "hotkey registered");
        Ok(())
    }

    /// Release the current registration, if any
    pub fn unregister(&mut self) {
        if let Some(combo) = self.current.take() {
            self.backend.unregister();
            info!(%combo, "hotkey unregistered");
        }
    }

    /// Combo currently registered
    pub fn combo(&self) -> Option<HotkeyCombo> {
        self.current
    }

    /// Check if a hotkey is registered
    pub fn is_registered(&self) -> bool {
        self.current.is_some()
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        if self.current.is_some() {
            warn!("hotkey listener dropped while registered, releasing");
            self.unregister();
        }
    }
}

/// Backend for builds without a global hotkey facility
pub struct UnavailableBackend;

impl HotkeyBackend for UnavailableBackend {
    fn register(
        &mut self,
        _combo: &HotkeyCombo,
        _event_tx: mpsc::Sender<HotkeyEvent>,
    ) -> Result<(), HotkeyError> {
        Err(HotkeyError::Unavailable)
    }

    fn unregister(&mut self) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Shared view of what the fake backend was asked to do
    #[derive(Debug, Default)]
    pub struct BackendLog {
        pub registered: Vec<HotkeyCombo>,
        pub unregistered: usize,
        pub active: Option<HotkeyCombo>,
        pub sender: Option<mpsc::Sender<HotkeyEvent>>,
    }

    /// Backend that records calls and refuses double registration
    pub struct FakeBackend {
        pub log: Arc<Mutex<BackendLog>>,
        pub fail_with: Option<HotkeyError>,
        /// Combo this backend treats as taken by another application
        pub refuse: Option<HotkeyCombo>,
    }

    impl FakeBackend {
        pub fn new() -> (Self, Arc<Mutex<BackendLog>>) {
            let log = Arc::new(Mutex::new(BackendLog::default()));
            (
                Self {
                    log: log.clone(),
                    fail_with: None,
                    refuse: None,
                },
                log,
            )
        }
    }

    impl HotkeyBackend for FakeBackend {
        fn register(
            &mut self,
            combo: &HotkeyCombo,
            event_tx: mpsc::Sender<HotkeyEvent>,
        ) -> Result<(), HotkeyError> {
            if let Some(err) = self.fail_with.clone() {
                return Err(err);
            }
            if self.refuse == Some(*combo) {
                return Err(HotkeyError::UnsupportedCombo(combo.to_string()));
            }
            let mut log = self.log.lock().unwrap();
            if log.active.is_some() {
                return Err(HotkeyError::AlreadyRegistered);
            }
            log.registered.push(*combo);
            log.active = Some(*combo);
            log.sender = Some(event_tx);
            Ok(())
        }

        fn unregister(&mut self) {
            let mut log = self.log.lock().unwrap();
            log.unregistered += 1;
            log.active = None;
            log.sender = None;
        }
    }
}
