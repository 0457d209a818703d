//! Enhancement orchestrator
//!
//! Two states, `Idle` and `Enhancing`, guarded by one flight gate that
//! both the hotkey loop and manual enhancement go through. At most one
//! inference call is in flight; extra triggers are rejected, never queued.

mod enhancer;
mod gate;
mod machine;

pub use enhancer::{EnhanceError, Enhancer};
pub use gate::{FlightGate, OrchestratorState};
pub use machine::Orchestrator;

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use tokio::sync::broadcast;

    use super::*;
    use crate::clipboard::testing::MemoryClipboard;
    use crate::connection::ConnectionMonitor;
    use crate::events::DaemonEvent;
    use crate::inference::testing::ScriptedBackend;
    use crate::notification::testing::RecordingNotifier;
    use crate::notification::NotificationCenter;
    use crate::settings::{MemoryStore, SettingsStore};

    /// Fully wired orchestrator over in-memory collaborators
    pub struct Fixture {
        pub backend: Arc<ScriptedBackend>,
        pub clipboard: Arc<MemoryClipboard>,
        pub notifier: Arc<RecordingNotifier>,
        pub settings: Arc<SettingsStore>,
        pub monitor: Arc<ConnectionMonitor>,
        pub gate: Arc<FlightGate>,
        pub enhancer: Arc<Enhancer>,
        pub orchestrator: Arc<Orchestrator>,
        pub event_tx: broadcast::Sender<DaemonEvent>,
    }

    impl Fixture {
        pub fn new(backend: ScriptedBackend, clipboard_text: Option<&str>) -> Self {
            let clipboard = match clipboard_text {
                Some(text) => MemoryClipboard::with_text(text),
                None => MemoryClipboard::default(),
            };
            Self::with_clipboard(backend, clipboard)
        }

        pub fn with_clipboard(backend: ScriptedBackend, clipboard: MemoryClipboard) -> Self {
            let backend = Arc::new(backend);
            let clipboard = Arc::new(clipboard);
            let notifier = Arc::new(RecordingNotifier::default());
            let (event_tx, _) = broadcast::channel(64);
            let notices = NotificationCenter::new(notifier.clone(), event_tx.clone());

            let settings = Arc::new(SettingsStore::load(Arc::new(MemoryStore::default()), "m1"));
            let monitor = Arc::new(ConnectionMonitor::new(
                backend.clone(),
                settings.clone(),
                notices.clone(),
                event_tx.clone(),
            ));
            let gate = FlightGate::new();
            let enhancer = Arc::new(Enhancer::new(
                backend.clone(),
                settings.clone(),
                monitor.clone(),
                gate.clone(),
                event_tx.clone(),
            ));
            let orchestrator = Arc::new(Orchestrator::new(
                enhancer.clone(),
                clipboard.clone(),
                notices,
            ));

            Self {
                backend,
                clipboard,
                notifier,
                settings,
                monitor,
                gate,
                enhancer,
                orchestrator,
                event_tx,
            }
        }
    }
}
