//! Probe scheduling and state publication

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use super::ConnectivityState;
use crate::events::DaemonEvent;
use crate::inference::InferenceBackend;
use crate::notification::NotificationCenter;
use crate::settings::{Reconciliation, SettingsStore, DEFAULT_SYSTEM_PROMPT};

/// Owns `ConnectivityState`; only probe outcomes mutate it
pub struct ConnectionMonitor {
    backend: Arc<dyn InferenceBackend>,
    settings: Arc<SettingsStore>,
    notices: NotificationCenter,
    event_tx: broadcast::Sender<DaemonEvent>,
    state_tx: watch::Sender<ConnectivityState>,
    probing: AtomicBool,
}

/// Clears the probing flag even if the probe future is dropped
struct ProbeGuard<'a>(&'a AtomicBool);

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ConnectionMonitor {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        settings: Arc<SettingsStore>,
        notices: NotificationCenter,
        event_tx: broadcast::Sender<DaemonEvent>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectivityState::Unknown);
        Self {
            backend,
            settings,
            notices,
            event_tx,
            state_tx,
            probing: AtomicBool::new(false),
        }
    }

    /// Snapshot of the last known state. Never blocks on a probe.
    pub fn current_state(&self) -> ConnectivityState {
        self.state_tx.borrow().clone()
    }

    /// Receiver that observes every state change
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state_tx.subscribe()
    }

    /// Probe the server now and publish the outcome
    ///
    /// A probe requested while another is running is skipped and the
    /// current state returned.
    pub async fn probe(&self) -> ConnectivityState {
        if self.probing.swap(true, Ordering::SeqCst) {
            debug!("probe already running, skipping");
            return self.current_state();
        }
        let _guard = ProbeGuard(&self.probing);

        let next = match self.backend.list_models().await {
            Ok(models) => {
                self.reconcile(&models);
                ConnectivityState::Connected { models }
            }
            Err(e) => ConnectivityState::Disconnected {
                reason: e.to_string(),
            },
        };

        self.publish(next.clone());
        next
    }

    /// Re-probe in the background, used after a failed enhancement
    pub fn spawn_reprobe(self: &Arc<Self>) {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            debug!("background re-probe");
            monitor.probe().await;
        });
    }

    /// Probe on a fixed interval until the task is dropped
    pub async fn run_periodic(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; startup probes separately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.probe().await;
        }
    }

    fn publish(&self, next: ConnectivityState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });

        if !changed {
            return;
        }

        match &next {
            ConnectivityState::Connected { models } => {
                info!(models = models.len(), "model server connected")
            }
            ConnectivityState::Disconnected { reason } => {
                warn!(%reason, "model server disconnected")
            }
            ConnectivityState::Unknown => {}
        }
        let _ = self
            .event_tx
            .send(DaemonEvent::ConnectivityChanged { state: next });
    }

    fn reconcile(&self, models: &[String]) {
        match self.settings.reconcile_model(models) {
            Reconciliation::Kept(_) => return,
            Reconciliation::FellBack { previous, selected } => {
                let message = match previous {
                    Some(previous) => {
                        format!("Model {previous} is not available, switched to {selected}")
                    }
                    None => format!("Using model {selected}"),
                };
                self.notices.info(&message);
            }
            Reconciliation::Cleared => {
                self.notices
                    .warning("The model server has no models installed; enhancement is disabled");
            }
        }

        let settings = self.settings.snapshot();
        let _ = self.event_tx.send(DaemonEvent::SettingsChanged {
            selected_model: settings.selected_model,
            custom_prompt: settings.system_prompt != DEFAULT_SYSTEM_PROMPT,
        });
    }
}
