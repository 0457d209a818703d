//! Enhancement core shared by the hotkey and manual entry points

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use super::gate::{FlightGate, FlightPermit};
use crate::clipboard::ClipboardError;
use crate::connection::ConnectionMonitor;
use crate::events::{DaemonEvent, RejectReason, TriggerOrigin};
use crate::inference::{EnhancementRequest, InferenceBackend, InferenceError};
use crate::settings::SettingsStore;

/// Why an enhancement produced no text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnhanceError {
    #[error("an enhancement is already running")]
    Busy,

    #[error("there is no text to enhance")]
    EmptyInput,

    #[error(transparent)]
    Clipboard(#[from] ClipboardError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl EnhanceError {
    /// Short machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            EnhanceError::Busy => "busy",
            EnhanceError::EmptyInput => "empty_input",
            EnhanceError::Clipboard(_) => "clipboard",
            EnhanceError::Inference(e) => e.kind(),
        }
    }
}

/// Runs gated inference calls and reports their lifecycle
pub struct Enhancer {
    backend: Arc<dyn InferenceBackend>,
    settings: Arc<SettingsStore>,
    monitor: Arc<ConnectionMonitor>,
    gate: Arc<FlightGate>,
    event_tx: broadcast::Sender<DaemonEvent>,
}

impl Enhancer {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        settings: Arc<SettingsStore>,
        monitor: Arc<ConnectionMonitor>,
        gate: Arc<FlightGate>,
        event_tx: broadcast::Sender<DaemonEvent>,
    ) -> Self {
        Self {
            backend,
            settings,
            monitor,
            gate,
            event_tx,
        }
    }

    pub fn gate(&self) -> &Arc<FlightGate> {
        &self.gate
    }

    /// Text in, text out. Same single-flight rule as the hotkey path.
    pub async fn enhance_manually(&self, text: &str) -> Result<String, EnhanceError> {
        let source = text.trim();
        if source.is_empty() {
            self.reject(TriggerOrigin::Manual, RejectReason::NoText);
            return Err(EnhanceError::EmptyInput);
        }

        let Some(permit) = self.gate.try_begin(TriggerOrigin::Manual) else {
            self.reject(TriggerOrigin::Manual, RejectReason::Busy);
            return Err(EnhanceError::Busy);
        };

        self.started(&permit);
        match self.infer(&permit, source).await {
            Ok(result) => {
                self.succeeded(&permit, &result);
                Ok(result)
            }
            Err(e) => {
                let err = EnhanceError::from(e);
                self.failed(&permit, &err);
                Err(err)
            }
        }
    }

    /// One inference call under `permit`
    ///
    /// Fails fast with `NoModelAvailable` when nothing is selected. Any
    /// other failure schedules a background connection probe.
    pub async fn infer(&self, permit: &FlightPermit, source: &str) -> Result<String, InferenceError> {
        let settings = self.settings.snapshot();
        let model_id = settings
            .selected_model
            .ok_or(InferenceError::NoModelAvailable)?;

        let request = EnhancementRequest {
            source_text: source.to_string(),
            model_id,
            system_prompt: settings.system_prompt,
        };

        info!(
            request_id = permit.request_id(),
            origin = %permit.origin(),
            model = %request.model_id,
            chars = source.chars().count(),
            "enhancing"
        );

        let result = match self.backend.enhance(&request).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() || text == source {
                    Err(InferenceError::EmptyResult)
                } else {
                    Ok(text.to_string())
                }
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!(request_id = permit.request_id(), error = %e, "enhancement failed");
            self.monitor.spawn_reprobe();
        }
        result
    }

    pub fn started(&self, permit: &FlightPermit) {
        let _ = self.event_tx.send(DaemonEvent::EnhancementStarted {
            request_id: permit.request_id(),
            origin: permit.origin(),
        });
    }

    pub fn succeeded(&self, permit: &FlightPermit, result: &str) {
        let duration_ms = permit.elapsed_ms();
        info!(request_id = permit.request_id(), duration_ms, "enhancement complete");
        let _ = self.event_tx.send(DaemonEvent::EnhancementSucceeded {
            request_id: permit.request_id(),
            origin: permit.origin(),
            duration_ms,
            chars: result.chars().count(),
        });
    }

    pub fn failed(&self, permit: &FlightPermit, err: &EnhanceError) {
        let _ = self.event_tx.send(DaemonEvent::EnhancementFailed {
            request_id: permit.request_id(),
            origin: permit.origin(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        });
    }

    pub fn reject(&self, origin: TriggerOrigin, reason: RejectReason) {
        info!(%origin, ?reason, "trigger rejected");
        let _ = self
            .event_tx
            .send(DaemonEvent::TriggerRejected { origin, reason });
    }
}
