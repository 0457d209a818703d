//! Single-flight gate
//!
//! Holds the process-wide `OrchestratorState`. Both trigger paths must
//! obtain a `FlightPermit` before calling the model server; the state
//! returns to `Idle` when the permit is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::events::TriggerOrigin;

/// Whether an inference call is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrchestratorState {
    /// Waiting for a trigger
    Idle,
    /// One enhancement running
    Enhancing {
        request_id: u64,
        origin: TriggerOrigin,
    },
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrchestratorState::Idle => write!(f, "Idle"),
            OrchestratorState::Enhancing { request_id, origin } => {
                write!(f, "Enhancing(#{}, {})", request_id, origin)
            }
        }
    }
}

/// Mutual-exclusion gate for inference calls
#[derive(Debug)]
pub struct FlightGate {
    state_tx: watch::Sender<OrchestratorState>,
    next_id: AtomicU64,
}

impl FlightGate {
    pub fn new() -> Arc<Self> {
        let (state_tx, _) = watch::channel(OrchestratorState::Idle);
        Arc::new(Self {
            state_tx,
            next_id: AtomicU64::new(1),
        })
    }

    /// Enter `Enhancing`, or `None` if another call holds the gate
    pub fn try_begin(self: &Arc<Self>, origin: TriggerOrigin) -> Option<FlightPermit> {
        let mut granted = None;

        self.state_tx.send_if_modified(|state| {
            if *state != OrchestratorState::Idle {
                return false;
            }
            let request_id = self.next_id.fetch_add(1, Ordering::SeqCst);
            *state = OrchestratorState::Enhancing { request_id, origin };
            granted = Some(request_id);
            true
        });

        let request_id = granted?;
        debug!(request_id, %origin, "flight gate acquired");

        Some(FlightPermit {
            gate: Arc::clone(self),
            request_id,
            origin,
            started_at: Instant::now(),
        })
    }

    /// Current state snapshot
    pub fn state(&self) -> OrchestratorState {
        *self.state_tx.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.state() != OrchestratorState::Idle
    }

    /// Receiver that observes every transition
    pub fn subscribe(&self) -> watch::Receiver<OrchestratorState> {
        self.state_tx.subscribe()
    }

    fn finish(&self, finished: u64) {
        self.state_tx.send_if_modified(|state| match *state {
            OrchestratorState::Enhancing { request_id, .. } if request_id == finished => {
                *state = OrchestratorState::Idle;
                true
            }
            _ => false,
        });
        debug!(request_id = finished, "flight gate released");
    }
}

/// Proof of holding the gate; releases it on drop
#[derive(Debug)]
pub struct FlightPermit {
    gate: Arc<FlightGate>,
    request_id: u64,
    origin: TriggerOrigin,
    started_at: Instant,
}

impl FlightPermit {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn origin(&self) -> TriggerOrigin {
        self.origin
    }

    /// Milliseconds since the gate was acquired
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

impl Drop for FlightPermit {
    fn drop(&mut self) {
        self.gate.finish(self.request_id);
    }
}
