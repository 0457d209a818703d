//! Events broadcast by the daemon
//!
//! Consumed by the IPC server (status tracking, subscriber push) and by
//! the main loop for logging.

use serde::{Deserialize, Serialize};

use crate::connection::ConnectivityState;
use crate::notification::NotificationKind;

/// Where an enhancement request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOrigin {
    /// Global hotkey, clipboard in and out
    Hotkey,
    /// Direct text-in/text-out call from the settings surface
    Manual,
}

impl std::fmt::Display for TriggerOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerOrigin::Hotkey => write!(f, "hotkey"),
            TriggerOrigin::Manual => write!(f, "manual"),
        }
    }
}

/// Why a trigger did not start an enhancement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Another enhancement is in flight
    Busy,
    /// Nothing usable to enhance
    NoText,
    /// The clipboard could not be read
    ClipboardUnavailable,
}

/// Events emitted while the daemon runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonEvent {
    /// An inference call was started
    EnhancementStarted {
        request_id: u64,
        origin: TriggerOrigin,
    },

    /// An inference call produced text
    EnhancementSucceeded {
        request_id: u64,
        origin: TriggerOrigin,
        /// Wall time of the call in milliseconds
        duration_ms: u64,
        /// Length of the enhanced text in characters
        chars: usize,
    },

    /// An enhancement ended without a result
    EnhancementFailed {
        request_id: u64,
        origin: TriggerOrigin,
        /// Failure kind, e.g. `timeout` or `clipboard`
        kind: String,
        message: String,
    },

    /// A trigger was dropped before any inference call
    TriggerRejected {
        origin: TriggerOrigin,
        reason: RejectReason,
    },

    /// Connection monitor moved to a new state
    ConnectivityChanged { state: ConnectivityState },

    /// Model or system prompt changed
    SettingsChanged {
        selected_model: Option<String>,
        /// Whether the prompt differs from the built-in default
        custom_prompt: bool,
    },

    /// A user-facing notice was emitted
    Notice {
        kind: NotificationKind,
        message: String,
    },
}

impl std::fmt::Display for DaemonEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonEvent::EnhancementStarted { request_id, origin } => {
                write!(f, "ENHANCEMENT_STARTED #{} ({})", request_id, origin)
            }
            DaemonEvent::EnhancementSucceeded {
                request_id,
                duration_ms,
                ..
            } => write!(f, "ENHANCEMENT_SUCCEEDED #{} ({}ms)", request_id, duration_ms),
            DaemonEvent::EnhancementFailed {
                request_id, kind, ..
            } => write!(f, "ENHANCEMENT_FAILED #{} ({})", request_id, kind),
            DaemonEvent::TriggerRejected { origin, reason } => {
                write!(f, "TRIGGER_REJECTED ({}, {:?})", origin, reason)
            }
            DaemonEvent::ConnectivityChanged { state } => {
                write!(f, "CONNECTIVITY_CHANGED ({})", state)
            }
            DaemonEvent::SettingsChanged { selected_model, .. } => {
                write!(f, "SETTINGS_CHANGED ({:?})", selected_model)
            }
            DaemonEvent::Notice { kind, message } => write!(f, "NOTICE [{:?}] {}", kind, message),
        }
    }
}
