//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::connection::ConnectivityState;
use crate::events::DaemonEvent;
use crate::inference::ModelId;
use crate::orchestrator::OrchestratorState;
use crate::settings::Settings;

/// Largest accepted frame body
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from the settings UI to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Push daemon events on this connection from now on
    Subscribe,

    /// Last known model server state, without probing
    GetConnectivity,

    /// Probe the model server now
    RefreshConnection,

    /// Model catalog from the last successful probe
    ListModels,

    /// Current model and system prompt
    GetSettings,

    /// Select a model
    SetModel { model: ModelId },

    /// Replace the system prompt
    SetSystemPrompt { prompt: String },

    /// Restore the built-in system prompt
    ResetSystemPrompt,

    /// Change the global hotkey
    SetHotkey { combo: String },

    /// Enhance `text` and return the result; clipboard untouched
    Enhance { text: String },
}

/// Responses from daemon to UI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Subscription confirmed
    Subscribed,

    /// Model server state
    Connectivity { state: ConnectivityState },

    /// Known models, empty when not connected
    Models { models: Vec<ModelId> },

    /// Current settings
    Settings {
        settings: Settings,
        /// Whether the prompt is the built-in default
        default_prompt: bool,
    },

    /// Mutation applied
    Ok,

    /// Result of an `enhance` request
    Enhanced { text: String },

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to UI (for subscribed clients)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A daemon event occurred
    Event { event: DaemonEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Whether an enhancement is running
    pub state: OrchestratorState,

    /// Whether hotkey is registered
    pub hotkey_registered: bool,

    /// Registered combo, e.g. `ctrl+alt+e`
    pub hotkey: Option<String>,

    /// Model server state
    pub connectivity: ConnectivityState,

    /// Model used for the next enhancement
    pub active_model: Option<ModelId>,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for DaemonStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: OrchestratorState::default(),
            hotkey_registered: false,
            hotkey: None,
            connectivity: ConnectivityState::default(),
            active_model: None,
            uptime_secs: 0,
        }
    }
}
