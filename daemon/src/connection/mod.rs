//! Connection monitor for the model server
//!
//! Tracks a tri-state connectivity signal and the live model catalog.
//! Probes run at startup, on request, periodically, and lazily after a
//! failed enhancement. A failed probe is never sticky.

mod monitor;

use serde::{Deserialize, Serialize};

use crate::inference::ModelId;

pub use monitor::ConnectionMonitor;

/// Last known reachability of the model server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectivityState {
    /// No probe has completed yet
    Unknown,
    /// Server answered; catalog in server order
    Connected { models: Vec<ModelId> },
    /// Last probe failed
    Disconnected { reason: String },
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self::Unknown
    }
}

impl ConnectivityState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectivityState::Connected { .. })
    }

    /// Catalog from the last successful probe
    pub fn models(&self) -> Option<&[ModelId]> {
        match self {
            ConnectivityState::Connected { models } => Some(models),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityState::Unknown => write!(f, "unknown"),
            ConnectivityState::Connected { models } => {
                write!(f, "connected ({} models)", models.len())
            }
            ConnectivityState::Disconnected { reason } => write!(f, "disconnected: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&ConnectivityState::Disconnected {
            reason: "refused".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""status":"disconnected""#));

        let state: ConnectivityState = serde_json::from_str(r#"{"status":"unknown"}"#).unwrap();
        assert_eq!(state, ConnectivityState::Unknown);
    }

    #[test]
    fn test_models_accessor() {
        let state = ConnectivityState::Connected {
            models: vec!["m1".to_string()],
        };
        assert!(state.is_connected());
        assert_eq!(state.models(), Some(&["m1".to_string()][..]));
        assert_eq!(ConnectivityState::Unknown.models(), None);
    }
}
