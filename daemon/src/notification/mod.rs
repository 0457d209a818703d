//! User-facing notifications
//!
//! Notices are fire-and-forget. Every notice is logged, broadcast on the
//! event bus for IPC subscribers, and handed to a desktop `Notifier`.

mod desktop;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::events::DaemonEvent;

pub use desktop::DesktopNotifier;

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Sink for user-facing notices
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotificationKind, message: &str);
}

/// Fans a notice out to the log, the event bus and the desktop notifier
#[derive(Clone)]
pub struct NotificationCenter {
    notifier: Arc<dyn Notifier>,
    event_tx: broadcast::Sender<DaemonEvent>,
}

impl NotificationCenter {
    pub fn new(notifier: Arc<dyn Notifier>, event_tx: broadcast::Sender<DaemonEvent>) -> Self {
        Self { notifier, event_tx }
    }

    pub fn emit(&self, kind: NotificationKind, message: &str) {
        match kind {
            NotificationKind::Warning | NotificationKind::Error => {
                warn!(?kind, %message, "notice")
            }
            _ => info!(?kind, %message, "notice"),
        }

        let _ = self.event_tx.send(DaemonEvent::Notice {
            kind,
            message: message.to_string(),
        });
        self.notifier.notify(kind, message);
    }

    pub fn info(&self, message: &str) {
        self.emit(NotificationKind::Info, message);
    }

    pub fn success(&self, message: &str) {
        self.emit(NotificationKind::Success, message);
    }

    pub fn warning(&self, message: &str) {
        self.emit(NotificationKind::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.emit(NotificationKind::Error, message);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;

    #[test]
    fn test_center_fans_out() {
        let recorder = Arc::new(RecordingNotifier::default());
        let (tx, mut rx) = broadcast::channel(8);
        let center = NotificationCenter::new(recorder.clone(), tx);

        center.success("done");
        center.error("broken");

        assert_eq!(
            recorder.take(),
            vec![
                (NotificationKind::Success, "done".to_string()),
                (NotificationKind::Error, "broken".to_string()),
            ]
        );
        assert!(matches!(
            rx.try_recv().unwrap(),
            DaemonEvent::Notice {
                kind: NotificationKind::Success,
                ..
            }
        ));
    }

    #[test]
    fn test_emit_without_subscribers() {
        let recorder = Arc::new(RecordingNotifier::default());
        let (tx, rx) = broadcast::channel(8);
        drop(rx);
        let center = NotificationCenter::new(recorder.clone(), tx);

        center.info("nobody listening");
        assert_eq!(recorder.kinds(), vec![NotificationKind::Info]);
    }
}
