//! Hotkey-driven enhancement state machine
//!
//! Consumes the hotkey channel in order. Each accepted trigger snapshots
//! the clipboard, takes the flight gate and runs the enhancement on a
//! separate task so the loop can keep rejecting triggers meanwhile.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::enhancer::{EnhanceError, Enhancer};
use super::gate::FlightPermit;
use crate::clipboard::{ClipboardAccess, ClipboardError};
use crate::events::{RejectReason, TriggerOrigin};
use crate::hotkey::HotkeyEvent;
use crate::inference::InferenceError;
use crate::notification::NotificationCenter;

pub const MSG_ENHANCING: &str = "Enhancing…";
pub const MSG_COPY_FIRST: &str = "Copy some text first, then press the hotkey";
pub const MSG_BUSY: &str = "Already enhancing, please wait";
pub const MSG_SUCCESS: &str = "Enhanced! Ready to paste";

/// Routes hotkey triggers through the enhancement pipeline
pub struct Orchestrator {
    enhancer: Arc<Enhancer>,
    clipboard: Arc<dyn ClipboardAccess>,
    notices: NotificationCenter,
}

impl Orchestrator {
    pub fn new(
        enhancer: Arc<Enhancer>,
        clipboard: Arc<dyn ClipboardAccess>,
        notices: NotificationCenter,
    ) -> Self {
        Self {
            enhancer,
            clipboard,
            notices,
        }
    }

    /// Run the state machine, processing hotkey events
    pub async fn run(&self, mut hotkey_rx: mpsc::Receiver<HotkeyEvent>) {
        info!("orchestrator started in Idle state");

        while let Some(event) = hotkey_rx.recv().await {
            match event {
                HotkeyEvent::Triggered => {
                    self.handle_trigger().await;
                }
                HotkeyEvent::TapDisabled => {
                    warn!("hotkey tap disabled, presses may be missed");
                }
            }
        }

        info!("orchestrator stopped");
    }

    /// Handle one trigger; returns the enhancement task if one started
    pub async fn handle_trigger(&self) -> Option<JoinHandle<()>> {
        if self.enhancer.gate().is_busy() {
            self.reject_busy();
            return None;
        }

        let source = match read_clipboard(Arc::clone(&self.clipboard)).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) | Err(ClipboardError::Empty) | Err(ClipboardError::NonText) => {
                self.enhancer.reject(TriggerOrigin::Hotkey, RejectReason::NoText);
                self.notices.info(MSG_COPY_FIRST);
                return None;
            }
            Err(e @ ClipboardError::PermissionDenied) => {
                self.enhancer
                    .reject(TriggerOrigin::Hotkey, RejectReason::ClipboardUnavailable);
                self.notices.error(&format!("Could not read the clipboard: {e}"));
                return None;
            }
        };

        // Manual enhancement may have taken the gate since the check above
        let Some(permit) = self.enhancer.gate().try_begin(TriggerOrigin::Hotkey) else {
            self.reject_busy();
            return None;
        };

        self.notices.info(MSG_ENHANCING);
        self.enhancer.started(&permit);

        let enhancer = Arc::clone(&self.enhancer);
        let clipboard = Arc::clone(&self.clipboard);
        let notices = self.notices.clone();

        Some(tokio::spawn(async move {
            complete(permit, source, enhancer, clipboard, notices).await;
        }))
    }

    fn reject_busy(&self) {
        self.enhancer.reject(TriggerOrigin::Hotkey, RejectReason::Busy);
        self.notices.warning(MSG_BUSY);
    }
}

/// Inference, then clipboard write; the permit is held until both finish
async fn complete(
    permit: FlightPermit,
    source: String,
    enhancer: Arc<Enhancer>,
    clipboard: Arc<dyn ClipboardAccess>,
    notices: NotificationCenter,
) {
    let result = match enhancer.infer(&permit, source.trim()).await {
        Ok(text) => write_clipboard(clipboard, text).await,
        Err(e) => Err(EnhanceError::from(e)),
    };

    match result {
        Ok(text) => {
            enhancer.succeeded(&permit, &text);
            notices.success(MSG_SUCCESS);
        }
        Err(err) => {
            enhancer.failed(&permit, &err);
            match &err {
                EnhanceError::Inference(InferenceError::NoModelAvailable) => {
                    notices.warning(&failure_message(&err))
                }
                _ => notices.error(&failure_message(&err)),
            }
        }
    }

    drop(permit);
}

/// Clipboard access blocks on the OS, so it runs off the async workers
async fn read_clipboard(clipboard: Arc<dyn ClipboardAccess>) -> Result<String, ClipboardError> {
    tokio::task::spawn_blocking(move || clipboard.read_text())
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "clipboard read task failed");
            Err(ClipboardError::PermissionDenied)
        })
}

async fn write_clipboard(
    clipboard: Arc<dyn ClipboardAccess>,
    text: String,
) -> Result<String, EnhanceError> {
    tokio::task::spawn_blocking(move || clipboard.write_text(&text).map(|()| text))
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "clipboard write task failed");
            Err(ClipboardError::PermissionDenied)
        })
        .map_err(EnhanceError::from)
}

/// User-facing text for a failed enhancement
pub fn failure_message(err: &EnhanceError) -> String {
    match err {
        EnhanceError::Inference(InferenceError::Timeout) => {
            "The model server took too long to answer".to_string()
        }
        EnhanceError::Inference(InferenceError::Unreachable) => {
            "Cannot reach the model server. Is Ollama running?".to_string()
        }
        EnhanceError::Inference(InferenceError::EmptyResult) => {
            "The model returned nothing new; clipboard left unchanged".to_string()
        }
        EnhanceError::Inference(InferenceError::NoModelAvailable) => {
            "No model available. Install or select a model first".to_string()
        }
        EnhanceError::Inference(InferenceError::ServerError(code)) => {
            format!("The model server returned an error (HTTP {code})")
        }
        EnhanceError::Clipboard(e) => format!("Could not write to the clipboard: {e}"),
        EnhanceError::Busy => MSG_BUSY.to_string(),
        EnhanceError::EmptyInput => MSG_COPY_FIRST.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::testing::Fixture;
    use super::*;
    use crate::events::DaemonEvent;
    use crate::inference::testing::ScriptedBackend;
    use crate::notification::NotificationKind;
    use crate::orchestrator::OrchestratorState;
    use crate::settings::DEFAULT_SYSTEM_PROMPT;

    #[tokio::test]
    async fn test_successful_enhancement() {
        let f = Fixture::new(ScriptedBackend::new(&["m1"]), Some("fix my grammar pls"));
        f.backend.push_result(Ok("Please Fix My Grammar, Thanks."));

        f.orchestrator.handle_trigger().await.unwrap().await.unwrap();

        assert_eq!(
            f.clipboard.text().as_deref(),
            Some("Please Fix My Grammar, Thanks.")
        );
        assert_eq!(
            f.notifier.take(),
            vec![
                (NotificationKind::Info, MSG_ENHANCING.to_string()),
                (NotificationKind::Success, MSG_SUCCESS.to_string()),
            ]
        );

        let requests = f.backend.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].source_text, "fix my grammar pls");
        assert_eq!(requests[0].model_id, "m1");
        assert_eq!(requests[0].system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(f.gate.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn test_empty_clipboard_makes_no_call() {
        let f = Fixture::new(ScriptedBackend::new(&["m1"]), None);

        assert!(f.orchestrator.handle_trigger().await.is_none());

        assert_eq!(f.backend.enhance_calls(), 0);
        assert_eq!(f.clipboard.write_count(), 0);
        assert_eq!(
            f.notifier.take(),
            vec![(NotificationKind::Info, MSG_COPY_FIRST.to_string())]
        );
        assert_eq!(f.gate.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn test_whitespace_clipboard_counts_as_empty() {
        let f = Fixture::new(ScriptedBackend::new(&["m1"]), Some("  \n\t "));
        assert!(f.orchestrator.handle_trigger().await.is_none());
        assert_eq!(f.backend.enhance_calls(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_clipboard() {
        let f = Fixture::with_clipboard(
            ScriptedBackend::new(&["m1"]),
            crate::clipboard::testing::MemoryClipboard::failing(ClipboardError::PermissionDenied),
        );
        assert!(f.orchestrator.handle_trigger().await.is_none());
        assert_eq!(f.backend.enhance_calls(), 0);
        assert_eq!(f.notifier.kinds(), vec![NotificationKind::Error]);
    }

    #[tokio::test]
    async fn test_failure_leaves_clipboard_and_reprobes() {
        let f = Fixture::new(ScriptedBackend::new(&["m1"]), Some("draft text"));
        f.backend.push_result(Err(InferenceError::Unreachable));
        let mut connectivity = f.monitor.subscribe();

        f.orchestrator.handle_trigger().await.unwrap().await.unwrap();

        assert_eq!(f.clipboard.text().as_deref(), Some("draft text"));
        assert_eq!(f.clipboard.write_count(), 0);
        assert_eq!(
            f.notifier.kinds(),
            vec![NotificationKind::Info, NotificationKind::Error]
        );

        tokio::time::timeout(Duration::from_secs(2), connectivity.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(f.backend.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_result_is_a_failure() {
        let f = Fixture::new(ScriptedBackend::new(&["m1"]), Some("already perfect"));
        f.backend.push_result(Ok("  already perfect \n"));

        f.orchestrator.handle_trigger().await.unwrap().await.unwrap();

        assert_eq!(f.clipboard.write_count(), 0);
        assert_eq!(
            f.notifier.kinds(),
            vec![NotificationKind::Info, NotificationKind::Error]
        );
    }

    #[tokio::test]
    async fn test_no_model_fails_fast_without_network() {
        let f = Fixture::new(ScriptedBackend::new(&["m1"]), Some("some text"));
        f.settings.reconcile_model(&[]);
        f.notifier.take();

        f.orchestrator.handle_trigger().await.unwrap().await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(f.backend.enhance_calls(), 0);
        assert_eq!(f.backend.list_calls(), 0);
        assert_eq!(f.clipboard.text().as_deref(), Some("some text"));
        assert_eq!(
            f.notifier.kinds(),
            vec![NotificationKind::Info, NotificationKind::Warning]
        );
    }

    #[tokio::test]
    async fn test_triggers_while_enhancing_are_rejected() {
        let f = Fixture::new(
            ScriptedBackend::new(&["m1"]).with_delay(Duration::from_millis(50)),
            Some("rough idea"),
        );
        f.backend.push_result(Ok("A polished idea"));
        let mut events = f.event_tx.subscribe();

        let task = f.orchestrator.handle_trigger().await.unwrap();
        for _ in 0..5 {
            assert!(f.orchestrator.handle_trigger().await.is_none());
        }
        task.await.unwrap();

        assert_eq!(f.backend.enhance_calls(), 1);
        assert_eq!(f.clipboard.write_count(), 1);

        let mut busy = 0;
        while let Ok(event) = events.try_recv() {
            if let DaemonEvent::TriggerRejected {
                reason: RejectReason::Busy,
                ..
            } = event
            {
                busy += 1;
            }
        }
        assert_eq!(busy, 5);
    }

    #[tokio::test]
    async fn test_manual_and_hotkey_share_the_gate() {
        let f = Fixture::new(
            ScriptedBackend::new(&["m1"]).with_delay(Duration::from_millis(100)),
            Some("clipboard text"),
        );
        f.backend.push_result(Ok("manual result"));

        let enhancer = f.enhancer.clone();
        let manual = tokio::spawn(async move { enhancer.enhance_manually("typed text").await });
        while !f.gate.is_busy() {
            tokio::task::yield_now().await;
        }

        assert!(f.orchestrator.handle_trigger().await.is_none());
        assert_eq!(
            f.enhancer.enhance_manually("another").await,
            Err(EnhanceError::Busy)
        );

        assert_eq!(manual.await.unwrap(), Ok("manual result".to_string()));
        assert_eq!(f.backend.enhance_calls(), 1);
        assert_eq!(f.clipboard.write_count(), 0);

        // Hotkey path holds the gate; manual is refused
        f.backend.push_result(Ok("hotkey result"));
        let task = f.orchestrator.handle_trigger().await.unwrap();
        assert_eq!(
            f.enhancer.enhance_manually("typed").await,
            Err(EnhanceError::Busy)
        );
        task.await.unwrap();
        assert_eq!(f.clipboard.text().as_deref(), Some("hotkey result"));
    }

    #[tokio::test]
    async fn test_clipboard_write_failure() {
        let f = Fixture::new(ScriptedBackend::new(&["m1"]), Some("text"));
        f.backend.push_result(Ok("better text"));
        *f.clipboard.write_error.lock().unwrap() = Some(ClipboardError::PermissionDenied);

        f.orchestrator.handle_trigger().await.unwrap().await.unwrap();

        assert_eq!(f.clipboard.text().as_deref(), Some("text"));
        assert_eq!(
            f.notifier.kinds(),
            vec![NotificationKind::Info, NotificationKind::Error]
        );
        assert_eq!(f.gate.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn test_reenhancing_output_is_allowed() {
        let f = Fixture::new(ScriptedBackend::new(&["m1"]), Some("v1"));
        f.backend.push_result(Ok("v2"));
        f.backend.push_result(Ok("v3"));

        f.orchestrator.handle_trigger().await.unwrap().await.unwrap();
        f.orchestrator.handle_trigger().await.unwrap().await.unwrap();

        assert_eq!(f.clipboard.text().as_deref(), Some("v3"));
        let requests = f.backend.requests.lock().unwrap().clone();
        assert_eq!(requests[1].source_text, "v2");
    }

    /// Clipboard whose reads block the calling thread
    struct SlowClipboard;

    impl ClipboardAccess for SlowClipboard {
        fn read_text(&self) -> Result<String, ClipboardError> {
            std::thread::sleep(Duration::from_millis(150));
            Ok("slow text".to_string())
        }

        fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
            std::thread::sleep(Duration::from_millis(150));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_clipboard_access_does_not_stall_runtime() {
        let f = Fixture::new(ScriptedBackend::new(&["m1"]), None);
        f.backend.push_result(Ok("Slow text, enhanced"));
        let notices = NotificationCenter::new(f.notifier.clone(), f.event_tx.clone());
        let orchestrator = Orchestrator::new(f.enhancer.clone(), Arc::new(SlowClipboard), notices);

        let ticks = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        });

        // Single-threaded runtime: the ticker only advances if the read
        // happens off this thread
        orchestrator.handle_trigger().await.unwrap().await.unwrap();
        ticker.abort();

        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) >= 5);
        assert_eq!(f.notifier.kinds().last(), Some(&NotificationKind::Success));
    }

    #[tokio::test]
    async fn test_run_loop_consumes_channel() {
        let f = Fixture::new(ScriptedBackend::new(&["m1"]), Some("loop text"));
        f.backend.push_result(Ok("Loop text, enhanced"));
        let mut state = f.gate.subscribe();

        let (tx, rx) = mpsc::channel(4);
        let orchestrator = f.orchestrator.clone();
        let runner = tokio::spawn(async move { orchestrator.run(rx).await });

        tx.send(HotkeyEvent::TapDisabled).await.unwrap();
        tx.send(HotkeyEvent::Triggered).await.unwrap();

        // Idle -> Enhancing -> Idle
        tokio::time::timeout(Duration::from_secs(2), async {
            state.changed().await.unwrap();
            while *state.borrow_and_update() != OrchestratorState::Idle {
                state.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        drop(tx);
        runner.await.unwrap();
        assert_eq!(f.clipboard.text().as_deref(), Some("Loop text, enhanced"));
    }

    #[test]
    fn test_failure_messages() {
        assert!(failure_message(&EnhanceError::Inference(InferenceError::ServerError(503)))
            .contains("503"));
        assert!(failure_message(&EnhanceError::Inference(InferenceError::Unreachable))
            .contains("reach"));
    }
}
