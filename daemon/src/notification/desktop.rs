//! Desktop notifications
//!
//! - Linux: `notify-send`
//! - macOS: `osascript`
//!
//! Failures are logged and otherwise ignored.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::{NotificationKind, Notifier};

const APP_NAME: &str = "Clip Prompt";

/// Shows notices through the platform's notification daemon
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    enabled: bool,
}

impl DesktopNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, kind: NotificationKind, message: &str) {
        if !self.enabled {
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("no runtime, notification dropped");
            return;
        };

        let message = message.to_string();
        handle.spawn(async move {
            send(kind, &message).await;
        });
    }
}

fn title(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Info => APP_NAME,
        NotificationKind::Success => "Prompt enhanced",
        NotificationKind::Warning => "Clip Prompt warning",
        NotificationKind::Error => "Clip Prompt error",
    }
}

async fn send(kind: NotificationKind, body: &str) {
    #[cfg(target_os = "linux")]
    send_linux(kind, body).await;

    #[cfg(target_os = "macos")]
    send_macos(kind, body).await;

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        debug!("notifications not supported on this platform");
        let _ = (kind, body);
    }
}

#[cfg(target_os = "linux")]
async fn send_linux(kind: NotificationKind, body: &str) {
    let urgency = match kind {
        NotificationKind::Error => "critical",
        _ => "normal",
    };
    let urgency = format!("--urgency={urgency}");

    let result = Command::new("notify-send")
        .args([
            "--app-name=Clip Prompt",
            "--expire-time=3000",
            urgency.as_str(),
            title(kind),
            body,
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    if let Err(e) = result {
        debug!("failed to send notification: {}", e);
    }
}

#[cfg(target_os = "macos")]
async fn send_macos(kind: NotificationKind, body: &str) {
    let script = format!(
        "display notification \"{}\" with title \"{}\"",
        escape_applescript(body),
        escape_applescript(title(kind)),
    );

    let result = Command::new("osascript")
        .args(["-e", &script])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    if let Err(e) = result {
        debug!("failed to send notification: {}", e);
    }
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_applescript() {
        assert_eq!(escape_applescript(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
    }

    #[test]
    fn test_disabled_notifier_is_silent() {
        // No runtime here; a disabled notifier must return before needing one
        DesktopNotifier::new(false).notify(NotificationKind::Info, "ignored");
    }

    #[test]
    fn test_titles() {
        assert_eq!(title(NotificationKind::Success), "Prompt enhanced");
        assert_eq!(title(NotificationKind::Info), APP_NAME);
    }
}
