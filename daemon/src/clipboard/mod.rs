//! System clipboard access
//!
//! Reads and writes are fast and may fail; every failure is a recoverable
//! `ClipboardError`.

use std::sync::{mpsc, Mutex};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Clipboard failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipboardError {
    #[error("the clipboard holds no text")]
    Empty,

    #[error("clipboard access was denied")]
    PermissionDenied,

    #[error("the clipboard holds something other than text")]
    NonText,
}

/// Text access to the clipboard
pub trait ClipboardAccess: Send + Sync {
    fn read_text(&self) -> Result<String, ClipboardError>;
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Requests served by the clipboard thread
enum Command {
    Read(mpsc::Sender<Result<String, ClipboardError>>),
    Write(String, mpsc::Sender<Result<(), ClipboardError>>),
}

/// The OS clipboard via `arboard`
///
/// A dedicated thread owns the `arboard` handle for the whole process; on
/// X11 that handle keeps serving what was written.
pub struct SystemClipboard {
    tx: Mutex<mpsc::Sender<Command>>,
}

impl SystemClipboard {
    /// Spawn the clipboard thread
    pub fn new() -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Command>();

        thread::Builder::new()
            .name("clipboard".to_string())
            .spawn(move || serve(rx))?;

        Ok(Self { tx: Mutex::new(tx) })
    }

    fn send(&self, command: Command) -> Result<(), ClipboardError> {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        tx.send(command).map_err(|_| {
            warn!("clipboard thread is gone");
            ClipboardError::PermissionDenied
        })
    }
}

fn serve(rx: mpsc::Receiver<Command>) {
    let mut clipboard: Option<arboard::Clipboard> = None;

    while let Ok(command) = rx.recv() {
        match command {
            Command::Read(reply) => {
                let _ = reply.send(with_handle(&mut clipboard, |c| c.get_text()));
            }
            Command::Write(text, reply) => {
                let _ = reply.send(with_handle(&mut clipboard, |c| c.set_text(text)));
            }
        }
    }

    debug!("clipboard thread stopped");
}

/// Run `op` on the handle, opening it first if needed
fn with_handle<T>(
    slot: &mut Option<arboard::Clipboard>,
    op: impl FnOnce(&mut arboard::Clipboard) -> Result<T, arboard::Error>,
) -> Result<T, ClipboardError> {
    if slot.is_none() {
        *slot = Some(arboard::Clipboard::new().map_err(classify)?);
    }
    let clipboard = slot.as_mut().ok_or(ClipboardError::PermissionDenied)?;

    op(clipboard).map_err(|e| {
        if matches!(e, arboard::Error::ClipboardNotSupported | arboard::Error::Unknown { .. }) {
            // Reopen on the next access
            *slot = None;
        }
        classify(e)
    })
}

fn classify(err: arboard::Error) -> ClipboardError {
    debug!(error = %err, "clipboard error");
    match err {
        arboard::Error::ContentNotAvailable => ClipboardError::Empty,
        arboard::Error::ConversionFailure => ClipboardError::NonText,
        _ => ClipboardError::PermissionDenied,
    }
}

impl ClipboardAccess for SystemClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        let (reply, rx) = mpsc::channel();
        self.send(Command::Read(reply))?;
        rx.recv().unwrap_or(Err(ClipboardError::PermissionDenied))
    }

    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let (reply, rx) = mpsc::channel();
        self.send(Command::Write(text.to_string(), reply))?;
        rx.recv().unwrap_or(Err(ClipboardError::PermissionDenied))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// In-memory clipboard with scriptable failures
    pub struct MemoryClipboard {
        pub contents: Mutex<Result<String, ClipboardError>>,
        pub write_error: Mutex<Option<ClipboardError>>,
        pub writes: Mutex<Vec<String>>,
    }

    impl MemoryClipboard {
        pub fn with_text(text: &str) -> Self {
            let clipboard = Self::default();
            *clipboard.contents.lock().unwrap() = Ok(text.to_string());
            clipboard
        }

        pub fn failing(err: ClipboardError) -> Self {
            let clipboard = Self::default();
            *clipboard.contents.lock().unwrap() = Err(err);
            clipboard
        }

        pub fn text(&self) -> Option<String> {
            self.contents.lock().unwrap().clone().ok()
        }

        pub fn write_count(&self) -> usize {
            self.writes.lock().unwrap().len()
        }
    }

    impl Default for MemoryClipboard {
        fn default() -> Self {
            Self {
                contents: Mutex::new(Err(ClipboardError::Empty)),
                write_error: Mutex::new(None),
                writes: Mutex::new(Vec::new()),
            }
        }
    }

    impl ClipboardAccess for MemoryClipboard {
        fn read_text(&self) -> Result<String, ClipboardError> {
            self.contents.lock().unwrap().clone()
        }

        fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
            if let Some(err) = *self.write_error.lock().unwrap() {
                return Err(err);
            }
            self.writes.lock().unwrap().push(text.to_string());
            *self.contents.lock().unwrap() = Ok(text.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryClipboard;
    use super::*;

    #[test]
    fn test_classify_arboard_errors() {
        assert_eq!(
            classify(arboard::Error::ContentNotAvailable),
            ClipboardError::Empty
        );
        assert_eq!(
            classify(arboard::Error::ConversionFailure),
            ClipboardError::NonText
        );
        assert_eq!(
            classify(arboard::Error::ClipboardOccupied),
            ClipboardError::PermissionDenied
        );
    }

    #[test]
    fn test_memory_clipboard() {
        let clipboard = MemoryClipboard::with_text("hello");
        assert_eq!(clipboard.read_text(), Ok("hello".to_string()));
        clipboard.write_text("world").unwrap();
        assert_eq!(clipboard.text().as_deref(), Some("world"));
        assert_eq!(clipboard.write_count(), 1);
    }
}
