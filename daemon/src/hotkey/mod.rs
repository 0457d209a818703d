//! Hotkey module for the global enhance trigger
//!
//! Exactly one combo is registered system-wide at a time. Presses are
//! forwarded undebounced, in OS order, as `HotkeyEvent::Triggered`.

mod keys;
mod listener;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(all(feature = "rdev-hotkey", not(target_os = "macos")))]
mod rdev_backend;

pub use keys::HotkeyCombo;
pub use listener::{HotkeyBackend, HotkeyError, HotkeyEvent, HotkeyListener, UnavailableBackend};

#[cfg(test)]
pub(crate) use listener::testing;

/// The OS backend for this build
pub fn default_backend() -> Box<dyn HotkeyBackend> {
    #[cfg(target_os = "macos")]
    {
        Box::new(macos::EventTapBackend::new())
    }

    #[cfg(all(feature = "rdev-hotkey", not(target_os = "macos")))]
    {
        Box::new(rdev_backend::RdevBackend::new())
    }

    #[cfg(not(any(target_os = "macos", feature = "rdev-hotkey")))]
    {
        Box::new(UnavailableBackend)
    }
}
