//! Settings module: selected model and system prompt
//!
//! The store holds the authoritative in-memory copy for the session and
//! writes every change through to a key-value persistence backend.

mod persistence;
mod prompt;
mod store;

#[cfg(test)]
pub use persistence::MemoryStore;
pub use persistence::{SettingsPersistence, TomlFileStore};
pub use prompt::DEFAULT_SYSTEM_PROMPT;
pub use store::{Reconciliation, Settings, SettingsStore};
