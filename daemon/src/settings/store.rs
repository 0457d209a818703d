//! In-memory authoritative settings with write-through persistence

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::persistence::SettingsPersistence;
use super::prompt::DEFAULT_SYSTEM_PROMPT;
use crate::inference::ModelId;

const KEY_MODEL: &str = "selected_model";
const KEY_PROMPT: &str = "system_prompt";

/// User-controlled enhancement settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Model used for enhancement, `None` in degraded mode
    pub selected_model: Option<ModelId>,
    /// Instructions sent with every request
    pub system_prompt: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            selected_model: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Errors for rejected settings mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("model name must not be empty")]
    EmptyModel,

    #[error("system prompt must not be empty")]
    EmptyPrompt,
}

/// What `reconcile_model` did to the selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Selection unchanged: present in the catalog, or already cleared
    /// and the catalog is still empty
    Kept(Option<ModelId>),
    /// Selected model was missing; switched to the first catalog entry
    FellBack { previous: Option<ModelId>, selected: ModelId },
    /// Catalog is empty; nothing selected
    Cleared,
}

/// Process-wide settings holder
pub struct SettingsStore {
    settings: RwLock<Settings>,
    persistence: Arc<dyn SettingsPersistence>,
}

impl SettingsStore {
    /// Load persisted settings, using `default_model` when none was saved
    pub fn load(persistence: Arc<dyn SettingsPersistence>, default_model: &str) -> Self {
        let selected_model = read_key(persistence.as_ref(), KEY_MODEL)
            .or_else(|| Some(default_model.to_string()))
            .filter(|m| !m.trim().is_empty());
        let system_prompt = read_key(persistence.as_ref(), KEY_PROMPT)
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        info!(model = ?selected_model, "settings loaded");

        Self {
            settings: RwLock::new(Settings {
                selected_model,
                system_prompt,
            }),
            persistence,
        }
    }

    /// Consistent copy of all settings
    pub fn snapshot(&self) -> Settings {
        self.settings.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn active_model(&self) -> Option<ModelId> {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .selected_model
            .clone()
    }

    /// Select a model. Only emptiness is checked here.
    pub fn set_active_model(&self, id: &str) -> Result<(), SettingsError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SettingsError::EmptyModel);
        }

        // Persist under the write lock so the file matches the last writer
        let mut settings = self.write();
        settings.selected_model = Some(id.to_string());
        info!(model = %id, "active model changed");
        self.persist(KEY_MODEL, Some(id));
        Ok(())
    }

    /// Align the selection with the live catalog
    pub fn reconcile_model(&self, available: &[ModelId]) -> Reconciliation {
        let mut settings = self.write();
        match (settings.selected_model.clone(), available.first()) {
            (None, None) => Reconciliation::Kept(None),
            (Some(_), None) => {
                settings.selected_model = None;
                warn!("server reports no models, enhancement disabled");
                self.persist(KEY_MODEL, None);
                Reconciliation::Cleared
            }
            (Some(current), Some(_)) if available.contains(&current) => {
                Reconciliation::Kept(Some(current))
            }
            (previous, Some(first)) => {
                settings.selected_model = Some(first.clone());
                warn!(?previous, selected = %first, "selected model unavailable, falling back");
                self.persist(KEY_MODEL, Some(first));
                Reconciliation::FellBack {
                    previous,
                    selected: first.clone(),
                }
            }
        }
    }

    pub fn system_prompt(&self) -> String {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .system_prompt
            .clone()
    }

    pub fn set_system_prompt(&self, prompt: &str) -> Result<(), SettingsError> {
        if prompt.trim().is_empty() {
            return Err(SettingsError::EmptyPrompt);
        }

        let mut settings = self.write();
        settings.system_prompt = prompt.to_string();
        info!(chars = prompt.len(), "system prompt updated");
        self.persist(KEY_PROMPT, Some(prompt));
        Ok(())
    }

    /// Restore `DEFAULT_SYSTEM_PROMPT`
    pub fn reset_system_prompt(&self) {
        let mut settings = self.write();
        settings.system_prompt = DEFAULT_SYSTEM_PROMPT.to_string();
        info!("system prompt reset to default");
        self.persist(KEY_PROMPT, None);
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Settings> {
        self.settings.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Best effort; the in-memory copy stays authoritative
    fn persist(&self, key: &str, value: Option<&str>) {
        let result = match value {
            Some(value) => self.persistence.set(key, value),
            None => self.persistence.delete(key),
        };
        if let Err(e) = result {
            warn!(error = %e, key, "failed to persist setting");
        }
    }
}

fn read_key(persistence: &dyn SettingsPersistence, key: &str) -> Option<String> {
    match persistence.get(key) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, key, "failed to read persisted setting");
            None
        }
    }
}
