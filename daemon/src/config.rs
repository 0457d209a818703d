//! Configuration loading and management

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Default base URL of the model server
pub const DEFAULT_SERVER_URL: &str = "http://localhost:11434";
/// Model used when no selection has been persisted yet
pub const DEFAULT_MODEL: &str = "mistral:7b";
/// Global hotkey registered at startup
pub const DEFAULT_HOTKEY: &str = "ctrl+alt+e";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// File holding persisted settings (model, system prompt)
    pub settings_path: PathBuf,

    /// Base URL of the model server, without trailing slash
    pub server_url: String,

    /// Model selected when nothing was persisted
    pub default_model: String,

    /// Hotkey combination, e.g. `ctrl+alt+e`
    pub hotkey: String,

    /// Upper bound on a single enhancement call
    pub request_timeout: Duration,

    /// Upper bound on catalog and reachability calls
    pub probe_timeout: Duration,

    /// Interval between background probes; `None` disables them
    pub probe_interval: Option<Duration>,

    /// Whether desktop notifications are shown
    pub notifications: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup("CLIP_PROMPT_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = lookup("HOME").context("HOME is not set")?;
                PathBuf::from(home)
                    .join(".local")
                    .join("share")
                    .join("clip-prompt")
            }
        };

        let socket_path = data_dir.join("daemon.sock");
        let settings_path = data_dir.join("settings.toml");

        let server_url = lookup("CLIP_PROMPT_SERVER_URL")
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if server_url.is_empty() {
            bail!("CLIP_PROMPT_SERVER_URL must not be empty");
        }

        let default_model = lookup("CLIP_PROMPT_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let hotkey = lookup("CLIP_PROMPT_HOTKEY").unwrap_or_else(|| DEFAULT_HOTKEY.to_string());

        let request_timeout = secs(&lookup, "CLIP_PROMPT_REQUEST_TIMEOUT_SECS", 120)?;
        let probe_timeout = secs(&lookup, "CLIP_PROMPT_PROBE_TIMEOUT_SECS", 5)?;
        if request_timeout.is_zero() || probe_timeout.is_zero() {
            bail!("timeouts must be greater than zero");
        }

        let probe_interval = Some(secs(&lookup, "CLIP_PROMPT_PROBE_INTERVAL_SECS", 60)?)
            .filter(|d| !d.is_zero());

        let notifications = parse(&lookup, "CLIP_PROMPT_NOTIFICATIONS", true)?;

        Ok(Self {
            socket_path,
            data_dir,
            settings_path,
            server_url,
            default_model,
            hotkey,
            request_timeout,
            probe_timeout,
            probe_interval,
            notifications,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    parse(lookup, key, default).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = load_with(&[("HOME", "/home/tester")]).unwrap();
        assert_eq!(
            config.data_dir,
            PathBuf::from("/home/tester/.local/share/clip-prompt")
        );
        assert!(config.socket_path.ends_with("daemon.sock"));
        assert!(config.settings_path.ends_with("settings.toml"));
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert_eq!(config.hotkey, DEFAULT_HOTKEY);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.probe_interval, Some(Duration::from_secs(60)));
        assert!(config.notifications);
    }

    #[test]
    fn test_config_overrides() {
        let config = load_with(&[
            ("CLIP_PROMPT_DATA_DIR", "/tmp/cp"),
            ("CLIP_PROMPT_SERVER_URL", "http://10.0.0.2:11434/"),
            ("CLIP_PROMPT_PROBE_INTERVAL_SECS", "0"),
            ("CLIP_PROMPT_NOTIFICATIONS", "false"),
        ])
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/cp"));
        assert_eq!(config.server_url, "http://10.0.0.2:11434");
        assert_eq!(config.probe_interval, None);
        assert!(!config.notifications);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let err = load_with(&[("HOME", "/h"), ("CLIP_PROMPT_REQUEST_TIMEOUT_SECS", "soon")])
            .unwrap_err();
        assert!(err.to_string().contains("CLIP_PROMPT_REQUEST_TIMEOUT_SECS"));

        assert!(load_with(&[("HOME", "/h"), ("CLIP_PROMPT_PROBE_TIMEOUT_SECS", "0")]).is_err());
        assert!(load_with(&[]).is_err());
    }
}
