//! clip-prompt-daemon: Background prompt enhancer
//!
//! Press the global hotkey with a rough prompt on the clipboard and the
//! daemon replaces it with a rewritten one produced by a local Ollama
//! server. It provides:
//! - Global hotkey detection on a dedicated thread
//! - A single-flight Idle/Enhancing orchestrator
//! - Connection monitoring with automatic model fallback
//! - Persisted model and system prompt settings
//! - IPC server for a settings UI and manual enhancement

mod clipboard;
mod config;
mod connection;
mod events;
mod hotkey;
mod inference;
mod ipc;
mod lifecycle;
mod notification;
mod orchestrator;
mod settings;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::clipboard::SystemClipboard;
use crate::config::Config;
use crate::connection::ConnectionMonitor;
use crate::events::DaemonEvent;
use crate::hotkey::{HotkeyCombo, HotkeyListener};
use crate::inference::OllamaClient;
use crate::ipc::{Server, ServerContext};
use crate::lifecycle::ShutdownSignal;
use crate::notification::{DesktopNotifier, NotificationCenter};
use crate::orchestrator::{Enhancer, FlightGate, Orchestrator};
use crate::settings::{SettingsStore, TomlFileStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "clip-prompt-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        ?config.settings_path,
        server = %config.server_url,
        "configuration loaded"
    );

    let mut shutdown = ShutdownSignal::new().context("failed to register signal handlers")?;

    // Hotkey listener -> orchestrator
    let (hotkey_tx, hotkey_rx) = mpsc::channel(32);
    // Every component -> IPC subscribers and the log
    let (event_tx, _event_rx) = broadcast::channel::<DaemonEvent>(64);

    let settings = Arc::new(SettingsStore::load(
        Arc::new(TomlFileStore::new(&config.settings_path)),
        &config.default_model,
    ));

    let backend = Arc::new(
        OllamaClient::new(
            &config.server_url,
            config.request_timeout,
            config.probe_timeout,
        )
        .context("failed to build HTTP client")?,
    );

    let notices = NotificationCenter::new(
        Arc::new(DesktopNotifier::new(config.notifications)),
        event_tx.clone(),
    );

    let monitor = Arc::new(ConnectionMonitor::new(
        backend.clone(),
        settings.clone(),
        notices.clone(),
        event_tx.clone(),
    ));

    let gate = FlightGate::new();
    let enhancer = Arc::new(Enhancer::new(
        backend,
        settings.clone(),
        monitor.clone(),
        gate,
        event_tx.clone(),
    ));

    let clipboard = Arc::new(SystemClipboard::new().context("failed to start clipboard thread")?);
    let orchestrator = Orchestrator::new(enhancer.clone(), clipboard, notices.clone());

    // Learn the model catalog before the first trigger
    let initial = monitor.probe().await;
    info!(%initial, "initial connectivity");

    // Register the global hotkey; the daemon stays useful over IPC without it
    let hotkey = Arc::new(Mutex::new(HotkeyListener::new(
        hotkey::default_backend(),
        hotkey_tx,
    )));
    let registered = match config.hotkey.parse::<HotkeyCombo>() {
        Ok(combo) => {
            let listener = Arc::clone(&hotkey);
            tokio::task::spawn_blocking(move || listener.blocking_lock().register(combo))
                .await
                .context("hotkey registration task failed")?
        }
        Err(e) => Err(e),
    };
    if let Err(e) = registered {
        error!(%e, hotkey = %config.hotkey, "failed to register global hotkey");
        warn!("continuing without hotkey support - check Accessibility/input permissions");
        notices.error(&format!("Hotkey {} unavailable: {e}", config.hotkey));
    }

    let server = Server::new(
        &config.socket_path,
        ServerContext {
            settings,
            monitor: monitor.clone(),
            enhancer,
            hotkey: hotkey.clone(),
            notices,
            event_tx: event_tx.clone(),
        },
    )?;

    let mut log_rx = event_tx.subscribe();

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the orchestrator (processes hotkey events)
        _ = orchestrator.run(hotkey_rx) => {
            info!("orchestrator exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Keep the connectivity view fresh
        _ = async {
            match config.probe_interval {
                Some(interval) => monitor.run_periodic(interval).await,
                None => std::future::pending().await,
            }
        } => {
            info!("periodic probe exited");
        }

        // Log every daemon event
        _ = async {
            loop {
                match log_rx.recv().await {
                    Ok(event) => info!(%event, "daemon event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event log receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("event log exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    let listener = Arc::clone(&hotkey);
    if let Err(e) = tokio::task::spawn_blocking(move || listener.blocking_lock().unregister()).await {
        warn!(%e, "failed to release hotkey");
    }
    server.shutdown().await;

    info!("clip-prompt-daemon stopped");

    Ok(())
}
