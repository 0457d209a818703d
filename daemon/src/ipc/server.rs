//! Unix domain socket server for IPC
//!
//! Provides request-response communication for the settings UI and push
//! notifications of daemon events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};

use super::protocol::{DaemonStatus, Notification, Request, Response, MAX_FRAME_LEN};
use crate::connection::ConnectionMonitor;
use crate::events::DaemonEvent;
use crate::hotkey::{HotkeyCombo, HotkeyListener};
use crate::notification::NotificationCenter;
use crate::orchestrator::Enhancer;
use crate::settings::{SettingsStore, DEFAULT_SYSTEM_PROMPT};

/// Daemon components reachable from IPC requests
#[derive(Clone)]
pub struct ServerContext {
    pub settings: Arc<SettingsStore>,
    pub monitor: Arc<ConnectionMonitor>,
    pub enhancer: Arc<Enhancer>,
    pub hotkey: Arc<Mutex<HotkeyListener>>,
    pub notices: NotificationCenter,
    pub event_tx: broadcast::Sender<DaemonEvent>,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    ctx: ServerContext,
    start_time: Instant,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a new IPC server
    pub fn new(socket_path: &Path, ctx: ServerContext) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            ctx,
            start_time: Instant::now(),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let client = Client {
                        ctx: self.ctx.clone(),
                        start_time: self.start_time,
                    };
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = client.handle(stream) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// One connected client
struct Client {
    ctx: ServerContext,
    start_time: Instant,
}

impl Client {
    /// Handle a single client connection
    async fn handle(&self, stream: UnixStream) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let mut events = self.ctx.event_tx.subscribe();
        let mut subscribed = false;

        // Frames are read on their own task so a pushed event can never
        // interrupt a partially read request
        let (request_tx, mut request_rx) = mpsc::channel::<Request>(8);
        let reader_task = tokio::spawn(async move {
            loop {
                match read_frame::<_, Request>(&mut reader).await {
                    Ok(Some(request)) => {
                        if request_tx.send(request).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("client disconnected");
                        break;
                    }
                    Err(e) => {
                        warn!(?e, "dropping client");
                        break;
                    }
                }
            }
        });

        let result = loop {
            tokio::select! {
                request = request_rx.recv() => {
                    let Some(request) = request else { break Ok(()) };
                    debug!(?request, "received request");

                    if matches!(request, Request::Subscribe) && !subscribed {
                        // Start from now, not from when the client connected
                        events = events.resubscribe();
                        subscribed = true;
                        debug!("client subscribed to notifications");
                    }
                    let response = self.process_request(request).await;
                    if let Err(e) = write_frame(&mut writer, &response).await {
                        break Err(e);
                    }
                }
                event = events.recv(), if subscribed => {
                    match event {
                        Ok(event) => {
                            let note = Notification::Event { event };
                            if let Err(e) = write_frame(&mut writer, &note).await {
                                break Err(e);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            subscribed = false;
                        }
                    }
                }
            }
        };

        reader_task.abort();
        result
    }

    /// Process a request and return a response
    async fn process_request(&self, request: Request) -> Response {
        let ctx = &self.ctx;

        match request {
            Request::Ping => Response::Pong,

            Request::Subscribe => Response::Subscribed,

            Request::GetStatus => Response::Status(self.status().await),

            Request::GetConnectivity => Response::Connectivity {
                state: ctx.monitor.current_state(),
            },

            Request::RefreshConnection => Response::Connectivity {
                state: ctx.monitor.probe().await,
            },

            Request::ListModels => Response::Models {
                models: ctx
                    .monitor
                    .current_state()
                    .models()
                    .map(<[_]>::to_vec)
                    .unwrap_or_default(),
            },

            Request::GetSettings => {
                let settings = ctx.settings.snapshot();
                let default_prompt = settings.system_prompt == DEFAULT_SYSTEM_PROMPT;
                Response::Settings {
                    settings,
                    default_prompt,
                }
            }

            Request::SetModel { model } => {
                let model = model.trim().to_string();
                let state = ctx.monitor.current_state();
                if let Some(models) = state.models() {
                    if !models.contains(&model) {
                        return Response::error(
                            "unknown_model",
                            format!("model {model:?} is not installed on the server"),
                        );
                    }
                }
                match ctx.settings.set_active_model(&model) {
                    Ok(()) => {
                        self.settings_changed();
                        Response::Ok
                    }
                    Err(e) => Response::error("invalid_settings", e.to_string()),
                }
            }

            Request::SetSystemPrompt { prompt } => match ctx.settings.set_system_prompt(&prompt) {
                Ok(()) => {
                    self.settings_changed();
                    Response::Ok
                }
                Err(e) => Response::error("invalid_settings", e.to_string()),
            },

            Request::ResetSystemPrompt => {
                ctx.settings.reset_system_prompt();
                self.settings_changed();
                Response::Ok
            }

            Request::SetHotkey { combo } => {
                let combo: HotkeyCombo = match combo.parse() {
                    Ok(combo) => combo,
                    Err(e) => return Response::error("unsupported_combo", e.to_string()),
                };
                // Backends block while the OS listener starts or stops
                let hotkey = Arc::clone(&ctx.hotkey);
                let registered = tokio::task::spawn_blocking(move || {
                    let mut listener = hotkey.blocking_lock();
                    listener.register(combo).map_err(|e| (e, listener.combo()))
                })
                .await;
                match registered {
                    Ok(Ok(())) => Response::Ok,
                    Ok(Err((e, kept))) => {
                        let message = match kept {
                            Some(kept) => format!("Hotkey {combo} unavailable, keeping {kept}: {e}"),
                            None => format!("Hotkey {combo} unavailable: {e}"),
                        };
                        ctx.notices.error(&message);
                        Response::error("hotkey", e.to_string())
                    }
                    Err(e) => Response::error("hotkey", e.to_string()),
                }
            }

            Request::Enhance { text } => match ctx.enhancer.enhance_manually(&text).await {
                Ok(text) => Response::Enhanced { text },
                Err(e) => Response::error(e.kind(), e.to_string()),
            },
        }
    }

    async fn status(&self) -> DaemonStatus {
        let ctx = &self.ctx;
        let (hotkey_registered, hotkey) = {
            let listener = ctx.hotkey.lock().await;
            (
                listener.is_registered(),
                listener.combo().map(|c| c.to_string()),
            )
        };

        DaemonStatus {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: ctx.enhancer.gate().state(),
            hotkey_registered,
            hotkey,
            connectivity: ctx.monitor.current_state(),
            active_model: ctx.settings.active_model(),
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    fn settings_changed(&self) {
        let settings = self.ctx.settings.snapshot();
        let _ = self.ctx.event_tx.send(DaemonEvent::SettingsChanged {
            selected_model: settings.selected_model,
            custom_prompt: settings.system_prompt != DEFAULT_SYSTEM_PROMPT,
        });
    }
}

/// Read one length-prefixed JSON message; `None` on clean EOF
pub async fn read_frame<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        bail!("message too large ({len} bytes)");
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;

    let message = serde_json::from_slice(&msg_buf).context("failed to parse message")?;
    Ok(Some(message))
}

/// Send a length-prefixed JSON message
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}
