//! Unix domain socket server for IPC
//!
//! Provides request-response communication, forwards session, engine and
//! microphone reports to the bridge, and pushes events and capability
//! commands to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::mic::RemoteMicrophone;
use crate::state::BridgeInput;
use crate::wake::WakeWordStatus;

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// Largest accepted message body
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Connection from the server to a running bridge
#[derive(Clone)]
pub struct BridgeLink {
    /// Ordered input queue of the bridge task
    pub inputs: mpsc::Sender<BridgeInput>,
    /// Microphone whose state clients report
    pub mic: Arc<RemoteMicrophone>,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    notify_tx: broadcast::Sender<Notification>,
    link: Option<BridgeLink>,
}

/// Shared server state
struct ServerState {
    status: DaemonStatus,
    start_time: std::time::Instant,
}

/// Everything a client handler needs
#[derive(Clone)]
struct ClientContext {
    state: Arc<RwLock<ServerState>>,
    notify_tx: broadcast::Sender<Notification>,
    link: Option<BridgeLink>,
}

/// Messages queued for a client's writer task
enum Outgoing {
    Response(Response),
    /// Start forwarding notifications, then send the confirmation
    Subscribe(Response),
}

impl Server {
    /// Create a new IPC server without a wake word bridge
    pub fn new(socket_path: &Path, notify_tx: broadcast::Sender<Notification>) -> Result<Self> {
        Self::bind(socket_path, notify_tx, None)
    }

    /// Create a new IPC server that drives a wake word bridge
    pub fn with_bridge(
        socket_path: &Path,
        notify_tx: broadcast::Sender<Notification>,
        link: BridgeLink,
    ) -> Result<Self> {
        Self::bind(socket_path, notify_tx, Some(link))
    }

    fn bind(
        socket_path: &Path,
        notify_tx: broadcast::Sender<Notification>,
        link: Option<BridgeLink>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path)
            .context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            status: DaemonStatus {
                available: link.is_some(),
                ..DaemonStatus::default()
            },
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, available = link.is_some(), "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
            notify_tx,
            link,
        })
    }

    /// Update the wake word status reported to clients
    pub async fn set_wake_word(&self, wake_word: WakeWordStatus) {
        let mut server_state = self.state.write().await;
        if server_state.status.wake_word.mode != wake_word.mode {
            info!(
                from = %server_state.status.wake_word.mode,
                to = %wake_word.mode,
                "IPC server: wake word mode updated"
            );
        }
        server_state.status.wake_word = wake_word;
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref()
            .context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let ctx = ClientContext {
                        state: Arc::clone(&self.state),
                        notify_tx: self.notify_tx.clone(),
                        link: self.link.clone(),
                    };
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, ctx) => {
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

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, ctx: ClientContext) -> Result<()> {
        let (mut reader, writer) = stream.into_split();
        let (out_tx, out_rx) = mpsc::channel(32);
        let writer_task = tokio::spawn(Self::write_loop(writer, out_rx, ctx.notify_tx.clone()));

        let result = Self::read_loop(&mut reader, &out_tx, &ctx).await;

        drop(out_tx);
        match writer_task.await {
            Ok(Err(e)) => warn!(?e, "client writer error"),
            Err(e) => warn!(?e, "client writer task failed"),
            Ok(Ok(())) => {}
        }
        result
    }

    async fn read_loop<R: AsyncRead + Unpin>(
        reader: &mut R,
        out_tx: &mpsc::Sender<Outgoing>,
        ctx: &ClientContext,
    ) -> Result<()> {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            match reader.read_exact(&mut len_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_MESSAGE_LEN {
                warn!(len, "message too large, disconnecting");
                return Ok(());
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            reader.read_exact(&mut msg_buf).await?;

            // Parse request
            let request: Request = serde_json::from_slice(&msg_buf)
                .context("failed to parse request")?;

            debug!(?request, "received request");

            let (response, subscribe) = Self::process_request(request, ctx).await;
            let outgoing = if subscribe {
                debug!("client subscribed to notifications");
                Outgoing::Subscribe(response)
            } else {
                Outgoing::Response(response)
            };

            if out_tx.send(outgoing).await.is_err() {
                return Ok(());
            }
        }
    }

    /// Write responses and, once subscribed, notifications
    async fn write_loop<W: AsyncWrite + Unpin>(
        mut writer: W,
        mut out_rx: mpsc::Receiver<Outgoing>,
        notify_tx: broadcast::Sender<Notification>,
    ) -> Result<()> {
        let mut notifications: Option<broadcast::Receiver<Notification>> = None;

        loop {
            tokio::select! {
                outgoing = out_rx.recv() => match outgoing {
                    Some(Outgoing::Response(response)) => {
                        Self::send_message(&mut writer, &response).await?;
                    }
                    Some(Outgoing::Subscribe(response)) => {
                        if notifications.is_none() {
                            notifications = Some(notify_tx.subscribe());
                        }
                        Self::send_message(&mut writer, &response).await?;
                    }
                    None => return Ok(()),
                },

                note = recv_notification(&mut notifications) => match note {
                    Ok(note) => Self::send_message(&mut writer, &note).await?,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "client notification receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        notifications = None;
                    }
                },
            }
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
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

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, ctx: &ClientContext) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let mut state = ctx.state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                (Response::Status(state.status.clone()), false)
            }

            Request::Subscribe => (Response::Subscribed, true),

            request => {
                if let Request::AgentState { state, .. } = &request {
                    ctx.state.write().await.status.agent_state = *state;
                }

                let Some(link) = &ctx.link else {
                    return (
                        Response::Error {
                            code: "unavailable".to_string(),
                            message: "wake word mode is not configured".to_string(),
                        },
                        false,
                    );
                };

                // Ground truth must be in place before the bridge re-reads it
                if let Request::MicState { enabled } = &request {
                    link.mic.report(*enabled);
                }

                for input in request.into_inputs() {
                    if link.inputs.send(input).await.is_err() {
                        return (
                            Response::Error {
                                code: "bridge_stopped".to_string(),
                                message: "wake word bridge is no longer running".to_string(),
                            },
                            false,
                        );
                    }
                }
                (Response::Accepted, false)
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

async fn recv_notification(
    notifications: &mut Option<broadcast::Receiver<Notification>>,
) -> Result<Notification, broadcast::error::RecvError> {
    match notifications {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
