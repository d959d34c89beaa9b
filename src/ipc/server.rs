//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of
//! panel events to subscribed front ends.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::events::PanelEvent;
use crate::panel::{PanelCommand, PanelStatus};

use super::protocol::{Notification, Request, Response, MAX_FRAME_LEN};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

/// Aborts the wrapped task when the owning handler goes away
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// State shared with every client handler
struct Shared {
    status: RwLock<PanelStatus>,
    command_tx: mpsc::UnboundedSender<PanelCommand>,
    event_tx: broadcast::Sender<PanelEvent>,
}

impl Server {
    /// Create a new IPC server bound to `socket_path`
    ///
    /// Mutating requests are forwarded to `command_tx`; subscribers receive
    /// everything sent on `event_tx`.
    pub fn new(
        socket_path: &Path,
        command_tx: mpsc::UnboundedSender<PanelCommand>,
        event_tx: broadcast::Sender<PanelEvent>,
    ) -> Result<Self> {
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
            shared: Arc::new(Shared {
                status: RwLock::new(PanelStatus::default()),
                command_tx,
                event_tx,
            }),
            shutdown_tx,
        })
    }

    /// Replace the status snapshot served to `get_status`
    pub async fn set_status(&self, status: PanelStatus) {
        let mut current = self.shared.status.write().await;
        if current.message != status.message {
            debug!(message = %status.message, "IPC server: status updated");
        }
        *current = status;
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let shared = Arc::clone(&self.shared);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, shared) => {
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
    async fn handle_client(stream: UnixStream, shared: Arc<Shared>) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        // Frames are read on their own task so pushing events never
        // interrupts a partially read request.
        let (frame_tx, mut frame_rx) = mpsc::channel::<Vec<u8>>(8);
        let _read_task = AbortOnDrop(tokio::spawn(async move {
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(frame)) => {
                        if frame_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("client disconnected");
                        break;
                    }
                    Err(e) => {
                        warn!(?e, "failed to read request");
                        break;
                    }
                }
            }
        }));

        let mut events: Option<broadcast::Receiver<PanelEvent>> = None;

        let result = loop {
            tokio::select! {
                frame = frame_rx.recv() => {
                    let Some(frame) = frame else { break Ok(()) };
                    let response = match serde_json::from_slice::<Request>(&frame) {
                        Ok(request) => {
                            debug!(?request, "received request");
                            if matches!(request, Request::Subscribe) {
                                events = Some(shared.event_tx.subscribe());
                                debug!("client subscribed to notifications");
                            }
                            Self::process_request(request, &shared).await
                        }
                        Err(e) => Response::Error {
                            code: "bad_request".to_string(),
                            message: e.to_string(),
                        },
                    };
                    if let Err(e) = send_message(&mut writer, &response).await {
                        break Err(e);
                    }
                }
                event = recv_event(&mut events) => {
                    match event {
                        Ok(event) => {
                            let notification = Notification::Event { event };
                            if let Err(e) = send_message(&mut writer, &notification).await {
                                break Err(e);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "subscriber lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            events = None;
                        }
                    }
                }
            }
        };

        result
    }

    /// Process a request and return a response
    async fn process_request(request: Request, shared: &Shared) -> Response {
        if let Some(command) = request.to_command() {
            return match shared.command_tx.send(command) {
                Ok(()) => Response::Accepted,
                Err(_) => Response::Error {
                    code: "unavailable".to_string(),
                    message: "control panel is shutting down".to_string(),
                },
            };
        }

        match request {
            Request::Ping => Response::Pong,
            Request::GetStatus => Response::Status(shared.status.read().await.clone()),
            Request::Subscribe => Response::Subscribed,
            other => Response::Error {
                code: "unsupported".to_string(),
                message: format!("unhandled request {:?}", other),
            },
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

/// Wait for the next event, or forever when not subscribed
async fn recv_event(
    events: &mut Option<broadcast::Receiver<PanelEvent>>,
) -> Result<PanelEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Read one length-prefixed frame; `None` on clean EOF
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    // Read message length (4-byte little-endian)
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        anyhow::bail!("message too large ({} bytes)", len);
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(Some(msg_buf))
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
