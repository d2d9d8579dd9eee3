//! Unix domain socket server transport

use futures::{SinkExt, StreamExt};
use rpcwire_client::FrameCodec;
use rpcwire_core::config::Framing;
use std::path::{Path, PathBuf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use super::{ServerTransport, TransportError};

const INCOMING_QUEUE: usize = 256;
const OUTGOING_QUEUE: usize = 64;

/// Route back to the connection a message arrived on
#[derive(Debug, Clone)]
pub struct ReplyHandle {
    connection_id: u64,
    replies: mpsc::Sender<Vec<u8>>,
}

impl ReplyHandle {
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }
}

/// Accepts connections on a background task and funnels every framed
/// message from every connection into one queue.
pub struct UnixSocketServerTransport {
    socket_path: PathBuf,
    incoming: Mutex<mpsc::Receiver<(ReplyHandle, Vec<u8>)>>,
    accept_task: JoinHandle<()>,
}

impl UnixSocketServerTransport {
    /// Binds the socket, replacing a stale socket file if present.
    pub fn bind(socket_path: impl AsRef<Path>, framing: Framing) -> Result<Self, TransportError> {
        let socket_path = socket_path.as_ref().to_path_buf();
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }

        let listener = UnixListener::bind(&socket_path)?;
        tracing::info!("Listening on {} ({} framing)", socket_path.display(), framing);

        let (incoming_tx, incoming_rx) = mpsc::channel(INCOMING_QUEUE);
        let accept_task = tokio::spawn(accept_loop(listener, framing, incoming_tx));

        Ok(Self {
            socket_path,
            incoming: Mutex::new(incoming_rx),
            accept_task,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for UnixSocketServerTransport {
    fn drop(&mut self) {
        self.accept_task.abort();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn accept_loop(
    listener: UnixListener,
    framing: Framing,
    incoming: mpsc::Sender<(ReplyHandle, Vec<u8>)>,
) {
    let mut next_id: u64 = 1;
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let connection_id = next_id;
                next_id += 1;
                tracing::debug!("Connection {} accepted", connection_id);
                spawn_connection(stream, connection_id, framing, incoming.clone());
            }
            Err(e) => {
                tracing::error!("Failed to accept connection: {}", e);
            }
        }
    }
}

fn spawn_connection(
    stream: UnixStream,
    connection_id: u64,
    framing: Framing,
    incoming: mpsc::Sender<(ReplyHandle, Vec<u8>)>,
) {
    let (mut sink, mut frames) = Framed::new(stream, FrameCodec::new(framing)).split();
    let (reply_tx, mut reply_rx) = mpsc::channel::<Vec<u8>>(OUTGOING_QUEUE);

    // writer ends once every handle for this connection is gone
    tokio::spawn(async move {
        while let Some(reply) = reply_rx.recv().await {
            if let Err(e) = sink.send(reply).await {
                tracing::warn!("Connection {}: failed to write reply: {}", connection_id, e);
                break;
            }
        }
    });

    tokio::spawn(async move {
        let handle = ReplyHandle {
            connection_id,
            replies: reply_tx,
        };
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(message) => {
                    if incoming.send((handle.clone(), message)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Connection {}: read failed: {}", connection_id, e);
                    break;
                }
            }
        }
        tracing::debug!("Connection {} closed", connection_id);
    });
}

impl ServerTransport for UnixSocketServerTransport {
    type Context = ReplyHandle;

    async fn receive_message(&self) -> Result<(ReplyHandle, Vec<u8>), TransportError> {
        self.incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)
    }

    async fn send_reply(&self, context: ReplyHandle, reply: Vec<u8>) -> Result<(), TransportError> {
        context
            .replies
            .send(reply)
            .await
            .map_err(|_| TransportError::Closed)
    }
}
