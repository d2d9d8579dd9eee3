//! Unix domain socket transport

use futures::{SinkExt, StreamExt};
use rpcwire_core::config::Framing;
use std::path::PathBuf;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use super::{ClientTransport, FrameCodec, TransportError};

/// Keeps one connection open and reuses it for every message.
///
/// Messages are exchanged strictly in turn: a call holds the connection until
/// its reply arrives. The connection is re-established after any IO failure.
pub struct UnixSocketClientTransport {
    socket_path: PathBuf,
    framing: Framing,
    connection: Mutex<Option<Framed<UnixStream, FrameCodec>>>,
}

impl UnixSocketClientTransport {
    pub fn new(socket_path: impl Into<PathBuf>, framing: Framing) -> Self {
        Self {
            socket_path: socket_path.into(),
            framing,
            connection: Mutex::new(None),
        }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    async fn connect(&self) -> Result<Framed<UnixStream, FrameCodec>, TransportError> {
        debug!("Connecting to {}", self.socket_path.display());
        let stream = UnixStream::connect(&self.socket_path).await?;
        Ok(Framed::new(stream, FrameCodec::new(self.framing)))
    }

    async fn exchange(
        framed: &mut Framed<UnixStream, FrameCodec>,
        message: Vec<u8>,
        expect_reply: bool,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        framed.send(message).await?;

        if !expect_reply {
            return Ok(None);
        }

        match framed.next().await {
            Some(reply) => Ok(Some(reply?)),
            None => Err(TransportError::Closed),
        }
    }
}

impl ClientTransport for UnixSocketClientTransport {
    async fn send_message(
        &self,
        message: Vec<u8>,
        expect_reply: bool,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let mut connection = self.connection.lock().await;

        if connection.is_none() {
            *connection = Some(self.connect().await?);
        }
        let Some(framed) = connection.as_mut() else {
            return Err(TransportError::Closed);
        };

        let result = Self::exchange(framed, message, expect_reply).await;
        if let Err(e) = &result {
            warn!("Dropping connection to {}: {}", self.socket_path.display(), e);
            *connection = None;
        }
        result
    }
}
