//! Client transports
//!
//! A transport moves opaque byte buffers. It knows nothing about the protocol
//! beyond whether a reply should be awaited.

pub mod callback;
pub mod framing;
pub mod unix;

pub use callback::CallbackClientTransport;
pub use framing::FrameCodec;
pub use unix::UnixSocketClientTransport;

use std::future::Future;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed by peer")]
    Closed,

    #[error("Transport error: {0}")]
    Other(String),
}

pub trait ClientTransport: Send + Sync {
    /// Sends one message. When `expect_reply` is set, waits for the next
    /// message from the peer and returns it.
    fn send_message(
        &self,
        message: Vec<u8>,
        expect_reply: bool,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;
}
