//! In-process transport backed by closures

use futures::future::BoxFuture;
use std::sync::Arc;

use super::{ServerTransport, TransportError};

type ReceiveFn = dyn Fn() -> BoxFuture<'static, Result<Vec<u8>, TransportError>> + Send + Sync;
type SendFn = dyn Fn(Vec<u8>) -> BoxFuture<'static, Result<(), TransportError>> + Send + Sync;

/// Pulls messages from one closure and pushes replies into another. There is
/// a single peer, so the context is empty.
pub struct CallbackServerTransport {
    receiver: Arc<ReceiveFn>,
    sender: Arc<SendFn>,
}

impl CallbackServerTransport {
    pub fn new<R, S>(receiver: R, sender: S) -> Self
    where
        R: Fn() -> BoxFuture<'static, Result<Vec<u8>, TransportError>> + Send + Sync + 'static,
        S: Fn(Vec<u8>) -> BoxFuture<'static, Result<(), TransportError>> + Send + Sync + 'static,
    {
        Self {
            receiver: Arc::new(receiver),
            sender: Arc::new(sender),
        }
    }
}

impl ServerTransport for CallbackServerTransport {
    type Context = ();

    async fn receive_message(&self) -> Result<((), Vec<u8>), TransportError> {
        let message = (self.receiver)().await?;
        Ok(((), message))
    }

    async fn send_reply(&self, _context: (), reply: Vec<u8>) -> Result<(), TransportError> {
        (self.sender)(reply).await
    }
}
