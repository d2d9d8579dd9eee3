//! In-process transport backed by a closure

use futures::future::BoxFuture;
use std::sync::Arc;

use super::{ClientTransport, TransportError};

type SendFn =
    dyn Fn(Vec<u8>) -> BoxFuture<'static, Result<Option<Vec<u8>>, TransportError>> + Send + Sync;

/// Hands every message to a closure. The closure's answer is returned as the
/// reply when one is expected and discarded otherwise.
#[derive(Clone)]
pub struct CallbackClientTransport {
    send: Arc<SendFn>,
}

impl CallbackClientTransport {
    pub fn new<F>(send: F) -> Self
    where
        F: Fn(Vec<u8>) -> BoxFuture<'static, Result<Option<Vec<u8>>, TransportError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            send: Arc::new(send),
        }
    }

    /// Wraps a synchronous function that maps a request to an optional reply.
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: Fn(Vec<u8>) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        Self::new(move |message| {
            let handler = handler.clone();
            Box::pin(async move { Ok(handler(message)) })
        })
    }
}

impl ClientTransport for CallbackClientTransport {
    async fn send_message(
        &self,
        message: Vec<u8>,
        expect_reply: bool,
    ) -> Result<Option<Vec<u8>>, TransportError> {
        let reply = (self.send)(message).await?;
        Ok(if expect_reply { reply } else { None })
    }
}
