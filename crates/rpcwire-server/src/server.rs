use rpcwire_core::{Reply, RpcProtocol};
use std::fmt;
use std::sync::Arc;

use crate::dispatch::Dispatcher;
use crate::transport::{ServerTransport, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] rpcwire_core::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => write!(f, "-->"),
            Direction::Outbound => write!(f, "<--"),
        }
    }
}

/// Called with every message that enters or leaves the server
pub type TraceHook<C> = Arc<dyn Fn(Direction, &C, &[u8]) + Send + Sync>;

/// Ties a transport, a protocol and a dispatcher together.
pub struct RpcServer<T: ServerTransport> {
    transport: Arc<T>,
    protocol: Arc<dyn RpcProtocol + Sync>,
    dispatcher: Arc<Dispatcher>,
    trace: Option<TraceHook<T::Context>>,
}

impl<T: ServerTransport> Clone for RpcServer<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            protocol: self.protocol.clone(),
            dispatcher: self.dispatcher.clone(),
            trace: self.trace.clone(),
        }
    }
}

impl<T: ServerTransport> RpcServer<T> {
    pub fn new(
        transport: T,
        protocol: Box<dyn RpcProtocol + Sync>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            protocol: Arc::from(protocol),
            dispatcher: Arc::new(dispatcher),
            trace: None,
        }
    }

    pub fn with_trace<F>(mut self, trace: F) -> Self
    where
        F: Fn(Direction, &T::Context, &[u8]) + Send + Sync + 'static,
    {
        self.trace = Some(Arc::new(trace));
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn trace(&self, direction: Direction, context: &T::Context, message: &[u8]) {
        if let Some(trace) = &self.trace {
            trace(direction, context, message);
        }
    }

    /// Receives one message, handles it and sends the reply, if any.
    pub async fn receive_one_message(&self) -> Result<()> {
        let (context, message) = self.transport.receive_message().await?;
        self.handle_message(context, message).await
    }

    pub async fn handle_message(&self, context: T::Context, message: Vec<u8>) -> Result<()> {
        self.trace(Direction::Inbound, &context, &message);

        let reply = match self.protocol.parse_request(&message) {
            Ok(request) => self.dispatcher.dispatch(request).await,
            Err(e) => {
                tracing::warn!("Rejected message from {:?}: {}", context, e);
                Some(Reply::Single(e.error_respond()))
            }
        };

        let Some(reply) = reply else {
            return Ok(());
        };

        let data = reply.serialize()?;
        self.trace(Direction::Outbound, &context, &data);
        self.transport.send_reply(context, data).await?;
        Ok(())
    }

    /// Handles messages until the transport fails. Each message runs on its
    /// own task, so replies may be sent out of order.
    pub async fn serve_forever(&self) -> Result<()> {
        loop {
            let (context, message) = self.transport.receive_message().await?;
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_message(context, message).await {
                    tracing::error!("Failed to handle message: {}", e);
                }
            });
        }
    }
}
