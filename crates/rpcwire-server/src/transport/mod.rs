//! Server transports

pub mod callback;
pub mod unix;

pub use callback::CallbackServerTransport;
pub use rpcwire_client::TransportError;
pub use unix::{ReplyHandle, UnixSocketServerTransport};

use std::fmt;
use std::future::Future;

pub trait ServerTransport: Send + Sync + 'static {
    /// Identifies where a message came from so the reply can go back there.
    type Context: Send + Sync + fmt::Debug + 'static;

    /// Waits for the next incoming message.
    fn receive_message(
        &self,
    ) -> impl Future<Output = Result<(Self::Context, Vec<u8>), TransportError>> + Send;

    fn send_reply(
        &self,
        context: Self::Context,
        reply: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
