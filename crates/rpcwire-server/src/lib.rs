//! rpcwire server library
//!
//! Dispatcher, server loop and server-side transports, exposed as a library
//! for embedding and testing.

pub mod demo;
pub mod dispatch;
pub mod server;
pub mod transport;

pub use dispatch::{handler, sync_handler, DispatchError, Dispatcher, Handler, RpcService};
pub use server::{Direction, RpcServer, ServerError};
pub use transport::{
    CallbackServerTransport, ReplyHandle, ServerTransport, TransportError,
    UnixSocketServerTransport,
};
