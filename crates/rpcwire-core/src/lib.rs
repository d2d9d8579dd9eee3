//! rpcwire core
//!
//! Transport-agnostic protocol layer: message model, error taxonomy, JSON-RPC 2.0
//! and MessagePack-RPC codecs, and request id generation.

pub mod config;
pub mod error;
pub mod generators;
pub mod message;
pub mod protocols;
pub mod storage;

pub use error::{CodedError, Error, ErrorCode, InvalidReplyError, Result, RpcError};
pub use generators::IdGenerator;
pub use message::{
    BatchRequest, BatchResponse, ErrorResponse, Params, ParsedRequest, Reply, Request, RequestId,
    Response, SuccessResponse,
};
pub use protocols::{JsonRpcProtocol, MsgPackRpcProtocol, RpcProtocol, WireFormat};
