//! Wire protocols
//!
//! A protocol turns raw bytes into message objects and back. Each instance
//! owns an id generator, so uniqueness of request ids is per instance.

pub mod jsonrpc;
pub mod msgpackrpc;

pub use jsonrpc::JsonRpcProtocol;
pub use msgpackrpc::MsgPackRpcProtocol;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, InvalidReplyError, Result, RpcError};
use crate::message::{BatchRequest, ParsedRequest, Request, RequestId, Response};

/// Wire format tag carried by every message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    #[serde(alias = "json")]
    JsonRpc,
    #[serde(alias = "msgpack")]
    MsgPackRpc,
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireFormat::JsonRpc => write!(f, "jsonrpc"),
            WireFormat::MsgPackRpc => write!(f, "msgpackrpc"),
        }
    }
}

impl FromStr for WireFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jsonrpc" | "json" => Ok(WireFormat::JsonRpc),
            "msgpackrpc" | "msgpack" => Ok(WireFormat::MsgPackRpc),
            other => Err(Error::Validation(format!(
                "Unknown protocol '{}'. Must be one of: jsonrpc, msgpackrpc",
                other
            ))),
        }
    }
}

/// Codec contract shared by all wire formats
pub trait RpcProtocol: Send {
    fn format(&self) -> WireFormat;

    fn supports_batch(&self) -> bool {
        false
    }

    /// Builds an outgoing request, allocating an id unless `one_way`.
    fn create_request(
        &mut self,
        method: &str,
        args: Option<Vec<Value>>,
        kwargs: Option<Map<String, Value>>,
        one_way: bool,
    ) -> Result<Request>;

    fn create_batch_request(&self, requests: Vec<Request>) -> Result<BatchRequest> {
        let _ = requests;
        Err(Error::Unsupported(format!(
            "{} does not support batch requests",
            self.format()
        )))
    }

    /// Parses an incoming message on the server side.
    fn parse_request(&self, data: &[u8]) -> std::result::Result<ParsedRequest, RpcError>;

    /// Stops waiting for a reply to `unique_id`, e.g. after the call failed
    /// before a reply arrived.
    fn forget_reply(&mut self, unique_id: &RequestId) {
        let _ = unique_id;
    }

    /// Parses a reply on the client side.
    fn parse_reply(&mut self, data: &[u8]) -> std::result::Result<Response, InvalidReplyError>;

    /// Parses a batch reply into per-element results, in wire order.
    fn parse_batch_reply(
        &mut self,
        data: &[u8],
    ) -> std::result::Result<Vec<std::result::Result<Response, InvalidReplyError>>, InvalidReplyError>
    {
        let _ = data;
        Err(InvalidReplyError::new(format!(
            "{} does not support batch replies",
            self.format()
        )))
    }
}

/// Builds a boxed protocol for the given format with its default id generator.
pub fn protocol_for(format: WireFormat) -> Box<dyn RpcProtocol + Sync> {
    match format {
        WireFormat::JsonRpc => Box::new(JsonRpcProtocol::new()),
        WireFormat::MsgPackRpc => Box::new(MsgPackRpcProtocol::new()),
    }
}
