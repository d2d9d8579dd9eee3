//! Message model
//!
//! Plain data for requests, responses and batches. Wire encoding is delegated
//! to the codec named by each message's [`WireFormat`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{CodedError, Error, Result, RpcError};
use crate::protocols::{jsonrpc, msgpackrpc, WireFormat};

/// Correlation id (integer or string)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    /// Integers above `i64::MAX`
    Unsigned(u64),
    String(String),
}

impl RequestId {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RequestId::Number(n) => Some(*n),
            RequestId::Unsigned(n) => i64::try_from(*n).ok(),
            RequestId::String(_) => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, RequestId::String(_))
    }

    pub fn to_value(&self) -> Value {
        match self {
            RequestId::Number(n) => Value::from(*n),
            RequestId::Unsigned(n) => Value::from(*n),
            RequestId::String(s) => Value::String(s.clone()),
        }
    }

    /// Reads an id from a JSON value. Only integers and strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(RequestId::Number)
                .or_else(|| n.as_u64().map(RequestId::Unsigned)),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::Unsigned(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        i64::try_from(n).map_or(RequestId::Unsigned(n), RequestId::Number)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

/// Request parameters, decided once at parse time
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

impl Params {
    /// Builds params from optional positional and named parts.
    ///
    /// Empty parts count as absent. Both parts populated is rejected.
    pub fn from_parts(args: Option<Vec<Value>>, kwargs: Option<Map<String, Value>>) -> Result<Self> {
        let args = args.filter(|a| !a.is_empty());
        let kwargs = kwargs.filter(|k| !k.is_empty());

        match (args, kwargs) {
            (Some(_), Some(_)) => Err(Error::InvalidRequest(
                "Does not support args and kwargs at the same time".to_string(),
            )),
            (Some(args), None) => Ok(Params::Positional(args)),
            (None, Some(kwargs)) => Ok(Params::Named(kwargs)),
            (None, None) => Ok(Params::None),
        }
    }

    /// Positional arguments, empty unless the params are positional
    pub fn args(&self) -> &[Value] {
        match self {
            Params::Positional(args) => args,
            _ => &[],
        }
    }

    /// Named arguments, if the params are named
    pub fn kwargs(&self) -> Option<&Map<String, Value>> {
        match self {
            Params::Named(kwargs) => Some(kwargs),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Positional(args) => args.is_empty(),
            Params::Named(kwargs) => kwargs.is_empty(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.kwargs()?.get(name)
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.args().get(index)
    }

    pub fn to_value(&self) -> Value {
        match self {
            Params::None => Value::Null,
            Params::Positional(args) => Value::Array(args.clone()),
            Params::Named(kwargs) => Value::Object(kwargs.clone()),
        }
    }

    /// Deserializes the params into a typed value.
    ///
    /// Positional params decode as a sequence (tuples, vectors), named params
    /// as a struct or map, absent params as `null`.
    pub fn parse<T: DeserializeOwned>(&self) -> std::result::Result<T, RpcError> {
        serde_json::from_value(self.to_value())
            .map_err(|e| RpcError::invalid_params().with_data(Value::String(e.to_string())))
    }
}

impl From<Vec<Value>> for Params {
    fn from(args: Vec<Value>) -> Self {
        Params::Positional(args)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(kwargs: Map<String, Value>) -> Self {
        Params::Named(kwargs)
    }
}

/// One RPC invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub params: Params,
    pub unique_id: Option<RequestId>,
    pub one_way: bool,
    pub format: WireFormat,
}

impl Request {
    /// Create a new request; a missing id makes it one-way
    pub fn new(
        format: WireFormat,
        method: impl Into<String>,
        params: Params,
        unique_id: Option<RequestId>,
    ) -> Self {
        Self {
            method: method.into(),
            params,
            one_way: unique_id.is_none(),
            unique_id,
            format,
        }
    }

    pub fn args(&self) -> &[Value] {
        self.params.args()
    }

    pub fn kwargs(&self) -> Option<&Map<String, Value>> {
        self.params.kwargs()
    }

    /// Whether a reply will be produced for this request
    pub fn expects_reply(&self) -> bool {
        !self.one_way && self.unique_id.is_some()
    }

    /// Success response carrying this request's id, or `None` for notifications
    pub fn respond(&self, result: Value) -> Option<Response> {
        if !self.expects_reply() {
            return None;
        }
        let unique_id = self.unique_id.clone()?;

        Some(Response::Success(SuccessResponse {
            unique_id,
            result,
            format: self.format,
        }))
    }

    /// Error response carrying this request's id, or `None` for notifications
    pub fn error_respond<E: CodedError + ?Sized>(&self, error: &E) -> Option<Response> {
        if !self.expects_reply() {
            return None;
        }

        Some(Response::Error(ErrorResponse {
            unique_id: self.unique_id.clone(),
            code: error.code(),
            message: error.message_in(self.format),
            data: error.data(),
            format: self.format,
        }))
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        match self.format {
            WireFormat::JsonRpc => jsonrpc::serialize_request(self),
            WireFormat::MsgPackRpc => msgpackrpc::serialize_request(self),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SuccessResponse {
    pub unique_id: RequestId,
    pub result: Value,
    pub format: WireFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub unique_id: Option<RequestId>,
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
    pub format: WireFormat,
}

impl ErrorResponse {
    pub fn error_code(&self) -> crate::ErrorCode {
        crate::ErrorCode::from_code(self.code)
    }
}

/// Success or error response
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Success(SuccessResponse),
    Error(ErrorResponse),
}

impl Response {
    pub fn unique_id(&self) -> Option<&RequestId> {
        match self {
            Response::Success(success) => Some(&success.unique_id),
            Response::Error(error) => error.unique_id.as_ref(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }

    pub fn format(&self) -> WireFormat {
        match self {
            Response::Success(success) => success.format,
            Response::Error(error) => error.format,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        match self.format() {
            WireFormat::JsonRpc => jsonrpc::serialize_response(self),
            WireFormat::MsgPackRpc => msgpackrpc::serialize_response(self),
        }
    }
}

/// Ordered batch; malformed elements are kept in place as errors
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    format: WireFormat,
    items: Vec<std::result::Result<Request, RpcError>>,
}

impl BatchRequest {
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            items: Vec::new(),
        }
    }

    pub fn from_items(
        format: WireFormat,
        items: Vec<std::result::Result<Request, RpcError>>,
    ) -> Self {
        Self { format, items }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    pub fn push(&mut self, item: std::result::Result<Request, RpcError>) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&std::result::Result<Request, RpcError>> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, std::result::Result<Request, RpcError>> {
        self.items.iter()
    }

    /// True if any element is malformed or expects a reply.
    pub fn expects_response(&self) -> bool {
        self.items.iter().any(|item| match item {
            Ok(request) => request.expects_reply(),
            Err(_) => true,
        })
    }

    /// Empty response container, or `None` when nothing must be sent back
    pub fn create_batch_response(&self) -> Option<BatchResponse> {
        if self.expects_response() {
            Some(BatchResponse::new(self.format))
        } else {
            None
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        match self.format {
            WireFormat::JsonRpc => jsonrpc::serialize_batch_request(self),
            WireFormat::MsgPackRpc => Err(Error::Unsupported(
                "MessagePack-RPC has no batch requests".to_string(),
            )),
        }
    }
}

impl std::ops::Index<usize> for BatchRequest {
    type Output = std::result::Result<Request, RpcError>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl IntoIterator for BatchRequest {
    type Item = std::result::Result<Request, RpcError>;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Ordered batch of responses; `None` marks a notification slot
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResponse {
    format: WireFormat,
    items: Vec<Option<Response>>,
}

impl BatchResponse {
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, response: Option<Response>) {
        self.items.push(response);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Option<Response>> {
        self.items.iter()
    }

    /// Responses that will actually go on the wire
    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        self.items.iter().flatten()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        match self.format {
            WireFormat::JsonRpc => jsonrpc::serialize_batch_response(self),
            WireFormat::MsgPackRpc => Err(Error::Unsupported(
                "MessagePack-RPC has no batch responses".to_string(),
            )),
        }
    }
}

impl Extend<Option<Response>> for BatchResponse {
    fn extend<I: IntoIterator<Item = Option<Response>>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

/// Result of parsing an incoming message
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedRequest {
    Single(Request),
    Batch(BatchRequest),
}

/// What goes back to the caller after dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Single(Response),
    Batch(BatchResponse),
}

impl Reply {
    pub fn serialize(&self) -> Result<Vec<u8>> {
        match self {
            Reply::Single(response) => response.serialize(),
            Reply::Batch(batch) => batch.serialize(),
        }
    }
}
