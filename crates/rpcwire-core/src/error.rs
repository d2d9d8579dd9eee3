//! Error types
//!
//! Two families live here. [`Error`] is the crate-level error returned by
//! fallible operations such as building or serializing a request. [`RpcError`]
//! is the protocol error taxonomy: every variant maps to a fixed numeric code
//! and can be turned into a wire-level error response.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

use crate::message::{ErrorResponse, RequestId, Response};
use crate::protocols::WireFormat;

#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MessagePack error: {0}")]
    MsgPack(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Standard error codes
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Bucket used for errors raised by application code.
    pub const SERVER_ERROR: i32 = -32000;
}

/// Error kinds of the protocol taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    Server(i32),
}

impl ErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::ParseError => codes::PARSE_ERROR,
            ErrorCode::InvalidRequest => codes::INVALID_REQUEST,
            ErrorCode::MethodNotFound => codes::METHOD_NOT_FOUND,
            ErrorCode::InvalidParams => codes::INVALID_PARAMS,
            ErrorCode::InternalError => codes::INTERNAL_ERROR,
            ErrorCode::Server(code) => *code,
        }
    }

    /// Maps a numeric code back onto its kind. Unknown codes are server errors.
    pub fn from_code(code: i32) -> Self {
        match code {
            codes::PARSE_ERROR => ErrorCode::ParseError,
            codes::INVALID_REQUEST => ErrorCode::InvalidRequest,
            codes::METHOD_NOT_FOUND => ErrorCode::MethodNotFound,
            codes::INVALID_PARAMS => ErrorCode::InvalidParams,
            codes::INTERNAL_ERROR => ErrorCode::InternalError,
            other => ErrorCode::Server(other),
        }
    }

    /// Canonical message for this kind in the given wire format.
    pub fn default_message(&self, format: WireFormat) -> &'static str {
        match (self, format) {
            (ErrorCode::ParseError, _) => "Parse error",
            (ErrorCode::InvalidRequest, WireFormat::JsonRpc) => "Invalid Request",
            (ErrorCode::InvalidRequest, WireFormat::MsgPackRpc) => "Invalid request",
            (ErrorCode::MethodNotFound, _) => "Method not found",
            (ErrorCode::InvalidParams, _) => "Invalid params",
            (ErrorCode::InternalError, _) => "Internal error",
            (ErrorCode::Server(_), _) => "Server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.code(),
            self.default_message(WireFormat::JsonRpc)
        )
    }
}

/// An error that knows its protocol-level code and message.
///
/// Implement this for application errors that should reach the client with a
/// custom code. [`crate::Request::error_respond`] accepts any implementor.
pub trait CodedError {
    fn code(&self) -> i32;

    fn message(&self) -> String;

    fn data(&self) -> Option<Value> {
        None
    }

    /// Message rendered for a specific wire format. Only errors that fall back
    /// to a canonical message need to override this.
    fn message_in(&self, _format: WireFormat) -> String {
        self.message()
    }
}

/// Plain strings answer as generic server errors.
impl CodedError for str {
    fn code(&self) -> i32 {
        codes::SERVER_ERROR
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

impl CodedError for String {
    fn code(&self) -> i32 {
        codes::SERVER_ERROR
    }

    fn message(&self) -> String {
        self.clone()
    }
}

/// Protocol error: a code, an optional message override, optional data, and
/// the id of the request it belongs to when one could be read.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    code: ErrorCode,
    message: Option<String>,
    data: Option<Value>,
    unique_id: Option<RequestId>,
    format: WireFormat,
}

impl RpcError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
            data: None,
            unique_id: None,
            format: WireFormat::default(),
        }
    }

    pub fn parse_error() -> Self {
        Self::new(ErrorCode::ParseError)
    }

    pub fn invalid_request() -> Self {
        Self::new(ErrorCode::InvalidRequest)
    }

    pub fn method_not_found() -> Self {
        Self::new(ErrorCode::MethodNotFound)
    }

    pub fn invalid_params() -> Self {
        Self::new(ErrorCode::InvalidParams)
    }

    pub fn internal_error() -> Self {
        Self::new(ErrorCode::InternalError)
    }

    /// Generic application error in the -32000 bucket, message propagated.
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Server(codes::SERVER_ERROR)).with_message(message)
    }

    /// Application error with its own code.
    pub fn custom(code: i32, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::from_code(code)).with_message(message)
    }

    /// Captures an arbitrary coded error so it can travel through handlers.
    pub fn from_coded<E: CodedError + ?Sized>(error: &E) -> Self {
        let mut rpc_error = Self::custom(error.code(), error.message());
        rpc_error.data = error.data();
        rpc_error
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_id(mut self, unique_id: Option<RequestId>) -> Self {
        self.unique_id = unique_id;
        self
    }

    pub fn in_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    pub fn error_code(&self) -> ErrorCode {
        self.code
    }

    pub fn unique_id(&self) -> Option<&RequestId> {
        self.unique_id.as_ref()
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Builds the error response for this error in its own wire format.
    ///
    /// Errors raised before a request could be correlated carry no id and
    /// serialize with a null id.
    pub fn error_respond(&self) -> Response {
        Response::Error(ErrorResponse {
            unique_id: self.unique_id.clone(),
            code: self.code.code(),
            message: self.message_in(self.format),
            data: self.data.clone(),
            format: self.format,
        })
    }
}

impl CodedError for RpcError {
    fn code(&self) -> i32 {
        self.code.code()
    }

    fn message(&self) -> String {
        self.message_in(self.format)
    }

    fn data(&self) -> Option<Value> {
        self.data.clone()
    }

    fn message_in(&self, format: WireFormat) -> String {
        match &self.message {
            Some(message) => message.clone(),
            None => self.code.default_message(format).to_string(),
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC error {}: {}", self.code.code(), self.message())
    }
}

impl std::error::Error for RpcError {}

impl From<anyhow::Error> for RpcError {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<RpcError>() {
            Ok(rpc_error) => rpc_error,
            Err(error) => RpcError::server_error(error.to_string()),
        }
    }
}

impl<M: Into<String>> From<(M, Value)> for RpcError {
    fn from((message, data): (M, Value)) -> Self {
        RpcError::server_error(message).with_data(data)
    }
}

/// A reply could not be turned into a response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid reply: {0}")]
pub struct InvalidReplyError(pub String);

impl InvalidReplyError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::ParseError.code(), -32700);
        assert_eq!(ErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(ErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(ErrorCode::InvalidParams.code(), -32602);
        assert_eq!(ErrorCode::InternalError.code(), -32603);
        assert_eq!(ErrorCode::Server(-32000).code(), -32000);
    }

    #[test]
    fn test_from_code_roundtrip() {
        for kind in [
            ErrorCode::ParseError,
            ErrorCode::InvalidRequest,
            ErrorCode::MethodNotFound,
            ErrorCode::InvalidParams,
            ErrorCode::InternalError,
            ErrorCode::Server(-32099),
        ] {
            assert_eq!(ErrorCode::from_code(kind.code()), kind);
        }
        assert_eq!(ErrorCode::from_code(1234), ErrorCode::Server(1234));
    }

    #[test]
    fn test_message_casing_per_format() {
        let error = RpcError::invalid_request();
        assert_eq!(error.message_in(WireFormat::JsonRpc), "Invalid Request");
        assert_eq!(error.message_in(WireFormat::MsgPackRpc), "Invalid request");

        let overridden = RpcError::invalid_request().with_message("nope");
        assert_eq!(overridden.message_in(WireFormat::MsgPackRpc), "nope");
    }

    #[test]
    fn test_anyhow_maps_to_server_error() {
        let error: RpcError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(error.code(), -32000);
        assert_eq!(error.message(), "disk on fire");
        assert_eq!(error.data(), None);
    }

    #[test]
    fn test_anyhow_keeps_wrapped_rpc_error() {
        let wrapped = anyhow::Error::new(RpcError::invalid_params());
        let error: RpcError = wrapped.into();
        assert_eq!(error.error_code(), ErrorCode::InvalidParams);
    }

    #[test]
    fn test_message_and_data_tuple() {
        let error: RpcError = ("custom", json!({"pi": 3.14})).into();
        assert_eq!(error.code(), -32000);
        assert_eq!(error.message(), "custom");
        assert_eq!(error.data(), Some(json!({"pi": 3.14})));
    }

    #[test]
    fn test_custom_code_takes_precedence() {
        struct QuotaExceeded;

        impl CodedError for QuotaExceeded {
            fn code(&self) -> i32 {
                -32042
            }

            fn message(&self) -> String {
                "Quota exceeded".to_string()
            }
        }

        let error = RpcError::from_coded(&QuotaExceeded);
        assert_eq!(error.code(), -32042);
        assert_eq!(error.message(), "Quota exceeded");
    }

    #[test]
    fn test_uncorrelated_error_response_has_no_id() {
        let response = RpcError::parse_error().error_respond();
        assert!(response.is_error());
        assert_eq!(response.unique_id(), None);
    }
}
