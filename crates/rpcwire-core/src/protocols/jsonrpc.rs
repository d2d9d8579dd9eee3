//! JSON-RPC 2.0

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

use super::{RpcProtocol, WireFormat};
use crate::error::{InvalidReplyError, Result, RpcError};
use crate::generators::{DecimalGenerator, IdGenerator};
use crate::message::{
    BatchRequest, BatchResponse, ErrorResponse, Params, ParsedRequest, Request, RequestId,
    Response, SuccessResponse,
};

pub const JSONRPC_VERSION: &str = "2.0";

const ALLOWED_REQUEST_KEYS: [&str; 4] = ["id", "jsonrpc", "method", "params"];
const ALLOWED_REPLY_KEYS: [&str; 4] = ["id", "jsonrpc", "error", "result"];

#[derive(Serialize)]
#[serde(untagged)]
enum WireParams<'a> {
    Array(&'a [Value]),
    Object(&'a Map<String, Value>),
}

#[derive(Serialize)]
struct WireRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<WireParams<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a RequestId>,
}

#[derive(Serialize)]
struct WireSuccess<'a> {
    jsonrpc: &'static str,
    id: &'a RequestId,
    result: &'a Value,
}

#[derive(Serialize)]
struct WireErrorObject<'a> {
    code: i32,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
}

#[derive(Serialize)]
struct WireError<'a> {
    jsonrpc: &'static str,
    id: Option<&'a RequestId>,
    error: WireErrorObject<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WireResponse<'a> {
    Success(WireSuccess<'a>),
    Error(WireError<'a>),
}

fn wire_request(request: &Request) -> WireRequest<'_> {
    // empty params are omitted so a no-arg call has a single wire form
    let params = match &request.params {
        Params::Positional(args) if !args.is_empty() => Some(WireParams::Array(args)),
        Params::Named(kwargs) if !kwargs.is_empty() => Some(WireParams::Object(kwargs)),
        _ => None,
    };

    WireRequest {
        jsonrpc: JSONRPC_VERSION,
        method: &request.method,
        params,
        id: if request.one_way {
            None
        } else {
            request.unique_id.as_ref()
        },
    }
}

fn wire_response(response: &Response) -> WireResponse<'_> {
    match response {
        Response::Success(success) => WireResponse::Success(WireSuccess {
            jsonrpc: JSONRPC_VERSION,
            id: &success.unique_id,
            result: &success.result,
        }),
        Response::Error(error) => WireResponse::Error(WireError {
            jsonrpc: JSONRPC_VERSION,
            id: error.unique_id.as_ref(),
            error: WireErrorObject {
                code: error.code,
                message: &error.message,
                data: error.data.as_ref(),
            },
        }),
    }
}

pub(crate) fn serialize_request(request: &Request) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&wire_request(request))?)
}

pub(crate) fn serialize_response(response: &Response) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&wire_response(response))?)
}

pub(crate) fn serialize_batch_request(batch: &BatchRequest) -> Result<Vec<u8>> {
    let mut wire = Vec::with_capacity(batch.len());
    for item in batch.iter() {
        match item {
            Ok(request) => wire.push(wire_request(request)),
            Err(error) => {
                return Err(crate::Error::InvalidRequest(format!(
                    "Cannot serialize a malformed batch element: {}",
                    error
                )))
            }
        }
    }
    Ok(serde_json::to_vec(&wire)?)
}

pub(crate) fn serialize_batch_response(batch: &BatchResponse) -> Result<Vec<u8>> {
    let wire: Vec<WireResponse<'_>> = batch.responses().map(wire_response).collect();
    Ok(serde_json::to_vec(&wire)?)
}

/// JSON-RPC 2.0 protocol
pub struct JsonRpcProtocol {
    id_generator: Box<dyn IdGenerator>,
    pending_replies: Option<HashSet<RequestId>>,
}

impl JsonRpcProtocol {
    pub fn new() -> Self {
        Self::with_id_generator(Box::new(DecimalGenerator::default()))
    }

    pub fn with_id_generator(id_generator: Box<dyn IdGenerator>) -> Self {
        Self {
            id_generator,
            pending_replies: None,
        }
    }

    pub fn set_id_generator(&mut self, id_generator: Box<dyn IdGenerator>) {
        self.id_generator = id_generator;
    }

    /// Enables out-of-order reply checking: replies must answer a request
    /// created by this instance that has not been answered yet.
    pub fn with_reply_tracking(mut self) -> Self {
        self.pending_replies = Some(HashSet::new());
        self
    }

    /// Marks an id as awaiting a reply, enabling tracking if needed.
    pub fn expect_reply(&mut self, unique_id: RequestId) {
        self.pending_replies
            .get_or_insert_with(HashSet::new)
            .insert(unique_id);
    }

    pub fn is_pending(&self, unique_id: &RequestId) -> bool {
        self.pending_replies
            .as_ref()
            .is_some_and(|pending| pending.contains(unique_id))
    }

    fn parse_subrequest(&self, value: Value) -> std::result::Result<Request, RpcError> {
        let Value::Object(mut obj) = value else {
            return Err(invalid_request(None));
        };

        let one_way = !obj.contains_key("id");
        let unique_id = match obj.remove("id") {
            None | Some(Value::Null) => None,
            Some(id) => match RequestId::from_value(&id) {
                Some(id) => Some(id),
                None => return Err(invalid_request(None)),
            },
        };

        if obj
            .keys()
            .any(|k| !ALLOWED_REQUEST_KEYS.contains(&k.as_str()))
        {
            return Err(invalid_request(unique_id));
        }

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(invalid_request(unique_id));
        }

        let method = match obj.remove("method") {
            Some(Value::String(method)) if !method.is_empty() => method,
            _ => return Err(invalid_request(unique_id)),
        };

        let params = match obj.remove("params") {
            None | Some(Value::Null) => Params::None,
            Some(Value::Array(args)) => Params::Positional(args),
            Some(Value::Object(kwargs)) => Params::Named(kwargs),
            Some(_) => {
                return Err(RpcError::invalid_params()
                    .with_id(unique_id)
                    .in_format(WireFormat::JsonRpc))
            }
        };

        Ok(Request {
            method,
            params,
            unique_id,
            one_way,
            format: WireFormat::JsonRpc,
        })
    }

    fn parse_reply_value(
        &mut self,
        value: Value,
    ) -> std::result::Result<Response, InvalidReplyError> {
        let Value::Object(mut rep) = value else {
            return Err(InvalidReplyError::new("Reply must be an object"));
        };

        if let Some(key) = rep
            .keys()
            .find(|k| !ALLOWED_REPLY_KEYS.contains(&k.as_str()))
        {
            return Err(InvalidReplyError::new(format!("Key not allowed: {}", key)));
        }

        match rep.get("jsonrpc") {
            None => {
                return Err(InvalidReplyError::new(
                    "Missing jsonrpc (version) in response",
                ))
            }
            Some(version) if version.as_str() != Some(JSONRPC_VERSION) => {
                return Err(InvalidReplyError::new("Wrong JSONRPC version"))
            }
            Some(_) => {}
        }

        let unique_id = match rep.remove("id") {
            None => return Err(InvalidReplyError::new("Missing id in response")),
            Some(Value::Null) => None,
            Some(id) => Some(
                RequestId::from_value(&id)
                    .ok_or_else(|| InvalidReplyError::new("Reply id must be an integer or string"))?,
            ),
        };

        let error = rep.remove("error");
        let result = rep.remove("result");

        let response = match (error, result) {
            (Some(error), None) => {
                let (code, message, data) = parse_error_object(error)?;
                Response::Error(ErrorResponse {
                    unique_id: unique_id.clone(),
                    code,
                    message,
                    data,
                    format: WireFormat::JsonRpc,
                })
            }
            (None, Some(result)) => {
                let Some(id) = unique_id.clone() else {
                    return Err(InvalidReplyError::new("Success reply must carry an id"));
                };
                Response::Success(SuccessResponse {
                    unique_id: id,
                    result,
                    format: WireFormat::JsonRpc,
                })
            }
            _ => {
                return Err(InvalidReplyError::new(
                    "Reply must contain exactly one of result and error",
                ))
            }
        };

        if let (Some(pending), Some(id)) = (self.pending_replies.as_mut(), unique_id.as_ref()) {
            if !pending.remove(id) {
                return Err(InvalidReplyError::new(format!(
                    "Unsolicited reply with id {}",
                    id
                )));
            }
        }

        Ok(response)
    }
}

impl Default for JsonRpcProtocol {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_request(unique_id: Option<RequestId>) -> RpcError {
    RpcError::invalid_request()
        .with_id(unique_id)
        .in_format(WireFormat::JsonRpc)
}

fn parse_error_object(
    error: Value,
) -> std::result::Result<(i32, String, Option<Value>), InvalidReplyError> {
    let Value::Object(mut error) = error else {
        return Err(InvalidReplyError::new("Error must be an object"));
    };

    let code = error
        .get("code")
        .and_then(Value::as_i64)
        .and_then(|code| i32::try_from(code).ok())
        .ok_or_else(|| InvalidReplyError::new("Error code must be an integer"))?;

    let message = match error.remove("message") {
        Some(Value::String(message)) => message,
        _ => return Err(InvalidReplyError::new("Error message must be a string")),
    };

    Ok((code, message, error.remove("data")))
}

impl RpcProtocol for JsonRpcProtocol {
    fn format(&self) -> WireFormat {
        WireFormat::JsonRpc
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn create_request(
        &mut self,
        method: &str,
        args: Option<Vec<Value>>,
        kwargs: Option<Map<String, Value>>,
        one_way: bool,
    ) -> Result<Request> {
        if method.is_empty() {
            return Err(crate::Error::InvalidRequest(
                "Method name cannot be empty".to_string(),
            ));
        }
        let params = Params::from_parts(args, kwargs)?;

        let unique_id = if one_way {
            None
        } else {
            let id = self.id_generator.next_id();
            if let Some(pending) = self.pending_replies.as_mut() {
                pending.insert(id.clone());
            }
            Some(id)
        };

        Ok(Request::new(WireFormat::JsonRpc, method, params, unique_id))
    }

    fn forget_reply(&mut self, unique_id: &RequestId) {
        if let Some(pending) = self.pending_replies.as_mut() {
            pending.remove(unique_id);
        }
    }

    fn create_batch_request(&self, requests: Vec<Request>) -> Result<BatchRequest> {
        Ok(BatchRequest::from_items(
            WireFormat::JsonRpc,
            requests.into_iter().map(Ok).collect(),
        ))
    }

    fn parse_request(&self, data: &[u8]) -> std::result::Result<ParsedRequest, RpcError> {
        let value: Value = serde_json::from_slice(data)
            .map_err(|_| RpcError::parse_error().in_format(WireFormat::JsonRpc))?;

        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(invalid_request(None));
                }
                let batch = items
                    .into_iter()
                    .map(|item| self.parse_subrequest(item))
                    .collect();
                Ok(ParsedRequest::Batch(BatchRequest::from_items(
                    WireFormat::JsonRpc,
                    batch,
                )))
            }
            other => self.parse_subrequest(other).map(ParsedRequest::Single),
        }
    }

    fn parse_reply(&mut self, data: &[u8]) -> std::result::Result<Response, InvalidReplyError> {
        let value: Value =
            serde_json::from_slice(data).map_err(|e| InvalidReplyError::new(e.to_string()))?;
        self.parse_reply_value(value)
    }

    fn parse_batch_reply(
        &mut self,
        data: &[u8],
    ) -> std::result::Result<Vec<std::result::Result<Response, InvalidReplyError>>, InvalidReplyError>
    {
        let value: Value =
            serde_json::from_slice(data).map_err(|e| InvalidReplyError::new(e.to_string()))?;

        match value {
            Value::Array(items) => Ok(items
                .into_iter()
                .map(|item| self.parse_reply_value(item))
                .collect()),
            // a server answers a batch it could not parse with a single error
            other => Ok(vec![self.parse_reply_value(other)]),
        }
    }
}
