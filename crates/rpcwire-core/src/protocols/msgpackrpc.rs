//! MessagePack-RPC
//!
//! Requests are `[0, msgid, method, params]`, notifications
//! `[2, method, params]` and responses `[1, msgid, error, result]`. Params are
//! positional only and ids are integers. There is no batch form.

use rmpv::Value as MsgValue;
use serde_json::{Map, Number, Value};

use super::{RpcProtocol, WireFormat};
use crate::error::{codes, Error, InvalidReplyError, Result, RpcError};
use crate::generators::{DecimalGenerator, IdGenerator};
use crate::message::{
    ErrorResponse, Params, ParsedRequest, Request, RequestId, Response, SuccessResponse,
};

const REQUEST: i64 = 0;
const RESPONSE: i64 = 1;
const NOTIFICATION: i64 = 2;

/// Converts a JSON-model value into its MessagePack counterpart.
pub fn to_msgpack(value: &Value) -> MsgValue {
    match value {
        Value::Null => MsgValue::Nil,
        Value::Bool(b) => MsgValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                MsgValue::from(u)
            } else if let Some(i) = n.as_i64() {
                MsgValue::from(i)
            } else {
                MsgValue::F64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => MsgValue::from(s.as_str()),
        Value::Array(items) => MsgValue::Array(items.iter().map(to_msgpack).collect()),
        Value::Object(map) => MsgValue::Map(
            map.iter()
                .map(|(k, v)| (MsgValue::from(k.as_str()), to_msgpack(v)))
                .collect(),
        ),
    }
}

/// Converts a decoded MessagePack value into the JSON value model.
///
/// Binary payloads become arrays of byte values. Extension types, non-string
/// map keys, invalid UTF-8 and non-finite floats have no JSON form.
pub fn from_msgpack(value: MsgValue) -> std::result::Result<Value, String> {
    match value {
        MsgValue::Nil => Ok(Value::Null),
        MsgValue::Boolean(b) => Ok(Value::Bool(b)),
        MsgValue::Integer(n) => {
            if let Some(u) = n.as_u64() {
                Ok(Value::from(u))
            } else if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else {
                Err(format!("Integer out of range: {}", n))
            }
        }
        MsgValue::F32(f) => float(f64::from(f)),
        MsgValue::F64(f) => float(f),
        MsgValue::String(s) => s
            .into_str()
            .map(Value::String)
            .ok_or_else(|| "String is not valid UTF-8".to_string()),
        MsgValue::Binary(bytes) => Ok(Value::Array(bytes.into_iter().map(Value::from).collect())),
        MsgValue::Array(items) => items
            .into_iter()
            .map(from_msgpack)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(Value::Array),
        MsgValue::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, value) in entries {
                let key = match key {
                    MsgValue::String(s) => s
                        .into_str()
                        .ok_or_else(|| "Map key is not valid UTF-8".to_string())?,
                    other => return Err(format!("Map key must be a string, got {}", other)),
                };
                map.insert(key, from_msgpack(value)?);
            }
            Ok(Value::Object(map))
        }
        MsgValue::Ext(kind, _) => Err(format!("Extension type {} is not supported", kind)),
    }
}

fn float(f: f64) -> std::result::Result<Value, String> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| format!("Float {} has no JSON representation", f))
}

/// Decodes exactly one value; trailing bytes are an error.
fn decode(data: &[u8]) -> std::result::Result<MsgValue, String> {
    let mut cursor = data;
    let value = rmpv::decode::read_value(&mut cursor).map_err(|e| e.to_string())?;
    if !cursor.is_empty() {
        return Err(format!("{} trailing bytes after message", cursor.len()));
    }
    Ok(value)
}

fn encode(value: &MsgValue) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, value).map_err(|e| Error::MsgPack(e.to_string()))?;
    Ok(buf)
}

fn msgid(unique_id: &RequestId) -> Result<MsgValue> {
    match unique_id {
        RequestId::Number(n) => Ok(MsgValue::from(*n)),
        RequestId::Unsigned(n) => Ok(MsgValue::from(*n)),
        RequestId::String(_) => Err(Error::InvalidRequest(format!(
            "MessagePack-RPC ids must be integers, got '{}'",
            unique_id
        ))),
    }
}

fn read_msgid(value: &MsgValue) -> Option<RequestId> {
    value
        .as_i64()
        .map(RequestId::Number)
        .or_else(|| value.as_u64().map(RequestId::Unsigned))
}

fn msg_params(params: &Params) -> Result<MsgValue> {
    match params {
        Params::Named(_) => Err(Error::InvalidRequest(
            "MessagePack-RPC does not support named params".to_string(),
        )),
        other => Ok(MsgValue::Array(other.args().iter().map(to_msgpack).collect())),
    }
}

pub(crate) fn serialize_request(request: &Request) -> Result<Vec<u8>> {
    let method = MsgValue::from(request.method.as_str());
    let params = msg_params(&request.params)?;

    let message = match (&request.unique_id, request.one_way) {
        (Some(id), false) => MsgValue::Array(vec![
            MsgValue::from(REQUEST),
            msgid(id)?,
            method,
            params,
        ]),
        _ => MsgValue::Array(vec![MsgValue::from(NOTIFICATION), method, params]),
    };
    encode(&message)
}

pub(crate) fn serialize_response(response: &Response) -> Result<Vec<u8>> {
    let message = match response {
        Response::Success(success) => MsgValue::Array(vec![
            MsgValue::from(RESPONSE),
            msgid(&success.unique_id)?,
            MsgValue::Nil,
            to_msgpack(&success.result),
        ]),
        // the error slot has no room for data
        Response::Error(error) => MsgValue::Array(vec![
            MsgValue::from(RESPONSE),
            match &error.unique_id {
                Some(id) => msgid(id)?,
                None => MsgValue::Nil,
            },
            MsgValue::Array(vec![
                MsgValue::from(i64::from(error.code)),
                MsgValue::from(error.message.as_str()),
            ]),
            MsgValue::Nil,
        ]),
    };
    encode(&message)
}

fn invalid_request(unique_id: Option<RequestId>) -> RpcError {
    RpcError::invalid_request()
        .with_id(unique_id)
        .in_format(WireFormat::MsgPackRpc)
}

fn invalid_params(unique_id: Option<RequestId>) -> RpcError {
    RpcError::invalid_params()
        .with_id(unique_id)
        .in_format(WireFormat::MsgPackRpc)
}

fn parse_params(
    params: MsgValue,
    unique_id: &Option<RequestId>,
) -> std::result::Result<Params, RpcError> {
    let MsgValue::Array(items) = params else {
        return Err(invalid_params(unique_id.clone()));
    };
    let args = items
        .into_iter()
        .map(from_msgpack)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|reason| invalid_params(unique_id.clone()).with_data(Value::String(reason)))?;
    Ok(Params::from_parts(Some(args), None).unwrap_or_default())
}

/// MessagePack-RPC protocol
pub struct MsgPackRpcProtocol {
    id_generator: Box<dyn IdGenerator>,
}

impl MsgPackRpcProtocol {
    pub fn new() -> Self {
        Self::with_id_generator(Box::new(DecimalGenerator::default()))
    }

    /// The generator must yield integer ids; others are rejected when a
    /// request is created.
    pub fn with_id_generator(id_generator: Box<dyn IdGenerator>) -> Self {
        Self { id_generator }
    }

    pub fn set_id_generator(&mut self, id_generator: Box<dyn IdGenerator>) {
        self.id_generator = id_generator;
    }
}

impl Default for MsgPackRpcProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl RpcProtocol for MsgPackRpcProtocol {
    fn format(&self) -> WireFormat {
        WireFormat::MsgPackRpc
    }

    fn create_request(
        &mut self,
        method: &str,
        args: Option<Vec<Value>>,
        kwargs: Option<Map<String, Value>>,
        one_way: bool,
    ) -> Result<Request> {
        if method.is_empty() {
            return Err(Error::InvalidRequest("Method name cannot be empty".to_string()));
        }
        if kwargs.is_some_and(|k| !k.is_empty()) {
            return Err(Error::InvalidRequest(
                "Does not support kwargs".to_string(),
            ));
        }
        let params = Params::from_parts(args, None)?;

        let unique_id = if one_way {
            None
        } else {
            let id = self.id_generator.next_id();
            if !id.is_integer() {
                return Err(Error::InvalidRequest(format!(
                    "MessagePack-RPC ids must be integers, generator produced '{}'",
                    id
                )));
            }
            Some(id)
        };

        Ok(Request::new(WireFormat::MsgPackRpc, method, params, unique_id))
    }

    fn parse_request(&self, data: &[u8]) -> std::result::Result<ParsedRequest, RpcError> {
        let value = decode(data)
            .map_err(|_| RpcError::parse_error().in_format(WireFormat::MsgPackRpc))?;

        let MsgValue::Array(parts) = value else {
            return Err(invalid_request(None));
        };

        let marker = parts.first().and_then(MsgValue::as_i64);
        let (unique_id, method, params) = match (marker, parts.len()) {
            (Some(REQUEST), 4) => {
                let mut parts = parts.into_iter().skip(1);
                let (Some(id), Some(method), Some(params)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(invalid_request(None));
                };
                let Some(id) = read_msgid(&id) else {
                    return Err(invalid_request(None));
                };
                (Some(id), method, params)
            }
            (Some(NOTIFICATION), 3) => {
                let mut parts = parts.into_iter().skip(1);
                let (Some(method), Some(params)) = (parts.next(), parts.next()) else {
                    return Err(invalid_request(None));
                };
                (None, method, params)
            }
            _ => return Err(invalid_request(None)),
        };

        let method = match method {
            MsgValue::String(s) => match s.into_str() {
                Some(method) if !method.is_empty() => method,
                _ => return Err(invalid_request(unique_id)),
            },
            _ => return Err(invalid_request(unique_id)),
        };

        let params = parse_params(params, &unique_id)?;

        Ok(ParsedRequest::Single(Request::new(
            WireFormat::MsgPackRpc,
            method,
            params,
            unique_id,
        )))
    }

    fn parse_reply(&mut self, data: &[u8]) -> std::result::Result<Response, InvalidReplyError> {
        let value = decode(data).map_err(InvalidReplyError::new)?;

        let MsgValue::Array(parts) = value else {
            return Err(InvalidReplyError::new("Reply must be an array"));
        };
        let Ok([marker, id, error, result]) = <[MsgValue; 4]>::try_from(parts) else {
            return Err(InvalidReplyError::new("Reply must have exactly 4 elements"));
        };

        if marker.as_i64() != Some(RESPONSE) {
            return Err(InvalidReplyError::new("Reply type marker must be 1"));
        }

        let unique_id = match id {
            MsgValue::Nil => None,
            MsgValue::Integer(_) => Some(
                read_msgid(&id).ok_or_else(|| InvalidReplyError::new("Reply id out of range"))?,
            ),
            _ => return Err(InvalidReplyError::new("Reply id must be an integer")),
        };

        match (error, result) {
            (MsgValue::Nil, result) => {
                let Some(unique_id) = unique_id else {
                    return Err(InvalidReplyError::new("Success reply must carry an id"));
                };
                let result = from_msgpack(result).map_err(InvalidReplyError::new)?;
                Ok(Response::Success(SuccessResponse {
                    unique_id,
                    result,
                    format: WireFormat::MsgPackRpc,
                }))
            }
            (error, MsgValue::Nil) => {
                let (code, message, data) = parse_error_slot(error);
                Ok(Response::Error(ErrorResponse {
                    unique_id,
                    code,
                    message,
                    data,
                    format: WireFormat::MsgPackRpc,
                }))
            }
            _ => Err(InvalidReplyError::new(
                "Reply must contain only one of result and error",
            )),
        }
    }
}

/// Reads `[code, message]`, a bare message, or anything else as a server error.
fn parse_error_slot(error: MsgValue) -> (i32, String, Option<Value>) {
    if let MsgValue::Array(pair) = &error {
        if let [MsgValue::Integer(code), MsgValue::String(message)] = pair.as_slice() {
            if let (Some(code), Some(message)) =
                (code.as_i64().and_then(|c| i32::try_from(c).ok()), message.as_str())
            {
                return (code, message.to_string(), None);
            }
        }
    }

    if let MsgValue::String(message) = &error {
        if let Some(message) = message.as_str() {
            return (codes::SERVER_ERROR, message.to_string(), None);
        }
    }

    let message = error.to_string();
    (codes::SERVER_ERROR, message, from_msgpack(error).ok())
}
