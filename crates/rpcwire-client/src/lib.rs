//! rpcwire client library
//!
//! Pairs a protocol with a transport: builds requests, sends them and turns
//! replies back into results.

pub mod transport;

pub use transport::{
    CallbackClientTransport, ClientTransport, FrameCodec, TransportError,
    UnixSocketClientTransport,
};

use rpcwire_core::{InvalidReplyError, RequestId, Response, RpcProtocol};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i32,
        message: String,
        data: Option<Value>,
    },

    #[error(transparent)]
    InvalidReply(#[from] InvalidReplyError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] rpcwire_core::Error),

    #[error("No reply received")]
    NoReply,
}

impl ClientError {
    /// Error code sent by the server, if this is a server-side error
    pub fn code(&self) -> Option<i32> {
        match self {
            ClientError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

fn into_result(response: Response) -> Result<Value> {
    match response {
        Response::Success(success) => Ok(success.result),
        Response::Error(error) => Err(ClientError::Rpc {
            code: error.code,
            message: error.message,
            data: error.data,
        }),
    }
}

/// One entry of a batch call
#[derive(Debug, Clone, PartialEq)]
pub struct RpcCall {
    pub method: String,
    pub args: Option<Vec<Value>>,
    pub kwargs: Option<Map<String, Value>>,
    pub one_way: bool,
}

impl RpcCall {
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args: Some(args),
            kwargs: None,
            one_way: false,
        }
    }

    pub fn named(method: impl Into<String>, kwargs: Map<String, Value>) -> Self {
        Self {
            method: method.into(),
            args: None,
            kwargs: Some(kwargs),
            one_way: false,
        }
    }

    pub fn one_way(mut self) -> Self {
        self.one_way = true;
        self
    }
}

/// RPC client
pub struct RpcClient<T: ClientTransport> {
    protocol: Mutex<Box<dyn RpcProtocol>>,
    transport: T,
}

impl<T: ClientTransport> RpcClient<T> {
    /// Create a new client
    pub fn new(protocol: impl RpcProtocol + 'static, transport: T) -> Self {
        Self::from_boxed(Box::new(protocol), transport)
    }

    pub fn from_boxed(protocol: Box<dyn RpcProtocol>, transport: T) -> Self {
        Self {
            protocol: Mutex::new(protocol),
            transport,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Calls a method. One-way calls return `Value::Null` as soon as the
    /// message is sent.
    pub async fn call(
        &self,
        method: &str,
        args: Option<Vec<Value>>,
        kwargs: Option<Map<String, Value>>,
        one_way: bool,
    ) -> Result<Value> {
        let request = self
            .protocol
            .lock()
            .await
            .create_request(method, args, kwargs, one_way)?;
        let data = request.serialize()?;

        debug!("Sending {} ({} bytes, one_way={})", method, data.len(), one_way);
        let response = match self.exchange(data, one_way).await {
            Ok(Some(response)) => response,
            Ok(None) => return Ok(Value::Null),
            Err(e) => {
                self.forget(request.unique_id.iter()).await;
                return Err(e);
            }
        };

        match response.unique_id() {
            Some(id) if request.unique_id.as_ref() != Some(id) => {
                self.forget(request.unique_id.iter()).await;
                return Err(InvalidReplyError::new(format!(
                    "Reply id {} does not match request",
                    id
                ))
                .into());
            }
            Some(_) => {}
            // an uncorrelated error reply is still an answer to this call
            None => self.forget(request.unique_id.iter()).await,
        }

        into_result(response)
    }

    /// Sends one message and parses the reply, if one is expected.
    async fn exchange(&self, data: Vec<u8>, one_way: bool) -> Result<Option<Response>> {
        let reply = self.transport.send_message(data, !one_way).await?;
        if one_way {
            return Ok(None);
        }

        let reply = reply.ok_or(ClientError::NoReply)?;
        Ok(Some(self.protocol.lock().await.parse_reply(&reply)?))
    }

    async fn exchange_batch(&self, data: Vec<u8>) -> Result<Vec<Response>> {
        let reply = self
            .transport
            .send_message(data, true)
            .await?
            .ok_or(ClientError::NoReply)?;
        let replies = self.protocol.lock().await.parse_batch_reply(&reply)?;
        Ok(replies
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Drops ids whose replies will never be read.
    async fn forget<'a>(&self, ids: impl Iterator<Item = &'a RequestId>) {
        let mut protocol = self.protocol.lock().await;
        for id in ids {
            protocol.forget_reply(id);
        }
    }

    pub async fn call_one_way(&self, method: &str, args: Vec<Value>) -> Result<()> {
        self.call(method, Some(args), None, true).await.map(|_| ())
    }

    /// Sends several calls in one batch and returns their results in call
    /// order. One-way entries yield `Value::Null`.
    pub async fn batch_call(&self, calls: Vec<RpcCall>) -> Result<Vec<Result<Value>>> {
        let (batch, ids) = {
            let mut protocol = self.protocol.lock().await;
            let mut requests = Vec::with_capacity(calls.len());
            for call in calls {
                requests.push(protocol.create_request(
                    &call.method,
                    call.args,
                    call.kwargs,
                    call.one_way,
                )?);
            }
            let ids: Vec<Option<RequestId>> = requests
                .iter()
                .map(|r| if r.one_way { None } else { r.unique_id.clone() })
                .collect();
            (protocol.create_batch_request(requests)?, ids)
        };

        let expect_reply = ids.iter().any(Option::is_some);
        let data = batch.serialize()?;
        debug!("Sending batch of {} ({} bytes)", batch.len(), data.len());
        if !expect_reply {
            self.transport.send_message(data, false).await?;
            return Ok(ids.iter().map(|_| Ok(Value::Null)).collect());
        }

        let replies = match self.exchange_batch(data).await {
            Ok(replies) => replies,
            Err(e) => {
                self.forget(ids.iter().flatten()).await;
                return Err(e);
            }
        };

        let mut by_id: HashMap<RequestId, Response> = HashMap::new();
        let mut uncorrelated: Option<Response> = None;
        for response in replies {
            match response.unique_id().cloned() {
                Some(id) => {
                    by_id.insert(id, response);
                }
                None => uncorrelated = Some(response),
            }
        }

        // ids missing from the reply will not be answered later
        self.forget(ids.iter().flatten().filter(|id| !by_id.contains_key(*id)))
            .await;

        Ok(ids
            .into_iter()
            .map(|id| match id {
                None => Ok(Value::Null),
                Some(id) => match by_id.remove(&id) {
                    Some(response) => into_result(response),
                    None => match &uncorrelated {
                        Some(response) => into_result(response.clone()),
                        None => Err(ClientError::NoReply),
                    },
                },
            })
            .collect())
    }

    /// Proxy that prefixes every method name
    pub fn get_proxy(&self, prefix: impl Into<String>, one_way: bool) -> RpcProxy<'_, T> {
        RpcProxy {
            client: self,
            prefix: prefix.into(),
            one_way,
        }
    }
}

/// Method-call facade over a client
pub struct RpcProxy<'a, T: ClientTransport> {
    client: &'a RpcClient<T>,
    prefix: String,
    one_way: bool,
}

impl<T: ClientTransport> RpcProxy<'_, T> {
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        let method = format!("{}{}", self.prefix, name);
        self.client
            .call(&method, Some(args), None, self.one_way)
            .await
    }

    pub async fn call_named(&self, name: &str, kwargs: Map<String, Value>) -> Result<Value> {
        let method = format!("{}{}", self.prefix, name);
        self.client
            .call(&method, None, Some(kwargs), self.one_way)
            .await
    }
}
