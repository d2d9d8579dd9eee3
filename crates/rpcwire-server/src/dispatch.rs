//! Method dispatch
//!
//! Maps method names to handlers and turns parsed requests into replies.

use futures::future::{BoxFuture, FutureExt};
use rpcwire_core::{Params, ParsedRequest, Reply, Request, Response, RpcError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error};

pub type HandlerFuture = BoxFuture<'static, std::result::Result<Value, RpcError>>;

/// A registered method body
pub type Handler = Arc<dyn Fn(Params) -> HandlerFuture + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Method already registered: {0}")]
    AlreadyRegistered(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Wraps an async closure as a handler.
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Value, RpcError>> + Send + 'static,
{
    Arc::new(move |params| f(params).boxed())
}

/// Wraps a synchronous closure as a handler.
pub fn sync_handler<F>(f: F) -> Handler
where
    F: Fn(Params) -> std::result::Result<Value, RpcError> + Send + Sync + 'static,
{
    Arc::new(move |params| futures::future::ready(f(params)).boxed())
}

/// A group of methods registered together under a prefix
pub trait RpcService: Send + Sync + 'static {
    /// Method names (without prefix) and their handlers
    fn methods(self: Arc<Self>) -> Vec<(String, Handler)>;
}

#[derive(Default)]
pub struct Dispatcher {
    methods: HashMap<String, Handler>,
    subdispatchers: Vec<(String, Arc<Dispatcher>)>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&mut self, name: impl Into<String>, handler: Handler) -> Result<()> {
        let name = name.into();
        if self.methods.contains_key(&name) {
            return Err(DispatchError::AlreadyRegistered(name));
        }
        self.methods.insert(name, handler);
        Ok(())
    }

    pub fn add_method<F, Fut>(&mut self, name: impl Into<String>, f: F) -> Result<()>
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Value, RpcError>> + Send + 'static,
    {
        self.add_handler(name, handler(f))
    }

    pub fn add_sync_method<F>(&mut self, name: impl Into<String>, f: F) -> Result<()>
    where
        F: Fn(Params) -> std::result::Result<Value, RpcError> + Send + Sync + 'static,
    {
        self.add_handler(name, sync_handler(f))
    }

    /// Registers a method with typed arguments and result.
    ///
    /// Params that do not deserialize into `A` are answered with InvalidParams.
    pub fn add_typed_method<A, R, F>(&mut self, name: impl Into<String>, f: F) -> Result<()>
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
        F: Fn(A) -> std::result::Result<R, RpcError> + Send + Sync + 'static,
    {
        self.add_sync_method(name, move |params| {
            let args: A = params.parse()?;
            let result = f(args)?;
            serde_json::to_value(result).map_err(|e| RpcError::server_error(e.to_string()))
        })
    }

    /// Attaches another dispatcher. Names starting with `prefix` that are
    /// not found locally are looked up there with the prefix removed.
    pub fn add_subdispatch(&mut self, dispatcher: Dispatcher, prefix: impl Into<String>) {
        self.subdispatchers
            .push((prefix.into(), Arc::new(dispatcher)));
    }

    pub fn register_service<S: RpcService>(
        &mut self,
        service: Arc<S>,
        prefix: impl Into<String>,
    ) -> Result<()> {
        let mut sub = Dispatcher::new();
        for (name, handler) in service.methods() {
            sub.add_handler(name, handler)?;
        }
        self.add_subdispatch(sub, prefix);
        Ok(())
    }

    pub fn get_method(&self, name: &str) -> Option<Handler> {
        if let Some(handler) = self.methods.get(name) {
            return Some(handler.clone());
        }

        self.subdispatchers.iter().find_map(|(prefix, sub)| {
            name.strip_prefix(prefix.as_str())
                .and_then(|rest| sub.get_method(rest))
        })
    }

    /// All reachable method names, prefixed, sorted
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        for (prefix, sub) in &self.subdispatchers {
            names.extend(
                sub.method_names()
                    .into_iter()
                    .map(|name| format!("{}{}", prefix, name)),
            );
        }
        names.sort();
        names
    }

    /// Runs a parsed request or batch. `None` means nothing is sent back.
    pub async fn dispatch(&self, request: ParsedRequest) -> Option<Reply> {
        match request {
            ParsedRequest::Single(request) => self.dispatch_request(request).await.map(Reply::Single),
            ParsedRequest::Batch(batch) => {
                let mut response = batch.create_batch_response()?;
                // sequential, so replies keep request order
                for item in batch {
                    match item {
                        Ok(request) => response.push(self.dispatch_request(request).await),
                        Err(error) => response.push(Some(error.error_respond())),
                    }
                }
                Some(Reply::Batch(response))
            }
        }
    }

    pub async fn dispatch_request(&self, request: Request) -> Option<Response> {
        let Some(handler) = self.get_method(&request.method) else {
            debug!("Method not found: {}", request.method);
            return request.error_respond(&RpcError::method_not_found());
        };

        let params = request.params.clone();
        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| handler(params))) {
            Ok(future) => future,
            Err(_) => return Self::panicked(&request),
        };

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(result)) => request.respond(result),
            Ok(Err(e)) => {
                debug!("Method {} failed: {}", request.method, e);
                request.error_respond(&e)
            }
            Err(_) => Self::panicked(&request),
        }
    }

    fn panicked(request: &Request) -> Option<Response> {
        error!("Method {} panicked", request.method);
        request.error_respond(&RpcError::internal_error())
    }
}
