//! Example methods served by `rpcwired`

use rpcwire_core::{Params, RpcError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::dispatch::{sync_handler, DispatchError, Dispatcher, Handler, RpcService};

#[derive(Deserialize)]
struct SubtractArgs {
    minuend: f64,
    subtrahend: f64,
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

fn numbers(params: &Params) -> Result<Vec<f64>, RpcError> {
    if let Params::Named(_) = params {
        return Err(RpcError::invalid_params().with_data(json!("expected positional numbers")));
    }
    params
        .args()
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| RpcError::invalid_params().with_data(json!("expected numbers")))
        })
        .collect()
}

fn subtract(params: Params) -> Result<Value, RpcError> {
    let (minuend, subtrahend) = match &params {
        Params::Named(_) => {
            let args: SubtractArgs = params.parse()?;
            (args.minuend, args.subtrahend)
        }
        _ => params.parse::<(f64, f64)>()?,
    };
    Ok(number(minuend - subtrahend))
}

/// Arithmetic under `math.`
pub struct MathService;

impl RpcService for MathService {
    fn methods(self: Arc<Self>) -> Vec<(String, Handler)> {
        vec![
            (
                "add".to_string(),
                sync_handler(|params| Ok(number(numbers(&params)?.iter().sum()))),
            ),
            (
                "multiply".to_string(),
                sync_handler(|params| Ok(number(numbers(&params)?.iter().product()))),
            ),
            (
                "divide".to_string(),
                sync_handler(|params| {
                    let (a, b): (f64, f64) = params.parse()?;
                    if b == 0.0 {
                        return Err(
                            RpcError::server_error("Division by zero").with_data(json!({"dividend": a}))
                        );
                    }
                    Ok(number(a / b))
                }),
            ),
        ]
    }
}

/// Dispatcher with the example methods
pub fn demo_dispatcher() -> Result<Dispatcher, DispatchError> {
    let mut dispatcher = Dispatcher::new();

    dispatcher.add_sync_method("subtract", subtract)?;
    dispatcher.add_sync_method("sum", |params| {
        Ok(number(numbers(&params)?.iter().sum()))
    })?;
    dispatcher.add_sync_method("echo", |params| Ok(params.to_value()))?;
    dispatcher.add_sync_method("notify_hello", |params| {
        tracing::info!("Hello {}", params.to_value());
        Ok(Value::Null)
    })?;
    dispatcher.add_sync_method("get_data", |_| Ok(json!(["hello", 5])))?;
    dispatcher.add_method("sleep", |params: Params| async move {
        let (millis,): (u64,) = params.parse()?;
        tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
        Ok(json!(millis))
    })?;

    dispatcher.register_service(Arc::new(MathService), "math.")?;
    Ok(dispatcher)
}
