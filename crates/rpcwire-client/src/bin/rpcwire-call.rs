//! Sends a single RPC call to a running server and prints the result.

use anyhow::{bail, Result};
use clap::Parser;
use rpcwire_client::{ClientError, RpcClient, UnixSocketClientTransport};
use rpcwire_core::config::Framing;
use rpcwire_core::storage::load_config;
use rpcwire_core::WireFormat;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rpcwire-call")]
#[command(about = "Call a method on an rpcwire server", long_about = None)]
struct Args {
    /// Method name
    method: String,

    /// Params as JSON: an array for positional, an object for named
    params: Option<String>,

    /// Socket path (defaults to the configured one)
    #[arg(short, long)]
    socket: Option<String>,

    /// Wire protocol: jsonrpc or msgpackrpc
    #[arg(short, long)]
    protocol: Option<WireFormat>,

    /// Framing: lines or length_delimited
    #[arg(short, long)]
    framing: Option<Framing>,

    /// Config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Send as a notification and do not wait for a reply
    #[arg(short, long)]
    notify: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(socket) = args.socket {
        config.server.socket_path = socket;
    }
    if let Some(protocol) = args.protocol {
        config.protocol = protocol;
    }
    if let Some(framing) = args.framing {
        config.server.framing = framing;
    }
    config.validate()?;

    let (positional, named) = match args.params.as_deref() {
        None => (None, None),
        Some(raw) => match serde_json::from_str::<Value>(raw)? {
            Value::Array(items) => (Some(items), None),
            Value::Object(map) => (None, Some(map)),
            other => bail!("Params must be a JSON array or object, got {}", other),
        },
    };

    let transport =
        UnixSocketClientTransport::new(&config.server.socket_path, config.server.framing);
    let client = RpcClient::from_boxed(config.build_protocol(), transport);

    match client
        .call(&args.method, positional, named, args.notify)
        .await
    {
        Ok(result) => {
            if !args.notify {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            Ok(())
        }
        Err(ClientError::Rpc {
            code,
            message,
            data,
        }) => {
            eprintln!("Error {}: {}", code, message);
            if let Some(data) = data {
                eprintln!("{}", serde_json::to_string_pretty(&data)?);
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}
