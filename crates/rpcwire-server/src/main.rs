//! rpcwire daemon
//!
//! Serves the example methods over a Unix socket.

use anyhow::Result;
use clap::Parser;
use rpcwire_core::config::Framing;
use rpcwire_core::storage::{init_config_dir, load_config};
use rpcwire_core::WireFormat;
use rpcwire_server::demo::demo_dispatcher;
use rpcwire_server::{Direction, ReplyHandle, RpcServer, UnixSocketServerTransport};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rpcwired")]
#[command(about = "rpcwire daemon - example RPC server", long_about = None)]
struct Args {
    /// Socket path (overrides config)
    #[arg(short, long)]
    socket: Option<String>,

    /// Log level (overrides config)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Wire protocol: jsonrpc or msgpackrpc
    #[arg(short, long)]
    protocol: Option<WireFormat>,

    /// Framing: lines or length_delimited
    #[arg(short, long)]
    framing: Option<Framing>,

    /// Config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log every message in and out
    #[arg(long)]
    trace: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(socket) = args.socket {
        config.server.socket_path = socket;
    }
    if let Some(log_level) = args.log_level {
        config.server.log_level = log_level;
    }
    if let Some(protocol) = args.protocol {
        config.protocol = protocol;
    }
    if let Some(framing) = args.framing {
        config.server.framing = framing;
    }
    config.validate()?;

    let log_file_path = init_config_dir()?.join("rpcwired.log");
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    // stdout and the log file
    use tracing_subscriber::fmt::writer::MakeWriterExt;
    let stdout_writer = std::io::stdout.with_max_level(tracing::Level::INFO);
    let file_writer = log_file.with_max_level(tracing::Level::DEBUG);

    tracing_subscriber::fmt()
        .with_writer(stdout_writer.and(file_writer))
        .with_env_filter(&config.server.log_level)
        .with_ansi(false)
        .init();

    tracing::info!("rpcwired starting...");
    tracing::info!("Protocol: {}", config.protocol);
    tracing::info!("Socket path: {}", config.server.socket_path);
    tracing::info!("Log file: {}", log_file_path.display());

    let dispatcher = demo_dispatcher()?;
    tracing::info!("Methods: {}", dispatcher.method_names().join(", "));

    let transport =
        UnixSocketServerTransport::bind(&config.server.socket_path, config.server.framing)?;
    let mut server = RpcServer::new(transport, config.build_protocol(), dispatcher);
    if args.trace {
        server = server.with_trace(|direction: Direction, context: &ReplyHandle, message: &[u8]| {
            tracing::debug!(
                "{} conn {} {}",
                direction,
                context.connection_id(),
                String::from_utf8_lossy(message)
            );
        });
    }

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.serve_forever().await {
            tracing::error!("Server error: {}", e);
        }
    });

    tracing::info!("Server ready and listening");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");

    server_handle.abort();

    Ok(())
}
