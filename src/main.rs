//! jrpc: JSON-RPC 2.0 over HTTP POST
//!
//! Serves a small demonstration method table (the `Arith` and `Server`
//! services) behind the dispatcher and the axum transport.
//!
//! Usage:
//!   jrpc                                  # Default port 8080, endpoint at /
//!   jrpc --port 9000 --path /rpc          # Custom port and mount path
//!   jrpc --verbose --log-file             # Debug logging to ~/.jrpc/logs/jrpc.log

mod arith;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use jrpc_server::{JsonCodec, RpcServer, Service};
use jrpc_transport::{TransportConfig, TransportServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::arith::{Arith, ServerInfo};

#[derive(Parser, Debug)]
#[command(name = "jrpc", about = "JSON-RPC 2.0 server over HTTP POST")]
struct Cli {
    /// Port to listen on (0 for OS-assigned)
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Hostname to bind to
    #[arg(long, default_value = "127.0.0.1")]
    hostname: String,

    /// Path the RPC endpoint is mounted on
    #[arg(long, default_value = "/")]
    path: String,

    /// Largest request body accepted, in bytes
    #[arg(long, default_value = "1048576")]
    max_body_bytes: usize,

    /// Per-request deadline handed to methods, in milliseconds
    #[arg(long)]
    request_timeout_ms: Option<u64>,

    /// Enable permissive CORS
    #[arg(long)]
    cors: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Write logs to a file (defaults to ~/.jrpc/logs/jrpc.log if no path given)
    #[arg(long, default_missing_value = "DEFAULT", num_args = 0..=1)]
    log_file: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    let Some(log_file_arg) = cli.log_file.as_deref() else {
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        if cli.log_json {
            builder.json().init();
        } else {
            builder.init();
        }
        return Ok(());
    };

    let log_path = if log_file_arg == "DEFAULT" {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home).join(".jrpc/logs/jrpc.log")
    } else {
        PathBuf::from(log_file_arg)
    };

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("opening log file {}", log_path.display()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    eprintln!("Logging to {}", log_path.display());
    Ok(())
}

fn build_server() -> anyhow::Result<RpcServer> {
    let mut builder = RpcServer::builder();
    builder.register_codec(JsonCodec::new(), "application/json");

    builder.before(|ctx, method, headers, _request| {
        let agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        tracing::debug!("{} -> {method}", ctx.request_id());
        ctx.with_value("user_agent", agent)
    });

    builder.register_service(arith::service(Arith::default()))?;
    builder.register_service(Service::new(ServerInfo).named("Server").method_ctx0(
        "Whoami",
        arith::whoami,
    ))?;

    Ok(builder.build())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli)?;

    let server = Arc::new(build_server()?);
    for method in server.methods() {
        info!("registered {method}");
    }

    let config = TransportConfig {
        port: cli.port,
        hostname: cli.hostname.clone(),
        path: cli.path.clone(),
        max_body_bytes: cli.max_body_bytes,
        enable_cors: cli.cors,
        verbose_logging: cli.verbose,
        request_timeout: cli.request_timeout_ms.map(Duration::from_millis),
    };

    let mut transport = TransportServer::start(config, server)
        .await
        .context("starting transport")?;

    println!();
    println!("  JSON-RPC endpoint:");
    println!("    http://{}{}", transport.local_addr(), cli.path);
    println!();
    println!("  Press Ctrl+C to stop.");
    println!();

    tokio::signal::ctrl_c().await.context("waiting for Ctrl+C")?;

    println!();
    println!("  Shutting down...");
    transport.stop().await;
    println!("  Server stopped.");
    Ok(())
}
