//! obs-mcp binary.
//!
//! # Usage
//!
//! ```bash
//! # stdio (default)
//! PROMETHEUS_URL=http://localhost:9090 obs-mcp
//!
//! # streamable HTTP on /mcp and /, health check on /health
//! obs-mcp --listen 127.0.0.1:8080
//! ```
//!
//! # MCP client configuration
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "obs": {
//!       "command": "/path/to/obs-mcp",
//!       "env": { "PROMETHEUS_URL": "http://localhost:9090" }
//!     }
//!   }
//! }
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use obs_mcp::config::{Config, TransportMode, PROMETHEUS_URL_ENV};
use obs_mcp::logging::{self, LogFormat};
use obs_mcp::mcp::ObsMcpServer;
use obs_mcp::prometheus::PrometheusClient;
use obs_mcp::transport;

#[derive(Parser, Debug)]
#[command(name = "obs-mcp")]
#[command(about = "MCP server for Prometheus metrics")]
#[command(version)]
struct Args {
    /// Listen address for HTTP mode (e.g., :9100, 127.0.0.1:8080).
    /// stdio is used when empty.
    #[arg(long)]
    listen: Option<String>,

    /// Base URL of the Prometheus server.
    /// Defaults to http://localhost:9090.
    #[arg(long, env = PROMETHEUS_URL_ENV)]
    prometheus_url: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_format);

    let config = Config::from_args(args.listen.as_deref(), args.prometheus_url.as_deref())
        .context("Invalid configuration")?;

    // stdio handles one invocation at a time; a single thread keeps rmcp's
    // per-request tasks queued in arrival order.
    let mut runtime = match config.transport {
        TransportMode::Stdio => tokio::runtime::Builder::new_current_thread(),
        TransportMode::Http { .. } => tokio::runtime::Builder::new_multi_thread(),
    };
    let runtime = runtime
        .enable_all()
        .build()
        .context("Failed to start Tokio runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    tracing::info!(
        prometheus_url = %config.backend.url,
        transport = ?config.transport,
        "Starting obs-mcp"
    );

    let client =
        PrometheusClient::new(&config.backend).context("Failed to create Prometheus client")?;
    let server = ObsMcpServer::new(Arc::new(client));

    match config.transport {
        TransportMode::Stdio => transport::stdio::serve(server)
            .await
            .context("MCP stdio server failed")?,
        TransportMode::Http { listen } => transport::http::serve(server, &listen)
            .await
            .context("HTTP server failed")?,
    }

    Ok(())
}
