//! Streamable HTTP transport.
//!
//! Routes:
//! - `/mcp` and every other unmatched path (including `/`) - MCP, stateless
//! - `GET /health` - liveness, always `200 OK`
//!
//! SIGINT, SIGHUP and SIGTERM stop the listener; in-flight requests get up to
//! [`SHUTDOWN_GRACE_PERIOD`] to complete.
//!
//! Every request is logged at `info` with method, path and remote address.
//! Headers and body size are logged at `debug`.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::TransportError;
use crate::mcp::ObsMcpServer;

pub const MCP_ENDPOINT: &str = "/mcp";
pub const HEALTH_ENDPOINT: &str = "/health";

/// Time in-flight requests get to finish after a shutdown signal.
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Build the HTTP router around an MCP server.
pub fn router(server: ObsMcpServer) -> Router {
    let mcp_service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig {
            stateful_mode: false,
            ..Default::default()
        },
    );

    Router::new()
        .route(HEALTH_ENDPOINT, get(health_handler))
        .route_service(MCP_ENDPOINT, mcp_service.clone())
        // Some callers expect the MCP endpoint at the root.
        .fallback_service(mcp_service)
        .layer(middleware::from_fn(log_request))
}

/// Bind `listen` and serve until a termination signal arrives.
pub async fn serve(server: ObsMcpServer, listen: &str) -> Result<(), TransportError> {
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|source| TransportError::Bind {
            addr: listen.to_string(),
            source,
        })?;

    let shutdown = shutdown_signal()?;

    info!(
        addr = %listen,
        endpoint = MCP_ENDPOINT,
        "HTTP server starting"
    );

    serve_with_shutdown(listener, router(server), shutdown, SHUTDOWN_GRACE_PERIOD).await
}

/// Serve `app` until `shutdown` resolves, then drain for at most `grace`.
///
/// Returns as soon as every in-flight request has completed. Connections
/// still open when `grace` expires are abandoned and shutdown proceeds.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    app: Router,
    shutdown: F,
    grace: Duration,
) -> Result<(), TransportError>
where
    F: Future<Output = ()> + Send,
{
    let stop = CancellationToken::new();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(stop.clone().cancelled_owned());
    let mut server = tokio::spawn(async move { server.await });

    tokio::pin!(shutdown);
    tokio::select! {
        result = &mut server => {
            error!("HTTP server exited before shutdown was requested");
            return server_exit(result);
        }
        _ = &mut shutdown => {
            info!("Initiating graceful shutdown");
        }
    }

    stop.cancel();
    info!(grace_secs = grace.as_secs_f64(), "Shutting down HTTP server gracefully");

    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => {
            server_exit(result)?;
            info!("HTTP server shutdown complete");
        }
        Err(_) => {
            warn!(
                grace_secs = grace.as_secs_f64(),
                "Graceful shutdown timed out, closing remaining connections"
            );
            server.abort();
        }
    }

    Ok(())
}

/// Resolve on the first SIGINT, SIGHUP or SIGTERM.
pub fn shutdown_signal() -> Result<impl Future<Output = ()> + Send + 'static, TransportError> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(TransportError::Signal)?;
    let mut sighup = signal(SignalKind::hangup()).map_err(TransportError::Signal)?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(TransportError::Signal)?;

    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
            _ = sighup.recv() => info!("Received SIGHUP, initiating graceful shutdown"),
            _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
        }
    })
}

fn server_exit(result: Result<std::io::Result<()>, JoinError>) -> Result<(), TransportError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TransportError::Serve(e)),
        Err(e) => Err(TransportError::Serve(std::io::Error::other(e))),
    }
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Log every incoming request. Does not alter the request.
async fn log_request(request: Request, next: Next) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    info!(
        method = %request.method(),
        path = %request.uri().path(),
        remote = %remote,
        "Incoming request"
    );
    debug!(headers = ?request.headers(), "Request headers");

    let content_length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|len| *len > 0);
    if let Some(len) = content_length {
        debug!(content_length = len, "Request body");
    }

    next.run(request).await
}
