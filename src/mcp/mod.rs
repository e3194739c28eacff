//! MCP (Model Context Protocol) server for Prometheus.
//!
//! Exposes metric discovery and PromQL range queries as tools for LLM agents.
//! The same server value backs both the stdio and the HTTP transport.

pub mod tools;

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use rmcp::{
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, JsonObject, ServerCapabilities, ServerInfo},
    service::RequestContext,
    tool, tool_handler, tool_router, ErrorData as McpError, RoleServer, ServerHandler,
};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::prometheus::MetricsBackend;
use tools::ExecuteRangeQueryParams;

const SERVER_NAME: &str = "obs-mcp";

/// MCP server backed by a metrics backend.
#[derive(Clone)]
pub struct ObsMcpServer {
    backend: Arc<dyn MetricsBackend>,
    /// When set, invocations run one at a time in arrival order.
    gate: Option<Arc<Mutex<()>>>,
    tool_router: ToolRouter<Self>,
}

impl ObsMcpServer {
    pub fn new(backend: Arc<dyn MetricsBackend>) -> Self {
        let mut tool_router = Self::tool_router();

        // Some MCP clients reject a tool whose schema declares no properties.
        if let Some(route) = tool_router.map.get_mut(tools::LIST_METRICS) {
            route.attr.input_schema = Arc::new(empty_input_schema());
        }

        Self {
            backend,
            gate: None,
            tool_router,
        }
    }

    /// Serialize invocations. Used for the stdio transport.
    ///
    /// Waiters are admitted in the order they reach the gate. rmcp spawns one
    /// task per request, so that order matches arrival order only on a
    /// current-thread runtime, which is how the binary runs stdio mode.
    pub fn sequential(mut self) -> Self {
        self.gate = Some(Arc::new(Mutex::new(())));
        self
    }

    async fn enter(&self) -> Option<OwnedMutexGuard<()>> {
        match &self.gate {
            Some(gate) => Some(gate.clone().lock_owned().await),
            None => None,
        }
    }

    /// Run `call` behind the gate, abandoning it once `ct` is cancelled.
    ///
    /// Dropping `call` drops any in-flight backend request and releases the
    /// gate for the next invocation.
    async fn run<T, F>(&self, ct: &CancellationToken, call: F) -> Result<T, ToolError>
    where
        F: Future<Output = Result<T, ToolError>>,
    {
        tokio::select! {
            _ = ct.cancelled() => Err(ToolError::Cancelled),
            result = async {
                let _turn = self.enter().await;
                call.await
            } => result,
        }
    }

    async fn handle_list_metrics(
        &self,
        ct: &CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        match self.run(ct, tools::list_metrics(self.backend.as_ref())).await {
            Ok(metrics) => {
                debug!(count = metrics.len(), "Listed metrics");
                json_result(&metrics)
            }
            Err(e) => Ok(tool_error(tools::LIST_METRICS, e)),
        }
    }

    async fn handle_execute_range_query(
        &self,
        params: &ExecuteRangeQueryParams,
        ct: &CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        // `now` is taken once the gate is held, not when the request arrived.
        let call = async {
            tools::execute_range_query(self.backend.as_ref(), params, Utc::now()).await
        };
        match self.run(ct, call).await {
            Ok(result) => json_result(&result),
            Err(e) => Ok(tool_error(tools::EXECUTE_RANGE_QUERY, e)),
        }
    }
}

fn empty_input_schema() -> JsonObject {
    let mut schema = JsonObject::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), json!({}));
    schema
}

fn json_result<T: Serialize>(payload: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(payload)
        .map_err(|e| McpError::internal_error(format!("JSON error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn tool_error(tool: &str, e: ToolError) -> CallToolResult {
    match &e {
        ToolError::Backend(_) => warn!(tool, error = %e, "Backend call failed"),
        ToolError::Cancelled => debug!(tool, "Tool invocation cancelled"),
        _ => debug!(tool, error = %e, "Rejected tool invocation"),
    }
    CallToolResult::error(vec![Content::text(e.to_string())])
}

// --- Tool Implementations ---

#[tool_router]
impl ObsMcpServer {
    #[tool(
        name = "list_metrics",
        description = "List all available metrics in Prometheus"
    )]
    async fn list_metrics(
        &self,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.handle_list_metrics(&context.ct).await
    }

    #[tool(
        name = "execute_range_query",
        description = "Execute a PromQL range query with flexible time specification.\n\n\
            For current time data queries, use only the 'duration' parameter to specify how far \
            back to look from now (e.g., '1h' for last hour, '30m' for last 30 minutes). In that \
            case do NOT provide 'start' or 'end' at all.\n\n\
            For historical data queries, use explicit 'start' and 'end' times."
    )]
    async fn execute_range_query(
        &self,
        Parameters(params): Parameters<ExecuteRangeQueryParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.handle_execute_range_query(&params, &context.ct).await
    }
}

#[tool_handler]
impl ServerHandler for ObsMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: SERVER_NAME.into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: Some("Observability MCP".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "MCP server for Prometheus metrics. Use list_metrics to discover metric \
                 names, then execute_range_query to fetch time series with PromQL, either \
                 for a trailing 'duration' or between explicit 'start' and 'end' times."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
