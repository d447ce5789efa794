//! MCP Server Core
//!
//! Routes JSON-RPC requests to the gateway's tool handlers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListToolsResult,
    ServerCapabilities, ServerInfo, ToolDescription, ToolResultContent,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::tools;
use cockpit_core::Store;

/// MCP Server implementation
pub struct McpServer {
    store: Arc<Mutex<Store>>,
    initialized: bool,
}

impl McpServer {
    pub fn new(store: Arc<Mutex<Store>>) -> Self {
        Self {
            store,
            initialized: false,
        }
    }

    /// Handle an incoming JSON-RPC request
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Handling request: {}", request.method);

        // Check initialization for non-initialize requests
        if !self.initialized
            && request.method != "initialize"
            && request.method != "notifications/initialized"
        {
            warn!("Rejecting request '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::server_not_initialized(),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "notifications/initialized" => {
                // Notification, no response needed
                return None;
            }
            "tools/list" => self.handle_tools_list().await,
            "tools/call" => self.handle_tools_call(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => {
                if request.id.is_none() {
                    debug!("Ignoring unknown notification: {}", method);
                    return None;
                }
                warn!("Unknown method: {}", method);
                Err(JsonRpcError::method_not_found())
            }
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    /// Handle initialize request
    async fn handle_initialize(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => InitializeRequest::default(),
        };

        // Version negotiation: answer with the client's version if it is older
        let negotiated_version = if request.protocol_version.as_str() < MCP_VERSION {
            info!(
                "Client requested older protocol version {}, using it",
                request.protocol_version
            );
            request.protocol_version.clone()
        } else {
            MCP_VERSION.to_string()
        };

        self.initialized = true;
        info!(
            client = request.client_info.as_ref().map(|c| c.name.as_str()).unwrap_or("unknown"),
            "MCP session initialized with protocol version {}",
            negotiated_version
        );

        let result = InitializeResult {
            protocol_version: negotiated_version,
            server_info: ServerInfo {
                name: "efficiency-cockpit".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some({
                    let mut map = HashMap::new();
                    map.insert("listChanged".to_string(), serde_json::json!(false));
                    map
                }),
                resources: None,
                prompts: None,
            },
            instructions: Some(
                "Efficiency Cockpit exposes the user's captured work history: app activity, \
                 context snapshots, decisions, insights and AI interactions. Use 'search' to \
                 find records by text, 'record' to read or write one kind, 'activity_summary' for time spent per app, and 'stats' to check \
                 database health. Run 'rebuild_index' if ranked search misses records that \
                 substring search finds."
                    .to_string(),
            ),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    /// Handle tools/list request
    async fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = vec![
            ToolDescription {
                name: "search".to_string(),
                description: Some("Search captured records across kinds. Modes: 'unified' (default; BM25-ranked full-text with substring fallback), 'ranked' (full-text only, with highlighted snippets), 'substring' (case-insensitive literal match over the newest records).".to_string()),
                input_schema: tools::search::schema(),
            },
            ToolDescription {
                name: "record".to_string(),
                description: Some("Read or write records of one kind. Actions: 'insert' (create from fields), 'get' (fetch by id), 'list' (newest first, with date and field filters), 'update' (apply fields to an existing record), 'inspect' (dump every stored column).".to_string()),
                input_schema: tools::record::schema(),
            },
            ToolDescription {
                name: "activity_summary".to_string(),
                description: Some("Per-app activity totals over a time window (default: the last 24 hours): activity count, idle count, non-idle seconds and the most active app.".to_string()),
                input_schema: tools::summary::schema(),
            },
            ToolDescription {
                name: "rebuild_index".to_string(),
                description: Some("Rebuild every full-text shadow index from the primary tables. Use after the tracker app has written records directly.".to_string()),
                input_schema: tools::maintenance::rebuild_schema(),
            },
            ToolDescription {
                name: "reconcile_index".to_string(),
                description: Some("Delete full-text index rows whose records no longer exist.".to_string()),
                input_schema: tools::maintenance::reconcile_schema(),
            },
            ToolDescription {
                name: "stats".to_string(),
                description: Some("Database health: per-kind record and index counts, discovered entity tags, schema completeness and warnings.".to_string()),
                input_schema: tools::maintenance::stats_schema(),
            },
        ];

        let result = ListToolsResult { tools };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    /// Handle tools/call request
    async fn handle_tools_call(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("Missing tool call parameters")),
        };

        let result = match request.name.as_str() {
            "search" => tools::search::execute(&self.store, request.arguments).await,
            "record" => tools::record::execute(&self.store, request.arguments).await,
            "activity_summary" => tools::summary::execute(&self.store, request.arguments).await,
            "rebuild_index" => tools::maintenance::execute_rebuild(&self.store, request.arguments).await,
            "reconcile_index" => {
                tools::maintenance::execute_reconcile(&self.store, request.arguments).await
            }
            "stats" => tools::maintenance::execute_stats(&self.store, request.arguments).await,
            name => {
                return Err(JsonRpcError::method_not_found_with_message(&format!(
                    "Unknown tool: {}",
                    name
                )));
            }
        };

        let call_result = match result {
            Ok(content) => CallToolResult {
                content: vec![ToolResultContent {
                    content_type: "text".to_string(),
                    text: serde_json::to_string_pretty(&content)
                        .unwrap_or_else(|_| content.to_string()),
                }],
                is_error: Some(false),
            },
            Err(e) => {
                warn!(tool = %request.name, error = %e, "Tool call failed");
                CallToolResult {
                    content: vec![ToolResultContent {
                        content_type: "text".to_string(),
                        text: serde_json::json!({ "error": e }).to_string(),
                    }],
                    is_error: Some(true),
                }
            }
        };

        serde_json::to_value(call_result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }
}
