//! MCP server core: routes JSON-RPC requests to tool handlers.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListToolsResult,
    ServerCapabilities, ServerInfo, ToolDescription, ToolResultContent,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::services::Services;
use crate::tools;

pub struct McpServer {
    services: Services,
    initialized: bool,
}

impl McpServer {
    pub fn new(services: Services) -> Self {
        Self { services, initialized: false }
    }

    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("handling request: {}", request.method);

        if !self.initialized && request.method != "initialize" && request.method != "notifications/initialized" {
            warn!("rejecting '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(request.id, JsonRpcError::server_not_initialized()));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list().await,
            "tools/call" => self.handle_tools_call(request.params).await,
            "shutdown" => self.handle_shutdown().await,
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!("unknown method: {}", method);
                Err(JsonRpcError::method_not_found())
            }
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    async fn handle_initialize(&mut self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => InitializeRequest::default(),
        };

        let negotiated_version = if request.protocol_version.as_str() < MCP_VERSION {
            info!("client requested older protocol version {}, using it", request.protocol_version);
            request.protocol_version.clone()
        } else {
            MCP_VERSION.to_string()
        };

        self.initialized = true;
        info!("session initialized for project '{}', protocol version {}", self.services.project_id, negotiated_version);

        let result = InitializeResult {
            protocol_version: negotiated_version,
            server_info: ServerInfo { name: "palimpsest".to_string(), version: env!("CARGO_PKG_VERSION").to_string() },
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
                "This server holds long-term, per-project memory extracted from a source repository: \
                 requirements, design decisions, code patterns, components, functions, test history, \
                 sessions, and user preferences. Use `semantic_search` before re-deriving something \
                 that may already be known, `add` to record durable facts, and `index` to (re-)scan \
                 a codebase into component/function memories."
                    .to_string(),
            ),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let mut tools = vec![
            ToolDescription {
                name: "add".to_string(),
                description: Some("Create a new memory of the given type. Runs conflict detection against near-duplicate content unless disabled.".to_string()),
                input_schema: tools::memory::add_schema(),
            },
            ToolDescription {
                name: "get".to_string(),
                description: Some("Fetch a single memory by id and type.".to_string()),
                input_schema: tools::memory::get_schema(),
            },
            ToolDescription {
                name: "update".to_string(),
                description: Some("Patch a memory's content, importance score, or payload fields in place.".to_string()),
                input_schema: tools::memory::update_schema(),
            },
            ToolDescription {
                name: "delete".to_string(),
                description: Some("Soft- or hard-delete a memory.".to_string()),
                input_schema: tools::memory::delete_schema(),
            },
            ToolDescription {
                name: "bulk_add".to_string(),
                description: Some("Create many memories in one call; per-item failures are reported without aborting the batch.".to_string()),
                input_schema: tools::memory::bulk_add_schema(),
            },
            ToolDescription {
                name: "process_pending".to_string(),
                description: Some("Drain the outbox of vector/graph writes queued since the last sync.".to_string()),
                input_schema: tools::sync::process_pending_schema(),
            },
            ToolDescription {
                name: "retry_failed".to_string(),
                description: Some("Retry previously failed sync records, optionally including dead-lettered ones.".to_string()),
                input_schema: tools::sync::retry_failed_schema(),
            },
            ToolDescription {
                name: "verify_consistency".to_string(),
                description: Some("Sample records and report on vector/graph store divergence.".to_string()),
                input_schema: tools::sync::verify_consistency_schema(),
            },
            ToolDescription {
                name: "semantic_search".to_string(),
                description: Some("Embed the query and return the closest memories, optionally restricted by type and payload filters.".to_string()),
                input_schema: tools::query::semantic_search_schema(),
            },
            ToolDescription {
                name: "get_related".to_string(),
                description: Some("Traverse the graph store from an entity to find related memories.".to_string()),
                input_schema: tools::query::get_related_schema(),
            },
            ToolDescription {
                name: "graph_query".to_string(),
                description: Some("Run a read-only Cypher statement against the graph store.".to_string()),
                input_schema: tools::query::graph_query_schema(),
            },
            ToolDescription {
                name: "find_duplicates".to_string(),
                description: Some("Embed a code snippet and return near-duplicate Function memories above a similarity threshold.".to_string()),
                input_schema: tools::query::find_duplicates_schema(),
            },
            ToolDescription {
                name: "normalize".to_string(),
                description: Some("Run the normalization pipeline (dedup, orphan detection, embedding refresh, cleanup, validation) over all memories.".to_string()),
                input_schema: tools::normalize::normalize_schema(),
            },
        ];

        #[cfg(feature = "parser")]
        tools.push(ToolDescription {
            name: "index".to_string(),
            description: Some("Scan a file or directory and persist extracted code entities as memories.".to_string()),
            input_schema: tools::index::index_schema(),
        });

        serde_json::to_value(ListToolsResult { tools }).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_call(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("missing tool call parameters")),
        };

        let result = match request.name.as_str() {
            "add" => tools::memory::execute_add(&self.services, request.arguments).await,
            "get" => tools::memory::execute_get(&self.services, request.arguments).await,
            "update" => tools::memory::execute_update(&self.services, request.arguments).await,
            "delete" => tools::memory::execute_delete(&self.services, request.arguments).await,
            "bulk_add" => tools::memory::execute_bulk_add(&self.services, request.arguments).await,
            "process_pending" => tools::sync::execute_process_pending(&self.services, request.arguments).await,
            "retry_failed" => tools::sync::execute_retry_failed(&self.services, request.arguments).await,
            "verify_consistency" => tools::sync::execute_verify_consistency(&self.services, request.arguments).await,
            "semantic_search" => tools::query::execute_semantic_search(&self.services, request.arguments).await,
            "get_related" => tools::query::execute_get_related(&self.services, request.arguments).await,
            "graph_query" => tools::query::execute_graph_query(&self.services, request.arguments).await,
            "find_duplicates" => tools::query::execute_find_duplicates(&self.services, request.arguments).await,
            "normalize" => tools::normalize::execute_normalize(&self.services, request.arguments).await,
            #[cfg(feature = "parser")]
            "index" => tools::index::execute_index(&self.services, request.arguments).await,
            name => return Err(JsonRpcError::method_not_found_with_message(&format!("unknown tool: {name}"))),
        };

        let call_result = match result {
            Ok(content) => CallToolResult {
                content: vec![ToolResultContent {
                    content_type: "text".to_string(),
                    text: serde_json::to_string_pretty(&content).unwrap_or_else(|_| content.to_string()),
                }],
                is_error: Some(false),
            },
            Err(e) => CallToolResult {
                content: vec![ToolResultContent { content_type: "text".to_string(), text: serde_json::json!({ "error": e }).to_string() }],
                is_error: Some(true),
            },
        };

        serde_json::to_value(call_result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    /// Not part of MCP proper: gives a client a clean way to ask the server to
    /// flush its outbox before the transport is torn down, rather than relying
    /// on the next session's `process_pending` call to pick up the slack.
    async fn handle_shutdown(&self) -> Result<serde_json::Value, JsonRpcError> {
        match self.services.sync.process_pending(usize::MAX).await {
            Ok(stats) => Ok(serde_json::json!({ "ok": true, "synced": stats.synced, "failed": stats.failed })),
            Err(e) => {
                warn!("shutdown flush failed: {e}");
                Ok(serde_json::json!({ "ok": false, "error": e.to_string() }))
            }
        }
    }
}
