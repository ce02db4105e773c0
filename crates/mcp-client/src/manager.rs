//! MCP manager: the ordered client registry and the tool dispatcher.
//!
//! Registration order is the tie-break when two servers expose the same
//! tool name: the first registered client that lists the tool owns it.
//! Ownership is resolved against each server's live catalog on every call,
//! so servers may add or drop tools at runtime.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;

use mh_domain::config::McpConfig;
use mh_domain::tool::{ContentPart, Message, ToolCall, ToolDefinition};

use crate::client::McpClient;
use crate::error::McpError;
use crate::handlers::SessionHandlers;
use crate::transport::TransportError;

/// Discriminator carried by every [`ToolResultBlock`].
pub const TOOL_RESULT_TYPE: &str = "tool_result";

/// One tool result surfaced back to the LLM.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResultBlock {
    pub tool_use_id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: String,
    pub is_error: bool,
}

impl ToolResultBlock {
    pub fn new(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            tool_use_id: tool_use_id.into(),
            kind: TOOL_RESULT_TYPE,
            content: content.into(),
            is_error,
        }
    }

    fn failure(tool_use_id: &str, message: String) -> Self {
        let payload = serde_json::json!({ "error": message }).to_string();
        Self::new(tool_use_id, payload, true)
    }
}

impl From<ToolResultBlock> for ContentPart {
    fn from(block: ToolResultBlock) -> Self {
        ContentPart::ToolResult {
            tool_use_id: block.tool_use_id,
            content: block.content,
            is_error: block.is_error,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// McpManager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Manager that holds all MCP clients in registration order.
#[derive(Debug, Default)]
pub struct McpManager {
    clients: Vec<Arc<McpClient>>,
    tool_call_timeout: Option<Duration>,
}

impl McpManager {
    /// Create an empty manager (no MCP servers configured).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_tool_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_call_timeout = timeout;
        self
    }

    /// Connect every configured server in file order.
    ///
    /// Servers that fail to connect are logged and skipped (not fatal).
    pub async fn from_config(config: &McpConfig, handlers: SessionHandlers) -> Self {
        let request_timeout =
            (config.request_timeout_ms > 0).then(|| Duration::from_millis(config.request_timeout_ms));
        let mut manager = Self::empty()
            .with_tool_call_timeout(config.tool_call_timeout_ms.map(Duration::from_millis));

        for server_config in &config.servers {
            tracing::info!(
                server_id = %server_config.id,
                command = %server_config.command,
                "initializing MCP server"
            );

            let client = match McpClient::from_config(server_config) {
                Ok(c) => c
                    .with_handlers(handlers.clone())
                    .with_request_timeout(request_timeout),
                Err(e) => {
                    tracing::warn!(server_id = %server_config.id, error = %e, "invalid MCP server entry, skipping");
                    continue;
                }
            };

            if let Err(e) = client.connect().await {
                tracing::warn!(
                    server_id = %server_config.id,
                    error = %e,
                    "failed to initialize MCP server, skipping"
                );
                continue;
            }
            if let Err(e) = manager.register(Arc::new(client)) {
                tracing::warn!(server_id = %server_config.id, error = %e, "skipping MCP server");
            }
        }

        if !manager.is_empty() {
            tracing::info!(count = manager.len(), "MCP manager ready");
        }
        manager
    }

    /// Append a client. Names must be unique.
    pub fn register(&mut self, client: Arc<McpClient>) -> Result<(), McpError> {
        if self.get(client.name()).is_some() {
            return Err(McpError::Config(format!(
                "MCP client '{}' is already registered",
                client.name()
            )));
        }
        self.clients.push(client);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<McpClient>> {
        self.clients.iter().find(|c| c.name() == name)
    }

    /// Like [`McpManager::get`], as an error for callers that require the server.
    pub fn require(&self, name: &str) -> Result<&Arc<McpClient>, McpError> {
        self.get(name)
            .ok_or_else(|| McpError::ServerNotFound(name.to_string()))
    }

    pub fn clients(&self) -> &[Arc<McpClient>] {
        &self.clients
    }

    /// Return the number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Check if there are any registered clients.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Every client's catalog, concatenated in registration order.
    pub async fn aggregate_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        let mut tools = Vec::new();
        for client in &self.clients {
            let listed = client.list_tools().await?;
            tools.extend(listed.into_iter().map(ToolDefinition::from));
        }
        Ok(tools)
    }

    /// The first client (in registration order) whose live catalog lists
    /// `tool_name`.
    ///
    /// A client whose catalog cannot be fetched is skipped; its error is
    /// returned only if no other client owns the tool.
    pub async fn resolve_owner(&self, tool_name: &str) -> Result<Option<Arc<McpClient>>, McpError> {
        let mut first_error = None;
        for client in &self.clients {
            match client.list_tools().await {
                Ok(tools) => {
                    if tools.iter().any(|t| t.name == tool_name) {
                        return Ok(Some(client.clone()));
                    }
                }
                Err(e) => {
                    tracing::warn!(server_id = %client.name(), error = %e, "failed to list MCP tools");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    /// Run every tool request in `turn`, returning exactly one result block
    /// per request, in request order.
    pub async fn execute_tool_requests(&self, turn: &Message) -> Vec<ToolResultBlock> {
        let calls = turn.tool_calls();
        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            results.push(self.execute_tool_call(call).await);
        }
        results
    }

    /// Resolve and run a single tool request. Never fails: every failure
    /// becomes an error-status block.
    pub async fn execute_tool_call(&self, call: &ToolCall) -> ToolResultBlock {
        let owner = match self.resolve_owner(&call.tool_name).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                tracing::warn!(tool = %call.tool_name, "no MCP server exposes tool");
                return ToolResultBlock::failure(
                    &call.call_id,
                    format!("Tool '{}' not found.", call.tool_name),
                );
            }
            Err(e) => {
                return ToolResultBlock::failure(
                    &call.call_id,
                    format!("Error executing tool '{}': {e}", call.tool_name),
                );
            }
        };

        tracing::debug!(
            server_id = %owner.name(),
            tool = %call.tool_name,
            call_id = %call.call_id,
            "dispatching MCP tool call"
        );

        let invocation = owner.call_tool(&call.tool_name, call.arguments.clone());
        let outcome = match self.tool_call_timeout {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .unwrap_or(Err(McpError::Transport(TransportError::Timeout))),
            None => invocation.await,
        };

        match outcome {
            Ok(result) => {
                let items = result.text_items();
                match serde_json::to_string(&items) {
                    Ok(payload) => ToolResultBlock::new(&call.call_id, payload, result.is_error),
                    Err(e) => ToolResultBlock::failure(
                        &call.call_id,
                        format!("Error executing tool '{}': {e}", call.tool_name),
                    ),
                }
            }
            Err(e) => {
                tracing::warn!(tool = %call.tool_name, error = %e, "MCP tool call failed");
                ToolResultBlock::failure(
                    &call.call_id,
                    format!("Error executing tool '{}': {e}", call.tool_name),
                )
            }
        }
    }

    /// Clean up every client concurrently.
    pub async fn shutdown(&self) {
        let count = self.clients.len();
        join_all(self.clients.iter().map(|c| {
            tracing::info!(server_id = %c.name(), "shutting down MCP server");
            c.cleanup()
        }))
        .await;
        if count > 0 {
            tracing::info!(count, "all MCP servers shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_manager() {
        let mgr = McpManager::empty();
        assert!(mgr.is_empty());
        assert_eq!(mgr.len(), 0);
        assert!(mgr.get("nonexistent").is_none());
    }

    #[tokio::test]
    async fn empty_manager_has_no_tools() {
        let mgr = McpManager::empty();
        assert!(mgr.aggregate_tools().await.unwrap().is_empty());
        assert!(mgr.resolve_owner("anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_tool_still_yields_a_block() {
        let mgr = McpManager::empty();
        let block = mgr
            .execute_tool_call(&ToolCall {
                call_id: "toolu_1".into(),
                tool_name: "nonexistent".into(),
                arguments: serde_json::json!({}),
            })
            .await;
        assert_eq!(block.tool_use_id, "toolu_1");
        assert!(block.is_error);
        assert!(block.content.contains("Tool 'nonexistent' not found."));
    }

    #[test]
    fn require_missing_server() {
        let mgr = McpManager::empty();
        let err = mgr.require("ghost").unwrap_err();
        assert!(matches!(err, McpError::ServerNotFound(_)));
    }

    #[test]
    fn result_block_serializes_type_tag() {
        let block = ToolResultBlock::new("t1", "[\"ok\"]", false);
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], TOOL_RESULT_TYPE);
        assert_eq!(json["tool_use_id"], "t1");
        assert_eq!(json["is_error"], false);

        let part: ContentPart = block.into();
        assert!(matches!(part, ContentPart::ToolResult { is_error: false, .. }));
    }

    #[test]
    fn register_rejects_duplicates() {
        let cfg = mh_domain::config::McpServerConfig {
            id: "docs".into(),
            command: "uv".into(),
            args: Vec::new(),
            env: Default::default(),
            roots: None,
        };
        let mut mgr = McpManager::empty();
        mgr.register(Arc::new(McpClient::from_config(&cfg).unwrap())).unwrap();
        let err = mgr
            .register(Arc::new(McpClient::from_config(&cfg).unwrap()))
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(mgr.len(), 1);
    }
}
