//! MCP (Model Context Protocol) configuration types for the domain layer.
//!
//! These are lightweight config structs used to deserialize the `[mcp]`
//! section of the config file. The actual MCP client logic lives in
//! the `mh-mcp-client` crate.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level MCP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// MCP server definitions. Their order is the registry order, which
    /// decides ownership when two servers expose the same tool name.
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,

    /// Deadline for a single JSON-RPC request, in milliseconds. `0` disables it.
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Optional outer deadline applied by the dispatcher to each tool call.
    #[serde(default)]
    pub tool_call_timeout_ms: Option<u64>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            request_timeout_ms: d_request_timeout_ms(),
            tool_call_timeout_ms: None,
        }
    }
}

/// Configuration for a single MCP server connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Unique identifier for this server (the registry key).
    pub id: String,

    /// The command to spawn (e.g. `"uv"`).
    pub command: String,

    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,

    /// Optional environment variables to set on the spawned process.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Filesystem roots offered to the server.
    ///
    /// `None` means the client does not support roots at all; `Some(vec![])`
    /// means roots are supported but none are shared.
    #[serde(default)]
    pub roots: Option<Vec<String>>,
}

fn d_request_timeout_ms() -> u64 {
    60_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roots_absent_versus_empty() {
        let absent: McpServerConfig =
            serde_json::from_str(r#"{ "id": "a", "command": "echo" }"#).unwrap();
        assert!(absent.roots.is_none());

        let empty: McpServerConfig =
            serde_json::from_str(r#"{ "id": "b", "command": "echo", "roots": [] }"#).unwrap();
        assert_eq!(empty.roots, Some(Vec::new()));
    }

    #[test]
    fn default_request_timeout() {
        let cfg: McpConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.request_timeout_ms, 60_000);
        assert!(cfg.tool_call_timeout_ms.is_none());
    }
}
