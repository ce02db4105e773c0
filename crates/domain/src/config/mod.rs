mod chat;
mod llm;
mod mcp;

pub use chat::*;
pub use llm::*;
pub use mcp::*;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl Config {
    /// Check cross-section references that serde cannot express.
    pub fn validate(&self) -> crate::error::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for server in &self.mcp.servers {
            if server.id.trim().is_empty() {
                return Err(crate::error::Error::Config("MCP server id must not be empty".into()));
            }
            if !seen.insert(server.id.as_str()) {
                return Err(crate::error::Error::Config(format!(
                    "duplicate MCP server id '{}'",
                    server.id
                )));
            }
        }
        if let Some(doc) = &self.chat.document_server {
            if !seen.contains(doc.as_str()) {
                return Err(crate::error::Error::Config(format!(
                    "chat.document_server '{doc}' is not a configured MCP server"
                )));
            }
        }
        Ok(())
    }
}
