use serde::{Deserialize, Serialize};

/// Settings for the document chat extension and the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Id of the MCP server that serves document resources and prompts.
    #[serde(default)]
    pub document_server: Option<String>,
    /// JSON resource listing every document id.
    #[serde(default = "d_index_uri")]
    pub document_index_uri: String,
    /// Prefix joined with a document id to read its content.
    #[serde(default = "d_uri_prefix")]
    pub document_uri_prefix: String,
    /// Upper bound on model calls per user query.
    #[serde(default = "d_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            document_server: None,
            document_index_uri: d_index_uri(),
            document_uri_prefix: d_uri_prefix(),
            max_tool_rounds: d_max_tool_rounds(),
        }
    }
}

fn d_index_uri() -> String {
    "docs://documents".into()
}
fn d_uri_prefix() -> String {
    "docs://documents/".into()
}
fn d_max_tool_rounds() -> usize {
    8
}
