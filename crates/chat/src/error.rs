use mh_mcp_client::McpError;

/// Errors surfaced by the chat layer.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// A slash command that cannot be run (e.g. missing document id).
    /// Nothing is appended to the conversation.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error(transparent)]
    Mcp(#[from] McpError),

    #[error("LLM provider error: {0}")]
    Provider(#[from] mh_domain::error::Error),
}
