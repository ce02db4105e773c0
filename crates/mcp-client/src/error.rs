use crate::protocol::JsonRpcError;
use crate::transport::TransportError;

/// Errors that can occur when talking to MCP servers.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("MCP transport error: {0}")]
    Transport(#[from] TransportError),

    /// Spawn or handshake failure, or use of a session that is not ready.
    #[error("MCP connection error: {0}")]
    Connection(String),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    /// The server answered with a JSON-RPC error object.
    #[error("MCP protocol error: {method} failed: {error}")]
    Rpc { method: String, error: JsonRpcError },

    #[error("MCP server not found: {0}")]
    ServerNotFound(String),

    #[error("MCP config error: {0}")]
    Config(String),
}
