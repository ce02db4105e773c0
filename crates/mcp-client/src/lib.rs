//! `mh-mcp-client`: MCP (Model Context Protocol) client runtime.
//!
//! This crate provides:
//! - JSON-RPC 2.0 protocol types for communicating with MCP servers.
//! - A stdio transport that spawns child processes and exchanges
//!   newline-delimited JSON over stdin/stdout.
//! - A [`Session`] that correlates requests with responses and routes
//!   server-initiated requests (roots, sampling) and notifications.
//! - An [`McpClient`] per server, and an [`McpManager`] that keeps clients
//!   in registration order and dispatches tool calls to their owners.
//!
//! # Usage
//!
//! ```rust,ignore
//! use mh_mcp_client::{McpManager, SessionHandlers};
//!
//! let manager = McpManager::from_config(&config.mcp, SessionHandlers::default()).await;
//! let tools = manager.aggregate_tools().await?;
//! let results = manager.execute_tool_requests(&assistant_turn).await;
//! manager.shutdown().await;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod protocol;
pub mod roots;
pub mod session;
pub mod transport;

// Re-exports for convenience.
pub use client::McpClient;
pub use config::{McpConfig, McpServerConfig};
pub use error::McpError;
pub use handlers::{HandlerError, LogSink, ProgressSink, RootsProvider, SamplingHandler, SessionHandlers};
pub use manager::{McpManager, ToolResultBlock};
pub use protocol::{McpToolDef, ResourceValue};
pub use roots::Root;
pub use session::{Session, SessionState};
pub use transport::{Connector, McpTransport, StdioConnector, StdioTransport, TransportError};
