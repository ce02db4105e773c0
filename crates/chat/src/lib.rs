//! `mh-chat`: the LLM host built on the MCP client runtime.
//!
//! - [`sampling::SamplingRelay`] answers server sampling requests with the
//!   host's provider.
//! - [`document::DocumentChat`] expands `@doc` mentions and `/prompt doc`
//!   commands against a designated document server.
//! - [`agent::Chat`] drives the model/tool loop over an
//!   [`mh_mcp_client::McpManager`].

pub mod agent;
pub mod bootstrap;
pub mod cli;
pub mod document;
pub mod error;
pub mod sampling;

pub use agent::{Chat, Conversation, PlainConversation};
pub use document::DocumentChat;
pub use error::ChatError;
pub use sampling::{SamplingError, SamplingRelay};
