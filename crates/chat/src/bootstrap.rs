//! Runtime construction shared by every CLI command.

use std::sync::Arc;

use anyhow::Context;

use mh_domain::config::Config;
use mh_mcp_client::protocol::{LoggingLevel, LoggingMessageParams, ProgressParams};
use mh_mcp_client::{McpManager, SessionHandlers};
use mh_providers::{AnthropicProvider, LlmProvider};

use crate::agent::Chat;
use crate::document::DocumentChat;
use crate::sampling::SamplingRelay;

/// Everything a command needs once the config is loaded.
pub struct Runtime {
    pub config: Config,
    pub provider: Option<Arc<dyn LlmProvider>>,
    pub manager: Arc<McpManager>,
}

impl Runtime {
    /// Validate `config`, then connect every MCP server.
    ///
    /// `provider` serves both the chat loop and server sampling requests;
    /// without one, sampling is not advertised to servers.
    pub async fn start(
        config: Config,
        provider: Option<Arc<dyn LlmProvider>>,
    ) -> anyhow::Result<Self> {
        config.validate().context("config validation failed")?;

        // ── MCP servers ──────────────────────────────────────────────────
        let handlers = session_handlers(provider.clone());
        let manager = if config.mcp.servers.is_empty() {
            tracing::info!("no MCP servers configured");
            McpManager::empty()
        } else {
            tracing::info!(count = config.mcp.servers.len(), "initializing MCP servers");
            McpManager::from_config(&config.mcp, handlers).await
        };

        Ok(Self {
            config,
            provider,
            manager: Arc::new(manager),
        })
    }

    /// The document chat for the configured document server, if any.
    pub fn document_chat(&self) -> anyhow::Result<Option<DocumentChat>> {
        let Some(server) = &self.config.chat.document_server else {
            return Ok(None);
        };
        let client = self
            .manager
            .require(server)
            .with_context(|| format!("document server '{server}' did not start"))?;
        Ok(Some(DocumentChat::from_config(client.clone(), &self.config.chat)))
    }

    /// A chat loop wired to this runtime's provider and MCP servers.
    pub fn chat(&self, model: Option<String>) -> anyhow::Result<Chat> {
        let provider = self
            .provider
            .clone()
            .context("no LLM provider available; set the API key environment variable")?;
        let mut chat = Chat::new(provider, self.manager.clone())
            .with_max_tool_rounds(self.config.chat.max_tool_rounds)
            .with_model(model);
        if let Some(documents) = self.document_chat()? {
            chat = chat.with_conversation(documents);
        }
        Ok(chat)
    }

    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }
}

/// Build the configured LLM provider.
pub fn build_provider(config: &Config) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let provider = AnthropicProvider::from_config(&config.llm.provider)
        .context("initializing LLM provider")?;
    tracing::info!(provider = %config.llm.provider.id, "LLM provider ready");
    Ok(Arc::new(provider))
}

/// Handlers installed on every MCP session: sampling through `provider`,
/// server log messages and progress into our own tracing output.
pub fn session_handlers(provider: Option<Arc<dyn LlmProvider>>) -> SessionHandlers {
    let mut handlers = SessionHandlers::default()
        .with_logging(Arc::new(log_server_message))
        .with_progress(Arc::new(log_progress));
    if let Some(provider) = provider {
        handlers = handlers.with_sampling(Arc::new(SamplingRelay::new(provider)));
    }
    handlers
}

fn log_server_message(params: LoggingMessageParams) {
    let logger = params.logger.as_deref().unwrap_or("mcp");
    match params.level {
        LoggingLevel::Debug => tracing::debug!(logger, data = %params.data, "server log"),
        LoggingLevel::Info | LoggingLevel::Notice => {
            tracing::info!(logger, data = %params.data, "server log")
        }
        LoggingLevel::Warning => tracing::warn!(logger, data = %params.data, "server log"),
        _ => tracing::error!(logger, data = %params.data, "server log"),
    }
}

fn log_progress(params: ProgressParams) {
    tracing::info!(
        token = %params.progress_token,
        progress = params.progress,
        total = ?params.total,
        message = params.message.as_deref().unwrap_or(""),
        "tool progress"
    );
}
