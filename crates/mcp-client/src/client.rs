//! A named client for one MCP server.
//!
//! The client pairs a [`Connector`] with the roots it offers and owns at most
//! one [`Session`]. Operations before `connect` fail with
//! [`McpError::Connection`]; `cleanup` releases everything and may be called
//! repeatedly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;

use mh_domain::config::McpServerConfig;

use crate::error::McpError;
use crate::handlers::{ProgressSink, RootsProvider, SessionHandlers};
use crate::protocol::{
    LoggingLevel, McpToolDef, PromptDef, PromptMessage, ResourceDef, ResourceValue, ToolCallResult,
};
use crate::roots::{Root, StaticRoots};
use crate::session::Session;
use crate::transport::{Connector, StdioConnector};

pub struct McpClient {
    name: String,
    connector: Arc<dyn Connector>,
    /// `None` means the client does not support roots.
    roots: Option<Vec<Root>>,
    handlers: SessionHandlers,
    request_timeout: Option<Duration>,
    session: RwLock<Option<Arc<Session>>>,
}

impl McpClient {
    pub fn new(name: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            name: name.into(),
            connector,
            roots: None,
            handlers: SessionHandlers::default(),
            request_timeout: None,
            session: RwLock::new(None),
        }
    }

    /// Build a stdio client from a server entry, resolving its roots.
    pub fn from_config(config: &McpServerConfig) -> Result<Self, McpError> {
        let mut client = Self::new(config.id.clone(), Arc::new(StdioConnector::new(config.clone())));
        if let Some(paths) = &config.roots {
            let roots = paths
                .iter()
                .map(|p| {
                    Root::from_path(p).map_err(|e| {
                        McpError::Config(format!("server '{}': invalid root '{p}': {e}", config.id))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            client = client.with_roots(roots);
        }
        Ok(client)
    }

    pub fn with_roots(mut self, roots: Vec<Root>) -> Self {
        self.roots = Some(roots);
        self
    }

    /// Sampling, logging and progress handlers for the session. The roots
    /// entry is always derived from [`McpClient::with_roots`].
    pub fn with_handlers(mut self, handlers: SessionHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roots(&self) -> Option<&[Root]> {
        self.roots.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.session.read().is_some()
    }

    /// Spawn the server and complete the handshake.
    ///
    /// A roots handler is installed only when the client declares roots. On
    /// failure anything partially acquired is released before returning.
    pub async fn connect(&self) -> Result<(), McpError> {
        if self.is_connected() {
            return Err(McpError::Connection(format!(
                "client '{}' is already connected",
                self.name
            )));
        }

        let mut handlers = self.handlers.clone();
        handlers.roots = self
            .roots
            .clone()
            .map(|roots| Arc::new(StaticRoots::new(roots)) as Arc<dyn RootsProvider>);

        let session = Arc::new(
            Session::new(self.name.clone(), handlers).with_request_timeout(self.request_timeout),
        );
        if let Err(e) = session.connect(self.connector.as_ref()).await {
            session.close().await;
            tracing::warn!(server_id = %self.name, error = %e, "MCP connect failed");
            return Err(e);
        }
        let raced = {
            let mut slot = self.session.write();
            if slot.is_some() {
                true
            } else {
                *slot = Some(session.clone());
                false
            }
        };
        if raced {
            session.close().await;
            return Err(McpError::Connection(format!(
                "client '{}' is already connected",
                self.name
            )));
        }
        Ok(())
    }

    /// The live session. Fails if `connect` has not succeeded.
    pub fn session(&self) -> Result<Arc<Session>, McpError> {
        self.session.read().clone().ok_or_else(|| {
            McpError::Connection(format!(
                "client '{}' is not connected; call connect first",
                self.name
            ))
        })
    }

    /// Close the session and release the server. Idempotent.
    pub async fn cleanup(&self) {
        let session = self.session.write().take();
        if let Some(session) = session {
            session.close().await;
        }
    }

    /// Connect, run `f`, then clean up whether `f` succeeded or not.
    pub async fn scoped<'a, T, F>(&'a self, f: F) -> Result<T, McpError>
    where
        F: FnOnce(&'a McpClient) -> BoxFuture<'a, Result<T, McpError>>,
    {
        self.connect().await?;
        let outcome = f(self).await;
        self.cleanup().await;
        outcome
    }

    // ── Operations ─────────────────────────────────────────────────

    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError> {
        self.session()?.list_tools().await
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        self.session()?.call_tool(name, arguments).await
    }

    pub async fn call_tool_with_progress(
        &self,
        name: &str,
        arguments: Value,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<ToolCallResult, McpError> {
        self.session()?
            .call_tool_with_progress(name, arguments, sink)
            .await
    }

    pub async fn list_prompts(&self) -> Result<Vec<PromptDef>, McpError> {
        self.session()?.list_prompts().await
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        self.session()?.get_prompt(name, arguments).await
    }

    pub async fn list_resources(&self) -> Result<Vec<ResourceDef>, McpError> {
        self.session()?.list_resources().await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Option<ResourceValue>, McpError> {
        self.session()?.read_resource(uri).await
    }

    pub async fn set_logging_level(&self, level: LoggingLevel) -> Result<(), McpError> {
        self.session()?.set_logging_level(level).await
    }

    pub async fn ping(&self) -> Result<(), McpError> {
        self.session()?.ping().await
    }
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("name", &self.name)
            .field("roots", &self.roots)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(id: &str, roots: Option<Vec<String>>) -> McpServerConfig {
        McpServerConfig {
            id: id.into(),
            command: "uv".into(),
            args: vec!["run".into(), "mcp_server.py".into()],
            env: Default::default(),
            roots,
        }
    }

    #[test]
    fn from_config_without_roots() {
        let client = McpClient::from_config(&server("docs", None)).unwrap();
        assert_eq!(client.name(), "docs");
        assert!(client.roots().is_none());
        assert!(!client.is_connected());
    }

    #[test]
    fn from_config_resolves_roots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().into_owned();
        let client = McpClient::from_config(&server("videos", Some(vec![path]))).unwrap();
        let roots = client.roots().unwrap();
        assert_eq!(roots.len(), 1);
        assert!(roots[0].uri().starts_with("file://"));
    }

    #[tokio::test]
    async fn operations_before_connect_fail() {
        let client = McpClient::from_config(&server("docs", None)).unwrap();
        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, McpError::Connection(_)));
        assert!(err.to_string().contains("call connect first"));
    }

    #[tokio::test]
    async fn cleanup_before_connect_is_noop() {
        let client = McpClient::from_config(&server("docs", None)).unwrap();
        client.cleanup().await;
        client.cleanup().await;
        assert!(!client.is_connected());
    }
}
