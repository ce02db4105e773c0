//! Callbacks for server-initiated traffic.
//!
//! A session routes inbound `roots/list` and `sampling/createMessage`
//! requests, and `notifications/message` / `notifications/progress`, to the
//! handlers installed here. Missing handlers are not an error: the session
//! answers with a JSON-RPC error object or drops the notification.

use std::sync::Arc;

use async_trait::async_trait;

use crate::protocol::{
    ClientCapabilities, CreateMessageParams, CreateMessageResult, LoggingMessageParams,
    ProgressParams, RootsCapability,
};
use crate::roots::Root;

/// Error type returned by a sampling handler; reported to the server as an
/// internal JSON-RPC error.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub trait RootsProvider: Send + Sync {
    fn list_roots(&self) -> Vec<Root>;
}

/// Fulfills `sampling/createMessage` requests.
#[async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(
        &self,
        params: CreateMessageParams,
    ) -> Result<CreateMessageResult, HandlerError>;
}

/// Receives `notifications/message`. Called on the reader task, so it must
/// not block.
pub trait LogSink: Send + Sync {
    fn on_log(&self, params: LoggingMessageParams);
}

/// Receives `notifications/progress`. Called on the reader task, so it must
/// not block.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, params: ProgressParams);
}

impl<F> LogSink for F
where
    F: Fn(LoggingMessageParams) + Send + Sync,
{
    fn on_log(&self, params: LoggingMessageParams) {
        self(params)
    }
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressParams) + Send + Sync,
{
    fn on_progress(&self, params: ProgressParams) {
        self(params)
    }
}

/// The handler table a session is built with.
#[derive(Clone, Default)]
pub struct SessionHandlers {
    pub roots: Option<Arc<dyn RootsProvider>>,
    pub sampling: Option<Arc<dyn SamplingHandler>>,
    pub logging: Option<Arc<dyn LogSink>>,
    /// Fallback for progress tokens not claimed by a specific call.
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl SessionHandlers {
    pub fn with_roots(mut self, roots: Arc<dyn RootsProvider>) -> Self {
        self.roots = Some(roots);
        self
    }

    pub fn with_sampling(mut self, sampling: Arc<dyn SamplingHandler>) -> Self {
        self.sampling = Some(sampling);
        self
    }

    pub fn with_logging(mut self, logging: Arc<dyn LogSink>) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Capabilities to advertise in `initialize`.
    pub fn capabilities(&self) -> ClientCapabilities {
        ClientCapabilities {
            roots: self.roots.as_ref().map(|_| RootsCapability::default()),
            sampling: self.sampling.as_ref().map(|_| serde_json::json!({})),
        }
    }
}

impl std::fmt::Debug for SessionHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandlers")
            .field("roots", &self.roots.is_some())
            .field("sampling", &self.sampling.is_some())
            .field("logging", &self.logging.is_some())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}
