//! MCP transport layer.
//!
//! A transport moves newline-delimited JSON lines between the client and one
//! server. It knows nothing about ids or methods; correlation happens in the
//! session. The stdio transport spawns the server as a child process; the
//! same line framing also runs over any in-memory stream pair.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::Mutex;

use mh_domain::config::McpServerConfig;

/// Trait for MCP server transports.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Write one JSON message as a single line.
    async fn send(&self, line: &str) -> Result<(), TransportError>;

    /// Read the next JSON line. Returns [`TransportError::ProcessExited`]
    /// once the peer has closed its side.
    async fn receive(&self) -> Result<String, TransportError>;

    /// Check if the transport is still alive.
    fn is_alive(&self) -> bool;

    /// Shut down the transport gracefully.
    async fn shutdown(&self);
}

/// Produces a fresh transport each time a session connects.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn McpTransport>, TransportError>;
}

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MCP server process has exited")]
    ProcessExited,

    #[error("timeout waiting for response")]
    Timeout,

    #[error("connection closed before a response arrived")]
    Closed,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stdio transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Maximum number of non-JSON lines to skip before declaring the server broken.
const MAX_SKIP_LINES: usize = 1000;

/// Grace period between closing stdin and killing the child.
const EXIT_GRACE: tokio::time::Duration = tokio::time::Duration::from_secs(5);

type LineReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type LineWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Line-framed transport: a child process's stdin/stdout, or any stream pair.
pub struct StdioTransport {
    writer: Mutex<LineWriter>,
    reader: Mutex<LineReader>,
    child: Mutex<Option<Child>>,
    alive: AtomicBool,
}

impl StdioTransport {
    /// Spawn a child process from the given server config.
    ///
    /// The child's stderr is drained into the log at debug level so a
    /// chatty server cannot fill the pipe and stall.
    pub fn spawn(config: &McpServerConfig) -> Result<Self, TransportError> {
        let mut cmd = tokio::process::Command::new(&config.command);
        cmd.args(&config.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "failed to capture child stdin",
            ))
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "failed to capture child stdout",
            ))
        })?;

        if let Some(stderr) = child.stderr.take() {
            let server_id = config.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(server_id = %server_id, line = %line, "MCP server stderr");
                }
            });
        }

        tracing::debug!(
            server_id = %config.id,
            command = %config.command,
            pid = ?child.id(),
            "spawned MCP server process"
        );

        let mut transport = Self::from_streams(stdout, stdin);
        transport.child = Mutex::new(Some(child));
        Ok(transport)
    }

    /// Wrap an arbitrary read/write pair (e.g. one end of `tokio::io::duplex`).
    pub fn from_streams<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        Self {
            writer: Mutex::new(Box::new(writer)),
            reader: Mutex::new(BufReader::new(reader)),
            child: Mutex::new(None),
            alive: AtomicBool::new(true),
        }
    }

    /// Write a line of JSON to stdin.
    async fn write_line(&self, json: &str) -> Result<(), TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::ProcessExited);
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read a line of JSON from stdout, skipping any empty or non-JSON lines.
    ///
    /// Gives up after [`MAX_SKIP_LINES`] non-JSON lines to prevent spinning
    /// on a misconfigured server that writes logging to stdout.
    async fn read_line(&self) -> Result<String, TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::ProcessExited);
        }

        let mut reader = self.reader.lock().await;
        let mut skipped = 0usize;
        loop {
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                self.alive.store(false, Ordering::SeqCst);
                return Err(TransportError::ProcessExited);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('{') {
                return Ok(trimmed.to_string());
            }
            skipped += 1;
            if skipped >= MAX_SKIP_LINES {
                self.alive.store(false, Ordering::SeqCst);
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "MCP server produced too many non-JSON lines on stdout",
                )));
            }
            tracing::debug!(line = %trimmed, "skipping non-JSON line from MCP server stdout");
        }
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn send(&self, line: &str) -> Result<(), TransportError> {
        self.write_line(line).await
    }

    async fn receive(&self) -> Result<String, TransportError> {
        self.read_line().await
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        // Close stdin to signal the process to exit.
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(error = %e, "error closing MCP server stdin");
            }
        }

        let mut child = self.child.lock().await;
        let Some(child) = child.as_mut() else {
            return;
        };

        // Give the process a moment to exit gracefully.
        match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(?status, "MCP server process exited");
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "error waiting for MCP server process");
            }
            Err(_) => {
                tracing::warn!("MCP server process did not exit within timeout, killing");
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill MCP server process");
                }
            }
        }
    }
}

/// Spawns the configured command as a stdio server on every connect.
#[derive(Debug, Clone)]
pub struct StdioConnector {
    config: McpServerConfig,
}

impl StdioConnector {
    pub fn new(config: McpServerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for StdioConnector {
    async fn connect(&self) -> Result<Arc<dyn McpTransport>, TransportError> {
        let transport = StdioTransport::spawn(&self.config)?;
        Ok(Arc::new(transport))
    }
}
