//! In-memory MCP server used by the integration tests.
//!
//! The client side is a real [`StdioTransport`] over one end of a
//! `tokio::io::duplex` pipe; the test drives the other end either line by
//! line ([`ServerEnd`]) or through a request handler ([`spawn_server`]).

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};

use mh_mcp_client::{Connector, McpClient, McpTransport, StdioTransport, TransportError};

pub type Reply = Result<Value, (i64, String)>;

pub struct ServerEnd {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl ServerEnd {
    /// Next message from the client, or `None` once it hung up.
    pub async fn try_recv(&mut self) -> Option<Value> {
        let line = self.lines.next_line().await.ok()??;
        Some(serde_json::from_str(&line).expect("client sent invalid JSON"))
    }

    pub async fn recv(&mut self) -> Value {
        self.try_recv().await.expect("client closed the pipe")
    }

    pub async fn send(&mut self, message: Value) {
        let mut line = message.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    pub async fn reply(&mut self, id: &Value, result: Value) {
        self.send(json!({ "jsonrpc": "2.0", "id": id, "result": result })).await;
    }

    pub async fn reply_error(&mut self, id: &Value, code: i64, message: &str) {
        self.send(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": code, "message": message }
        }))
        .await;
    }

    /// Answer `initialize`, wait for `notifications/initialized`, and return
    /// the client's initialize params.
    pub async fn handshake(&mut self) -> Value {
        let req = self.recv().await;
        assert_eq!(req["method"], "initialize");
        self.reply(&req["id"], initialize_result()).await;
        let initialized = self.recv().await;
        assert_eq!(initialized["method"], "notifications/initialized");
        assert!(initialized.get("id").is_none());
        req["params"].clone()
    }
}

pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": { "tools": {}, "prompts": {}, "resources": {} },
        "serverInfo": { "name": "fake-server", "version": "0.0.1" }
    })
}

pub fn pipe() -> (Arc<StdioTransport>, ServerEnd) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client);
    let (server_read, server_write) = tokio::io::split(server);
    let transport = Arc::new(StdioTransport::from_streams(client_read, client_write));
    let end = ServerEnd {
        lines: BufReader::new(server_read).lines(),
        writer: server_write,
    };
    (transport, end)
}

/// Serve requests with `handler` until the client hangs up. `initialize`
/// is answered automatically; notifications are ignored.
pub fn spawn_server<F>(handler: F) -> Arc<StdioTransport>
where
    F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
{
    let (transport, mut end) = pipe();
    tokio::spawn(async move {
        while let Some(msg) = end.try_recv().await {
            let (Some(id), Some(method)) = (msg.get("id"), msg.get("method").and_then(Value::as_str))
            else {
                continue;
            };
            let reply = if method == "initialize" {
                Ok(initialize_result())
            } else {
                handler(method, &msg["params"])
            };
            match reply {
                Ok(result) => end.reply(id, result).await,
                Err((code, message)) => end.reply_error(id, code, &message).await,
            }
        }
    });
    transport
}

/// A server exposing `tools`. Each call echoes `"<name>:<arguments>"`; a tool
/// named `fails` reports a tool-level error.
pub fn tool_server(tools: &[&str]) -> Arc<StdioTransport> {
    let tools: Vec<String> = tools.iter().map(|t| t.to_string()).collect();
    spawn_server(move |method, params| match method {
        "tools/list" => Ok(json!({
            "tools": tools.iter().map(|t| json!({
                "name": t,
                "description": format!("the {t} tool"),
                "inputSchema": { "type": "object", "properties": {} }
            })).collect::<Vec<_>>()
        })),
        "tools/call" => {
            let name = params["name"].as_str().unwrap_or_default();
            let text = format!("{name}:{}", params["arguments"]);
            Ok(json!({
                "content": [{ "type": "text", "text": text }],
                "isError": name == "fails"
            }))
        }
        other => Err((-32601, format!("Method not found: {other}"))),
    })
}

/// Hands out one prepared transport; later connects fail.
pub struct FixedConnector {
    transport: parking_lot::Mutex<Option<Arc<dyn McpTransport>>>,
}

impl FixedConnector {
    pub fn new(transport: Arc<dyn McpTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport: parking_lot::Mutex::new(Some(transport)),
        })
    }
}

#[async_trait]
impl Connector for FixedConnector {
    async fn connect(&self) -> Result<Arc<dyn McpTransport>, TransportError> {
        self.transport.lock().take().ok_or(TransportError::Closed)
    }
}

/// Wraps a transport and counts `shutdown` calls.
pub struct CountingTransport {
    inner: Arc<dyn McpTransport>,
    pub shutdowns: AtomicUsize,
}

impl CountingTransport {
    pub fn new(inner: Arc<dyn McpTransport>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            shutdowns: AtomicUsize::new(0),
        })
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl McpTransport for CountingTransport {
    async fn send(&self, line: &str) -> Result<(), TransportError> {
        self.inner.send(line).await
    }

    async fn receive(&self) -> Result<String, TransportError> {
        self.inner.receive().await
    }

    fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.inner.shutdown().await;
    }
}

/// A client named `name` that will connect to `transport`.
pub fn client_on(name: &str, transport: Arc<dyn McpTransport>) -> McpClient {
    McpClient::new(name, FixedConnector::new(transport))
}

/// A connected client backed by [`tool_server`].
pub async fn connected_tool_client(name: &str, tools: &[&str]) -> Arc<McpClient> {
    let client = client_on(name, tool_server(tools));
    client.connect().await.unwrap();
    Arc::new(client)
}
