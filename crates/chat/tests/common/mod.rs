//! Test doubles: an in-memory document/tool MCP server and a scripted LLM
//! provider.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use mh_domain::error::{Error, Result};
use mh_domain::tool::{ContentPart, Message, Role};
use mh_mcp_client::{Connector, McpClient, McpTransport, StdioTransport, TransportError};
use mh_providers::{ChatRequest, ChatResponse, LlmProvider};

// ── Fake MCP server ─────────────────────────────────────────────────

pub type Reply = std::result::Result<Value, (i64, String)>;

/// Serve `handler` over an in-memory pipe until the client hangs up.
pub fn spawn_server<F>(handler: F) -> Arc<StdioTransport>
where
    F: Fn(&str, &Value) -> Reply + Send + Sync + 'static,
{
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client);
    let (server_read, mut server_write) = tokio::io::split(server);

    tokio::spawn(async move {
        let mut lines = BufReader::new(server_read).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let msg: Value = serde_json::from_str(&line).expect("client sent invalid JSON");
            let (Some(id), Some(method)) = (msg.get("id"), msg.get("method").and_then(Value::as_str))
            else {
                continue;
            };
            let reply = if method == "initialize" {
                Ok(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {}, "prompts": {}, "resources": {} },
                    "serverInfo": { "name": "doc-server", "version": "0.0.1" }
                }))
            } else {
                handler(method, &msg["params"])
            };
            let out = match reply {
                Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
                Err((code, message)) => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": code, "message": message }
                }),
            };
            let mut out = out.to_string();
            out.push('\n');
            if server_write.write_all(out.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    Arc::new(StdioTransport::from_streams(client_read, client_write))
}

struct FixedConnector(Mutex<Option<Arc<dyn McpTransport>>>);

#[async_trait]
impl Connector for FixedConnector {
    async fn connect(&self) -> std::result::Result<Arc<dyn McpTransport>, TransportError> {
        self.0.lock().take().ok_or(TransportError::Closed)
    }
}

pub async fn connect(name: &str, transport: Arc<StdioTransport>) -> Arc<McpClient> {
    let transport: Arc<dyn McpTransport> = transport;
    let connector = Arc::new(FixedConnector(Mutex::new(Some(transport))));
    let client = McpClient::new(name, connector);
    client.connect().await.unwrap();
    Arc::new(client)
}

/// Every request the document server received, as `(method, params)`.
pub type Calls = Arc<Mutex<Vec<(String, Value)>>>;

/// A document server holding `docs` (id → content). It offers one prompt,
/// `format_document`, and one tool, `read_doc`.
pub fn doc_server(docs: &[(&str, &str)]) -> (Arc<StdioTransport>, Calls) {
    let docs: Vec<(String, String)> =
        docs.iter().map(|(id, text)| (id.to_string(), text.to_string())).collect();
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let seen = calls.clone();

    let transport = spawn_server(move |method, params| {
        seen.lock().push((method.to_string(), params.clone()));
        match method {
            "resources/read" => {
                let uri = params["uri"].as_str().unwrap_or_default();
                if uri == "docs://documents" {
                    let ids: Vec<&str> = docs.iter().map(|(id, _)| id.as_str()).collect();
                    return Ok(json!({ "contents": [{
                        "uri": uri,
                        "mimeType": "application/json",
                        "text": serde_json::to_string(&ids).unwrap()
                    }]}));
                }
                let id = uri.strip_prefix("docs://documents/").unwrap_or_default();
                match docs.iter().find(|(d, _)| d == id) {
                    Some((_, text)) => Ok(json!({ "contents": [{
                        "uri": uri,
                        "mimeType": "text/plain",
                        "text": text
                    }]})),
                    None => Err((-32602, format!("Doc with id {id} not found"))),
                }
            }
            "prompts/list" => Ok(json!({ "prompts": [{
                "name": "format_document",
                "description": "Rewrites the contents of the document in Markdown format.",
                "arguments": [{ "name": "doc_id", "required": true }]
            }]})),
            "prompts/get" => {
                let name = params["name"].as_str().unwrap_or_default();
                let doc_id = params["arguments"]["doc_id"].as_str().unwrap_or_default();
                Ok(json!({ "messages": [
                    { "role": "user", "content": { "type": "text", "text": format!("{name}: reformat {doc_id}") } },
                    { "role": "assistant", "content": [{ "type": "text", "text": "Sure." }] }
                ]}))
            }
            "tools/list" => Ok(json!({ "tools": [{
                "name": "read_doc",
                "description": "Read a document",
                "inputSchema": { "type": "object", "properties": { "doc_id": { "type": "string" } } }
            }]})),
            "tools/call" => {
                let doc_id = params["arguments"]["doc_id"].as_str().unwrap_or_default();
                match docs.iter().find(|(d, _)| d == doc_id) {
                    Some((_, text)) => Ok(json!({ "content": [{ "type": "text", "text": text }] })),
                    None => Ok(json!({
                        "content": [{ "type": "text", "text": format!("no such doc: {doc_id}") }],
                        "isError": true
                    })),
                }
            }
            other => Err((-32601, format!("Method not found: {other}"))),
        }
    });
    (transport, calls)
}

// ── Scripted provider ───────────────────────────────────────────────

/// Replays canned assistant turns and records every request.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Message>>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Message>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().push(req);
        let message = self
            .replies
            .lock()
            .pop_front()
            .ok_or_else(|| Error::Other("script exhausted".into()))?;
        let finish_reason = if message.tool_calls().is_empty() { "stop" } else { "tool_calls" };
        Ok(ChatResponse {
            message,
            usage: None,
            model: "scripted".into(),
            finish_reason: Some(finish_reason.into()),
        })
    }

    fn provider_id(&self) -> &str {
        "scripted"
    }
}

pub fn tool_use(id: &str, name: &str, input: Value) -> Message {
    Message::parts(
        Role::Assistant,
        vec![
            ContentPart::Text { text: "Let me check.".into() },
            ContentPart::ToolUse { id: id.into(), name: name.into(), input },
        ],
    )
}
