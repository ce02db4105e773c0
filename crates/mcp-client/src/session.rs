//! One live protocol session with an MCP server.
//!
//! The session owns the transport once connected and runs a reader task that
//! demultiplexes every inbound line:
//! - responses complete the matching pending request by id,
//! - server-initiated requests are answered on their own task so a slow
//!   sampling call never stalls the reader,
//! - notifications go to the log/progress sinks.
//!
//! Lifecycle: `Unconnected -> Initializing -> Ready -> Closed`. `Closed` is
//! terminal and [`Session::close`] is idempotent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::McpError;
use crate::handlers::{ProgressSink, SessionHandlers};
use crate::protocol::{
    initialize_params, CreateMessageParams, GetPromptResult, Incoming, InitializeResult,
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListRootsResult,
    LoggingLevel, LoggingMessageParams, McpToolDef, ProgressParams, PromptDef, PromptMessage,
    PromptsListResult, ReadResourceResult, RequestId, ResourceDef, ResourceValue,
    ResourcesListResult, ToolCallResult, ToolsListResult, INTERNAL_ERROR, INVALID_PARAMS,
    INVALID_REQUEST,
};
use crate::transport::{Connector, McpTransport, TransportError};

/// Upper bound on pages fetched by one paginated list call.
const MAX_PAGES: usize = 100;

const JSON_MIME: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Initializing,
    Ready,
    Closed,
}

// ── Pending requests ───────────────────────────────────────────────

#[derive(Default)]
struct PendingState {
    waiters: HashMap<u64, oneshot::Sender<JsonRpcResponse>>,
    closed: bool,
}

/// Requests awaiting a response, keyed by our numeric id.
#[derive(Default)]
struct Pending {
    state: Mutex<PendingState>,
}

impl Pending {
    fn register(&self, id: u64) -> Result<oneshot::Receiver<JsonRpcResponse>, TransportError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.insert(id, tx);
        Ok(rx)
    }

    fn forget(&self, id: u64) {
        self.state.lock().waiters.remove(&id);
    }

    fn complete(&self, response: JsonRpcResponse) {
        let RequestId::Number(id) = response.id else {
            tracing::debug!(id = %response.id, "response with non-numeric id, dropping");
            return;
        };
        let waiter = self.state.lock().waiters.remove(&id);
        match waiter {
            // The caller may have timed out and gone away.
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => tracing::debug!(id, "response for unknown request id, dropping"),
        }
    }

    /// Fail every outstanding request and refuse new ones.
    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.waiters.clear();
    }

    fn len(&self) -> usize {
        self.state.lock().waiters.len()
    }
}

/// Drops a request's waiter when its caller stops waiting, whether it got an
/// answer, hit the session deadline, or had its future dropped.
struct PendingGuard<'a> {
    pending: &'a Pending,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.forget(self.id);
    }
}

type ProgressRoutes = Mutex<HashMap<RequestId, Arc<dyn ProgressSink>>>;

/// Removes a per-call progress route when the call ends or is abandoned.
struct ProgressRoute<'a> {
    routes: &'a ProgressRoutes,
    token: RequestId,
}

impl Drop for ProgressRoute<'_> {
    fn drop(&mut self) {
        self.routes.lock().remove(&self.token);
    }
}

// ── Link ───────────────────────────────────────────────────────────

/// Everything that exists only while a transport is attached.
struct Link {
    transport: Arc<dyn McpTransport>,
    pending: Arc<Pending>,
    progress: Arc<ProgressRoutes>,
    next_id: AtomicU64,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Link {
    fn new(transport: Arc<dyn McpTransport>) -> Self {
        Self {
            transport,
            pending: Arc::new(Pending::default()),
            progress: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            reader: Mutex::new(None),
        }
    }

    fn start_reader(&self, server_id: String, handlers: Arc<SessionHandlers>) {
        let task = tokio::spawn(read_loop(
            server_id,
            self.transport.clone(),
            self.pending.clone(),
            self.progress.clone(),
            handlers,
        ));
        *self.reader.lock() = Some(task);
    }

    fn reserve_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<JsonRpcResponse, TransportError> {
        let id = self.reserve_id();
        self.request_with_id(id, method, params, timeout).await
    }

    async fn request_with_id(
        &self,
        id: u64,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<JsonRpcResponse, TransportError> {
        let rx = self.pending.register(id)?;
        let _waiter = PendingGuard {
            pending: &self.pending,
            id,
        };
        let req = JsonRpcRequest::new(RequestId::Number(id), method, params);
        let line = serde_json::to_string(&req)?;

        tracing::debug!(id, method, "sending MCP request");
        self.transport.send(&line).await?;

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(id, method, ?limit, "MCP request timed out");
                    return Err(TransportError::Timeout);
                }
            },
            None => rx.await,
        };
        // A dropped sender means the reader stopped or the session closed.
        outcome.map_err(|_| TransportError::Closed)
    }

    async fn notify(&self, notification: JsonRpcNotification) -> Result<(), TransportError> {
        let line = serde_json::to_string(&notification)?;
        tracing::debug!(method = %notification.method, "sending MCP notification");
        self.transport.send(&line).await
    }

    async fn shutdown(&self) {
        self.pending.close();
        self.progress.lock().clear();
        self.transport.shutdown().await;
        if let Some(task) = self.reader.lock().take() {
            task.abort();
        }
    }
}

// ── Reader task ────────────────────────────────────────────────────

async fn read_loop(
    server_id: String,
    transport: Arc<dyn McpTransport>,
    pending: Arc<Pending>,
    progress: Arc<ProgressRoutes>,
    handlers: Arc<SessionHandlers>,
) {
    loop {
        let line = match transport.receive().await {
            Ok(line) => line,
            Err(TransportError::ProcessExited) => {
                tracing::debug!(server_id = %server_id, "MCP server closed its output");
                break;
            }
            Err(e) => {
                tracing::warn!(server_id = %server_id, error = %e, "MCP read failed");
                break;
            }
        };

        let message = match Incoming::parse(&line) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(server_id = %server_id, error = %e, "skipping malformed MCP message");
                continue;
            }
        };

        match message {
            Incoming::Response(response) => pending.complete(response),
            Incoming::Request(request) => {
                let transport = transport.clone();
                let handlers = handlers.clone();
                let server_id = server_id.clone();
                tokio::spawn(async move {
                    let response = answer_request(&server_id, &handlers, request).await;
                    let sent = match serde_json::to_string(&response) {
                        Ok(line) => transport.send(&line).await,
                        Err(e) => Err(e.into()),
                    };
                    if let Err(e) = sent {
                        tracing::warn!(server_id = %server_id, error = %e, "failed to answer MCP server request");
                    }
                });
            }
            Incoming::Notification(notification) => {
                route_notification(&server_id, &handlers, &progress, notification)
            }
        }
    }

    pending.close();
}

async fn answer_request(
    server_id: &str,
    handlers: &SessionHandlers,
    request: JsonRpcRequest,
) -> JsonRpcResponse {
    let id = request.id;
    tracing::debug!(server_id, id = %id, method = %request.method, "MCP server request");

    match request.method.as_str() {
        "ping" => JsonRpcResponse::success(id, json!({})),
        "roots/list" => match &handlers.roots {
            Some(provider) => {
                let result = ListRootsResult {
                    roots: provider.list_roots(),
                };
                match serde_json::to_value(result) {
                    Ok(v) => JsonRpcResponse::success(id, v),
                    Err(e) => JsonRpcResponse::failure(id, JsonRpcError::new(INTERNAL_ERROR, e.to_string())),
                }
            }
            None => JsonRpcResponse::failure(
                id,
                JsonRpcError::new(INVALID_REQUEST, "List roots not supported"),
            ),
        },
        "sampling/createMessage" => {
            let Some(sampler) = &handlers.sampling else {
                return JsonRpcResponse::failure(
                    id,
                    JsonRpcError::new(INVALID_REQUEST, "Sampling not supported"),
                );
            };
            let params: CreateMessageParams =
                match serde_json::from_value(request.params.unwrap_or(Value::Null)) {
                    Ok(p) => p,
                    Err(e) => {
                        return JsonRpcResponse::failure(
                            id,
                            JsonRpcError::new(INVALID_PARAMS, format!("invalid sampling params: {e}")),
                        )
                    }
                };
            match sampler.create_message(params).await {
                Ok(result) => match serde_json::to_value(result) {
                    Ok(v) => JsonRpcResponse::success(id, v),
                    Err(e) => JsonRpcResponse::failure(id, JsonRpcError::new(INTERNAL_ERROR, e.to_string())),
                },
                Err(e) => {
                    tracing::warn!(server_id, error = %e, "sampling request failed");
                    JsonRpcResponse::failure(id, JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
                }
            }
        }
        other => JsonRpcResponse::failure(id, JsonRpcError::method_not_found(other)),
    }
}

fn route_notification(
    server_id: &str,
    handlers: &SessionHandlers,
    progress: &ProgressRoutes,
    notification: JsonRpcNotification,
) {
    let params = notification.params.unwrap_or(Value::Null);
    match notification.method.as_str() {
        "notifications/message" => match serde_json::from_value::<LoggingMessageParams>(params) {
            Ok(p) => match &handlers.logging {
                Some(sink) => sink.on_log(p),
                None => tracing::debug!(server_id, level = ?p.level, data = %p.data, "MCP server log"),
            },
            Err(e) => tracing::debug!(server_id, error = %e, "malformed log notification"),
        },
        "notifications/progress" => match serde_json::from_value::<ProgressParams>(params) {
            Ok(p) => {
                let routed = progress.lock().get(&p.progress_token).cloned();
                match routed.or_else(|| handlers.progress.clone()) {
                    Some(sink) => sink.on_progress(p),
                    None => tracing::debug!(server_id, token = %p.progress_token, progress = p.progress, "unrouted MCP progress"),
                }
            }
            Err(e) => tracing::debug!(server_id, error = %e, "malformed progress notification"),
        },
        other => tracing::debug!(server_id, method = other, "ignoring MCP notification"),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A protocol session bound to one server.
pub struct Session {
    server_id: String,
    handlers: Arc<SessionHandlers>,
    request_timeout: Option<Duration>,
    state: Mutex<SessionState>,
    link: Mutex<Option<Arc<Link>>>,
    server_info: Mutex<Option<InitializeResult>>,
}

impl Session {
    pub fn new(server_id: impl Into<String>, handlers: SessionHandlers) -> Self {
        Self {
            server_id: server_id.into(),
            handlers: Arc::new(handlers),
            request_timeout: None,
            state: Mutex::new(SessionState::Unconnected),
            link: Mutex::new(None),
            server_info: Mutex::new(None),
        }
    }

    /// Deadline for each request issued by this session. `None` waits forever.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Requests sent on the current transport that still await an answer.
    pub fn in_flight(&self) -> usize {
        self.link.lock().as_ref().map_or(0, |link| link.pending.len())
    }

    /// Calls with a live per-call progress route.
    pub fn progress_routes(&self) -> usize {
        self.link
            .lock()
            .as_ref()
            .map_or(0, |link| link.progress.lock().len())
    }

    /// The server's `initialize` answer, once the session is ready.
    pub fn server_info(&self) -> Option<InitializeResult> {
        self.server_info.lock().clone()
    }

    /// Acquire a transport and perform the MCP handshake.
    ///
    /// Only valid from `Unconnected`. On failure the session is left in
    /// `Initializing` holding whatever it acquired; callers release it with
    /// [`Session::close`].
    pub async fn connect(&self, connector: &dyn Connector) -> Result<(), McpError> {
        {
            let mut state = self.state.lock();
            if *state != SessionState::Unconnected {
                return Err(McpError::Connection(format!(
                    "session '{}' cannot connect from state {:?}",
                    self.server_id, *state
                )));
            }
            *state = SessionState::Initializing;
        }

        let transport = connector.connect().await.map_err(|e| {
            McpError::Connection(format!("failed to start MCP server '{}': {e}", self.server_id))
        })?;

        let link = Arc::new(Link::new(transport));
        link.start_reader(self.server_id.clone(), self.handlers.clone());
        let closed_meanwhile = {
            let state = self.state.lock();
            if *state == SessionState::Closed {
                true
            } else {
                *self.link.lock() = Some(link.clone());
                false
            }
        };
        if closed_meanwhile {
            link.shutdown().await;
            return Err(McpError::Connection(format!(
                "session '{}' was closed while connecting",
                self.server_id
            )));
        }

        let info = self.handshake(&link).await.map_err(|e| {
            McpError::Connection(format!("handshake with MCP server '{}' failed: {e}", self.server_id))
        })?;

        {
            let mut state = self.state.lock();
            if *state != SessionState::Initializing {
                return Err(McpError::Connection(format!(
                    "session '{}' was closed during the handshake",
                    self.server_id
                )));
            }
            *state = SessionState::Ready;
        }

        tracing::info!(
            server_id = %self.server_id,
            protocol = %info.protocol_version,
            server = ?info.server_info.as_ref().map(|s| s.name.as_str()),
            "MCP session ready"
        );
        *self.server_info.lock() = Some(info);
        Ok(())
    }

    async fn handshake(&self, link: &Link) -> Result<InitializeResult, McpError> {
        let params = serde_json::to_value(initialize_params(self.handlers.capabilities()))
            .map_err(TransportError::from)?;
        let response = link
            .request("initialize", Some(params), self.request_timeout)
            .await?;
        let value = response.into_result().map_err(|error| McpError::Rpc {
            method: "initialize".into(),
            error,
        })?;
        let info: InitializeResult = decode("initialize", value)?;
        link.notify(JsonRpcNotification::new("notifications/initialized"))
            .await?;
        Ok(info)
    }

    /// Release the transport and fail any in-flight requests.
    ///
    /// Safe to call in any state and any number of times; the transport is
    /// shut down at most once.
    pub async fn close(&self) {
        let link = {
            let mut state = self.state.lock();
            *state = SessionState::Closed;
            self.link.lock().take()
        };
        if let Some(link) = link {
            link.shutdown().await;
            tracing::debug!(server_id = %self.server_id, "MCP session closed");
        }
    }

    fn ready_link(&self) -> Result<Arc<Link>, McpError> {
        let state = *self.state.lock();
        if state != SessionState::Ready {
            return Err(McpError::Connection(format!(
                "session '{}' is not ready (state: {state:?})",
                self.server_id
            )));
        }
        self.link.lock().clone().ok_or_else(|| {
            McpError::Connection(format!("session '{}' has no transport", self.server_id))
        })
    }

    async fn rpc(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let link = self.ready_link()?;
        let response = link.request(method, params, self.request_timeout).await?;
        response.into_result().map_err(|error| McpError::Rpc {
            method: method.into(),
            error,
        })
    }

    /// Follow `nextCursor` until the server stops returning one.
    async fn paginate<P, T>(
        &self,
        method: &str,
        split: impl Fn(P) -> (Vec<T>, Option<String>),
    ) -> Result<Vec<T>, McpError>
    where
        P: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let params = cursor.take().map(|c| json!({ "cursor": c }));
            let page: P = decode(method, self.rpc(method, params).await?)?;
            let (batch, next) = split(page);
            items.extend(batch);
            match next {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(items),
            }
        }
        Err(McpError::Protocol(format!(
            "{method} did not finish within {MAX_PAGES} pages"
        )))
    }

    // ── Operations ─────────────────────────────────────────────────

    pub async fn ping(&self) -> Result<(), McpError> {
        self.rpc("ping", None).await.map(|_| ())
    }

    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError> {
        self.paginate("tools/list", |p: ToolsListResult| (p.tools, p.next_cursor))
            .await
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        let params = json!({ "name": name, "arguments": arguments });
        decode("tools/call", self.rpc("tools/call", Some(params)).await?)
    }

    /// Call a tool, routing `notifications/progress` for this call to `sink`.
    pub async fn call_tool_with_progress(
        &self,
        name: &str,
        arguments: Value,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<ToolCallResult, McpError> {
        let link = self.ready_link()?;
        let id = link.reserve_id();
        let token = RequestId::Number(id);
        link.progress.lock().insert(token.clone(), sink);
        let _route = ProgressRoute {
            routes: &link.progress,
            token,
        };

        let params = json!({
            "name": name,
            "arguments": arguments,
            "_meta": { "progressToken": id },
        });
        let outcome = link
            .request_with_id(id, "tools/call", Some(params), self.request_timeout)
            .await;

        let value = outcome?.into_result().map_err(|error| McpError::Rpc {
            method: "tools/call".into(),
            error,
        })?;
        decode("tools/call", value)
    }

    pub async fn list_prompts(&self) -> Result<Vec<PromptDef>, McpError> {
        self.paginate("prompts/list", |p: PromptsListResult| (p.prompts, p.next_cursor))
            .await
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: &HashMap<String, String>,
    ) -> Result<Vec<PromptMessage>, McpError> {
        let params = json!({ "name": name, "arguments": arguments });
        let result: GetPromptResult =
            decode("prompts/get", self.rpc("prompts/get", Some(params)).await?)?;
        Ok(result.messages)
    }

    pub async fn list_resources(&self) -> Result<Vec<ResourceDef>, McpError> {
        self.paginate("resources/list", |p: ResourcesListResult| (p.resources, p.next_cursor))
            .await
    }

    /// Read a resource's first content item.
    ///
    /// Text declared as `application/json` is parsed; other text is returned
    /// verbatim. Binary-only or empty results yield `None`.
    pub async fn read_resource(&self, uri: &str) -> Result<Option<ResourceValue>, McpError> {
        let params = json!({ "uri": uri });
        let result: ReadResourceResult =
            decode("resources/read", self.rpc("resources/read", Some(params)).await?)?;

        let Some(first) = result.contents.into_iter().next() else {
            return Ok(None);
        };
        let Some(text) = first.text else {
            return Ok(None);
        };
        if first.mime_type.as_deref() == Some(JSON_MIME) {
            let value = serde_json::from_str(&text).map_err(|e| {
                McpError::Protocol(format!("resource '{uri}' is not valid JSON: {e}"))
            })?;
            Ok(Some(ResourceValue::Json(value)))
        } else {
            Ok(Some(ResourceValue::Text(text)))
        }
    }

    pub async fn set_logging_level(&self, level: LoggingLevel) -> Result<(), McpError> {
        self.rpc("logging/setLevel", Some(json!({ "level": level })))
            .await
            .map(|_| ())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("server_id", &self.server_id)
            .field("state", &self.state())
            .finish()
    }
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, McpError> {
    serde_json::from_value(value)
        .map_err(|e| McpError::Protocol(format!("failed to parse {method} result: {e}")))
}
