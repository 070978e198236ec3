//! Session coordinator
//!
//! Binds one [`DispatchRouter`] to one channel. The channel is an
//! already-open reader/writer pair carrying newline-delimited JSON-RPC;
//! the binary hands in stdin/stdout, tests hand in an in-memory duplex.
//!
//! ## Architecture
//!
//! ```text
//! host ── line ──▶ reader loop ──▶ list/handshake methods ──┐
//!                      │                                    │
//!                      └─▶ one task per invocation          ▼
//!                              router.dispatch ──▶ response queue ──▶ writer
//! ```
//!
//! Invocations run concurrently (bounded by a semaphore) while the loop
//! keeps reading. Responses are written one at a time in completion
//! order. An id may not be reused while its invocation is in flight. When
//! the host cancels a request or closes the channel, the invocation is
//! aborted and never answered.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt as _;
use rmcp::model::{
    ErrorCode, ErrorData, Implementation, InitializeResult, ListPromptsResult, ListResourcesResult, ListToolsResult,
    ServerCapabilities,
};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{AbortHandle, JoinSet};

use crate::descriptor::CapabilityClass;
use crate::envelope::ResponseEnvelope;
use crate::error::SessionError;
use crate::protocol::{
    self, IncomingMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ParseFailure,
    negotiate_protocol_version, parse_incoming,
};
use crate::router::DispatchRouter;

/// Default bound on concurrently executing invocations
pub const DEFAULT_MAX_IN_FLIGHT: usize = 5;

/// Counters reported when a session ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub requests: u64,
    pub notifications: u64,
    pub invocations: u64,
    /// Invocations cancelled by the host
    pub cancelled: u64,
    /// Invocations still running when the channel closed
    pub abandoned: u64,
}

/// The catalog lists, built once per coordinator
struct Listings {
    tools: ListToolsResult,
    resources: ListResourcesResult,
    prompts: ListPromptsResult,
    capabilities: ServerCapabilities,
}

/// Runs one host session over one channel
pub struct SessionCoordinator {
    router: DispatchRouter,
    server_info: Implementation,
    instructions: Option<String>,
    max_in_flight: usize,
    listings: Listings,
}

impl SessionCoordinator {
    pub fn new(router: DispatchRouter, server_info: Implementation) -> Self {
        let announcement = router.catalog().announcement();
        let listings = Listings {
            tools: protocol::list_tools(&announcement),
            resources: protocol::list_resources(&announcement),
            prompts: protocol::list_prompts(&announcement),
            capabilities: protocol::capabilities(&announcement),
        };

        Self {
            router,
            server_info,
            instructions: None,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            listings,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Bound the number of invocations executing at once (at least 1)
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max.max(1);
        self
    }

    pub fn router(&self) -> &DispatchRouter {
        &self.router
    }

    /// Serve the session until the host closes the channel
    ///
    /// Returns `Ok` on a clean close (EOF). Read or write failures end the
    /// session with a [`SessionError`]; every other fault, including a line
    /// that is not UTF-8 or not JSON, is answered on the channel and the
    /// session carries on.
    pub async fn run<R, W>(self, mut reader: R, mut writer: W) -> Result<SessionSummary, SessionError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
        let mut state = SessionState {
            initialized: false,
            tx,
            semaphore: Arc::new(Semaphore::new(self.max_in_flight)),
            in_flight: JoinSet::new(),
            pending: HashMap::new(),
            next_ticket: 0,
            summary: SessionSummary::default(),
        };
        // Bytes of the current line; survives a read cancelled by another branch
        let mut line = Vec::new();

        tracing::info!(
            server = self.server_info.name.as_str(),
            tools = self.router.catalog().len(CapabilityClass::Action),
            resources = self.router.catalog().len(CapabilityClass::ReadableItem),
            prompts = self.router.catalog().len(CapabilityClass::Template),
            "session started"
        );

        let outcome = loop {
            tokio::select! {
                read = reader.read_until(b'\n', &mut line) => match read {
                    Ok(0) => {
                        // A final line without a newline is still a message
                        if !line.is_empty() {
                            self.handle_line(&line, &mut state);
                            line.clear();
                        }
                        tracing::info!("host closed the channel (EOF)");
                        break Ok(());
                    }
                    Ok(_) => {
                        self.handle_line(&line, &mut state);
                        line.clear();
                    }
                    Err(e) => {
                        tracing::error!("channel read failed: {}", e);
                        break Err(SessionError::Read(e));
                    }
                },
                Some(outbound) = rx.recv() => {
                    if !state.settle(&outbound) {
                        continue;
                    }
                    if let Err(e) = write_message(&mut writer, &outbound.response).await {
                        tracing::error!("channel write failed: {}", e);
                        break Err(e);
                    }
                }
                Some(joined) = state.in_flight.join_next(), if !state.in_flight.is_empty() => {
                    reap(joined);
                }
            }
        };

        // Teardown: nothing new is processed, running invocations are abandoned.
        state.in_flight.abort_all();
        while let Some(joined) = state.in_flight.join_next().await {
            reap(joined);
        }
        // Responses that were already complete still go out.
        let mut finished = Vec::new();
        while let Ok(outbound) = rx.try_recv() {
            if state.settle(&outbound) {
                finished.push(outbound.response);
            }
        }
        // Host-cancelled requests already left `pending`; what remains never finished.
        state.summary.abandoned = state.pending.len() as u64;

        outcome?;

        for response in &finished {
            write_message(&mut writer, response).await?;
        }

        tracing::info!(
            requests = state.summary.requests,
            invocations = state.summary.invocations,
            cancelled = state.summary.cancelled,
            abandoned = state.summary.abandoned,
            "session ended"
        );
        Ok(state.summary)
    }

    fn handle_line(&self, line: &[u8], state: &mut SessionState) {
        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            return;
        }

        match parse_incoming(trimmed) {
            Ok(IncomingMessage::Request(req)) => {
                state.summary.requests += 1;
                self.handle_request(req, state);
            }
            Ok(IncomingMessage::Notification(notif)) => {
                state.summary.notifications += 1;
                Self::handle_notification(&notif, state);
            }
            Ok(IncomingMessage::Response(raw)) => {
                let id = raw.get("id").cloned().unwrap_or(Value::Null);
                tracing::warn!(id = %id, "ignoring unsolicited response");
            }
            Err(ParseFailure::Syntax(e)) => {
                tracing::warn!("failed to parse message: {}", e);
                state.reply(JsonRpcResponse::failure(
                    Value::Null,
                    ErrorData::new(ErrorCode::PARSE_ERROR, format!("Parse error: {}", e), None),
                ));
            }
            Err(ParseFailure::Shape { id, error }) => {
                tracing::warn!("invalid request: {}", error);
                state.reply(JsonRpcResponse::failure(
                    id,
                    ErrorData::invalid_request(format!("Invalid request: {}", error), None),
                ));
            }
        }
    }

    fn handle_request(&self, req: JsonRpcRequest, state: &mut SessionState) {
        let JsonRpcRequest { id, method, params, .. } = req;
        tracing::debug!(id = %id, method = method.as_str(), "request");

        let response = match method.as_str() {
            "initialize" => JsonRpcResponse::reply(id, self.initialize(params.as_ref(), state)),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::reply(id, Ok(&self.listings.tools)),
            "resources/list" => JsonRpcResponse::reply(id, Ok(&self.listings.resources)),
            "prompts/list" => JsonRpcResponse::reply(id, Ok(&self.listings.prompts)),
            other => match InvocationMethod::from_method(other) {
                Some(kind) => {
                    self.spawn_invocation(kind, id, params.unwrap_or(Value::Null), state);
                    return;
                }
                None => JsonRpcResponse::failure(id, protocol::method_not_found(other)),
            },
        };
        state.reply(response);
    }

    fn initialize(&self, params: Option<&Value>, state: &mut SessionState) -> Result<InitializeResult, ErrorData> {
        if state.initialized {
            return Err(ErrorData::invalid_request("Session already initialized", None));
        }

        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let client = params
            .and_then(|p| p.get("clientInfo"))
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let protocol_version = negotiate_protocol_version(requested);

        tracing::info!(client, protocol_version = ?protocol_version, "host initialized session");
        state.initialized = true;

        Ok(InitializeResult {
            protocol_version,
            capabilities: self.listings.capabilities.clone(),
            server_info: self.server_info.clone(),
            instructions: self.instructions.clone(),
        })
    }

    fn handle_notification(notif: &JsonRpcNotification, state: &mut SessionState) {
        match notif.method.as_str() {
            "notifications/initialized" => {
                tracing::info!("host completed initialization");
            }
            "notifications/cancelled" => {
                let request_id = notif
                    .params
                    .as_ref()
                    .and_then(|p| p.get("requestId"))
                    .cloned()
                    .unwrap_or(Value::Null);
                let key = request_key(&request_id);
                if let Some(pending) = state.pending.remove(&key) {
                    pending.abort.abort();
                    state.summary.cancelled += 1;
                    tracing::debug!(id = %request_id, "host cancelled request");
                } else {
                    tracing::debug!(id = %request_id, "cancellation for unknown or finished request");
                }
            }
            other => {
                tracing::debug!("unhandled notification: {}", other);
            }
        }
    }

    fn spawn_invocation(&self, kind: InvocationMethod, id: Value, params: Value, state: &mut SessionState) {
        if !state.initialized {
            state.reply(JsonRpcResponse::failure(
                id,
                ErrorData::invalid_request("Session not initialized: send initialize first", None),
            ));
            return;
        }

        let key = request_key(&id);
        // Two live invocations may not share an id
        if state.pending.contains_key(&key) {
            tracing::warn!(id = %id, "duplicate request id while still in flight");
            state.reply(JsonRpcResponse::failure(
                id,
                ErrorData::invalid_request(format!("Request id {} is already in flight", key), None),
            ));
            return;
        }

        state.summary.invocations += 1;
        state.next_ticket += 1;
        let ticket = Ticket {
            key: key.clone(),
            serial: state.next_ticket,
        };
        let serial = ticket.serial;
        let router = self.router.clone();
        let tx = state.tx.clone();
        let semaphore = Arc::clone(&state.semaphore);

        let abort = state.in_flight.spawn(async move {
            let work = async {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = semaphore.acquire_owned().await.ok();
                kind.execute(&router, &params).await
            };
            let result = match AssertUnwindSafe(work).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(ErrorData::internal_error("Invocation failed unexpectedly", None)),
            };
            // The receiver only disappears at teardown, when nothing is written anyway.
            let _ = tx.send(Outbound {
                ticket: Some(ticket),
                response: JsonRpcResponse::reply(id, result),
            });
        });
        state.pending.insert(key, Pending { serial, abort });
    }
}

/// Identifies one invocation; an id may be reused once its response is out
struct Ticket {
    key: String,
    serial: u64,
}

struct Pending {
    serial: u64,
    abort: AbortHandle,
}

/// A response waiting for the writer
struct Outbound {
    /// Set for invocation results
    ticket: Option<Ticket>,
    response: JsonRpcResponse,
}

struct SessionState {
    initialized: bool,
    tx: mpsc::UnboundedSender<Outbound>,
    semaphore: Arc<Semaphore>,
    in_flight: JoinSet<()>,
    pending: HashMap<String, Pending>,
    next_ticket: u64,
    summary: SessionSummary,
}

impl SessionState {
    fn reply(&self, response: JsonRpcResponse) {
        let _ = self.tx.send(Outbound {
            ticket: None,
            response,
        });
    }

    /// Retire the invocation behind `outbound`; false when it was cancelled
    /// and must not be answered
    fn settle(&mut self, outbound: &Outbound) -> bool {
        let Some(ticket) = &outbound.ticket else {
            return true;
        };
        match self.pending.get(&ticket.key) {
            Some(pending) if pending.serial == ticket.serial => {
                self.pending.remove(&ticket.key);
                true
            }
            _ => false,
        }
    }
}

fn reap(joined: Result<(), tokio::task::JoinError>) {
    match joined {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => {}
        Err(e) => tracing::error!("invocation task failed: {}", e),
    }
}

/// The three MCP methods that invoke a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InvocationMethod {
    ToolCall,
    ResourceRead,
    PromptGet,
}

impl InvocationMethod {
    fn from_method(method: &str) -> Option<Self> {
        match method {
            "tools/call" => Some(Self::ToolCall),
            "resources/read" => Some(Self::ResourceRead),
            "prompts/get" => Some(Self::PromptGet),
            _ => None,
        }
    }

    fn class(self) -> CapabilityClass {
        match self {
            Self::ToolCall => CapabilityClass::Action,
            Self::ResourceRead => CapabilityClass::ReadableItem,
            Self::PromptGet => CapabilityClass::Template,
        }
    }

    async fn execute(self, router: &DispatchRouter, params: &Value) -> Result<Value, ErrorData> {
        let class = self.class();
        match self {
            Self::ToolCall => {
                let operation = &params["name"];
                let envelope = router
                    .dispatch_untyped(class.as_str(), operation, params.get("arguments"))
                    .await;
                encode(envelope.into_tool_result(operation.as_str().unwrap_or_default())?)
            }
            Self::PromptGet => {
                let operation = &params["name"];
                let envelope = router
                    .dispatch_untyped(class.as_str(), operation, params.get("arguments"))
                    .await;
                encode(envelope.into_prompt_result(operation.as_str().unwrap_or_default())?)
            }
            Self::ResourceRead => {
                let uri = &params["uri"];
                let envelope: ResponseEnvelope = router.dispatch_untyped(class.as_str(), uri, None).await;
                let uri = uri.as_str().unwrap_or_default();
                let mime_type = router
                    .catalog()
                    .lookup(class, uri)
                    .and_then(|e| e.descriptor.mime_type())
                    .unwrap_or("text/plain");
                encode(envelope.into_resource_result(uri, mime_type)?)
            }
        }
    }
}

fn encode<T: serde::Serialize>(result: T) -> Result<Value, ErrorData> {
    serde_json::to_value(result).map_err(|e| ErrorData::internal_error(e.to_string(), None))
}

/// Correlation key for a request id; `1` and `"1"` stay distinct.
fn request_key(id: &Value) -> String {
    id.to_string()
}

async fn write_message<W>(writer: &mut W, response: &JsonRpcResponse) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    writer.write_all(&line).await.map_err(SessionError::Write)?;
    writer.flush().await.map_err(SessionError::Write)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_key_distinguishes_types() {
        assert_ne!(request_key(&json!(1)), request_key(&json!("1")));
        assert_eq!(request_key(&json!("abc")), request_key(&json!("abc")));
    }

    #[test]
    fn test_invocation_methods() {
        assert_eq!(InvocationMethod::from_method("tools/call"), Some(InvocationMethod::ToolCall));
        assert_eq!(
            InvocationMethod::from_method("resources/read").map(InvocationMethod::class),
            Some(CapabilityClass::ReadableItem)
        );
        assert_eq!(InvocationMethod::from_method("tools/list"), None);
    }
}
