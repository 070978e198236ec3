//! JSON-RPC 2.0 framing for the MCP channel
//!
//! Messages are newline-delimited JSON objects. The payloads (handshake,
//! listings, invocation results and error objects) are the `rmcp::model`
//! types; this module only adds the envelope around them. Request ids stay
//! raw JSON values so a reply carries back exactly what the host sent, and
//! a parse failure can be answered with a `null` id.

use rmcp::model::{
    AnnotateAble, ErrorCode, ErrorData, Implementation, ListPromptsResult, ListResourcesResult, ListToolsResult,
    Prompt, PromptArgument, ProtocolVersion, RawResource, ServerCapabilities, Tool,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::catalog::CatalogAnnouncement;

/// JSON-RPC protocol version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// Revisions accepted during the handshake, newest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Pick the revision to answer an `initialize` with.
///
/// Echo the client's revision when we support it, otherwise offer rmcp's latest.
pub fn negotiate_protocol_version(requested: Option<&str>) -> ProtocolVersion {
    requested
        .filter(|r| SUPPORTED_PROTOCOL_VERSIONS.contains(r))
        .and_then(|r| serde_json::from_value(Value::String(r.to_string())).ok())
        .unwrap_or(ProtocolVersion::LATEST)
}

/// Name and version reported in the handshake.
pub fn implementation(name: impl Into<String>, version: impl Into<String>) -> Implementation {
    Implementation {
        name: name.into(),
        title: None,
        version: version.into(),
        icons: None,
        website_url: None,
    }
}

/// Capabilities for the classes the catalog actually offers
pub fn capabilities(announcement: &CatalogAnnouncement) -> ServerCapabilities {
    let mut capabilities = ServerCapabilities::builder()
        .enable_tools()
        .enable_resources()
        .enable_prompts()
        .build();
    if announcement.tools.is_empty() {
        capabilities.tools = None;
    }
    if announcement.resources.is_empty() {
        capabilities.resources = None;
    }
    if announcement.prompts.is_empty() {
        capabilities.prompts = None;
    }
    capabilities
}

/// `tools/list` result
pub fn list_tools(announcement: &CatalogAnnouncement) -> ListToolsResult {
    let tools = announcement
        .tools
        .iter()
        .map(|entry| {
            let schema = match &entry.input_schema {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            };
            Tool::new(entry.name.clone(), entry.description.clone(), schema)
        })
        .collect();
    ListToolsResult::with_all_items(tools)
}

/// `resources/list` result
pub fn list_resources(announcement: &CatalogAnnouncement) -> ListResourcesResult {
    let resources = announcement
        .resources
        .iter()
        .map(|entry| {
            let mut raw = RawResource::new(entry.uri.clone(), entry.name.clone());
            raw.description = Some(entry.description.clone());
            raw.mime_type = Some(entry.mime_type.clone());
            raw.no_annotation()
        })
        .collect();
    ListResourcesResult::with_all_items(resources)
}

/// `prompts/list` result
pub fn list_prompts(announcement: &CatalogAnnouncement) -> ListPromptsResult {
    let prompts = announcement
        .prompts
        .iter()
        .map(|entry| {
            let arguments = entry
                .arguments
                .iter()
                .map(|arg| PromptArgument {
                    name: arg.name.clone(),
                    title: None,
                    description: Some(arg.description.clone()),
                    required: Some(arg.required),
                })
                .collect();
            Prompt::new(entry.name.clone(), Some(entry.description.clone()), Some(arguments))
        })
        .collect();
    ListPromptsResult::with_all_items(prompts)
}

/// A JSON-RPC 2.0 request (has an `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A JSON-RPC 2.0 notification (no `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A JSON-RPC 2.0 response carrying an rmcp result or [`ErrorData`].
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorData>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: ErrorData) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Answer `id` with a typed result, or with the error it failed with
    pub fn reply<T: Serialize>(id: Value, result: Result<T, ErrorData>) -> Self {
        let encoded = result.and_then(|r| {
            serde_json::to_value(r).map_err(|e| ErrorData::internal_error(e.to_string(), None))
        });
        match encoded {
            Ok(value) => Self::success(id, value),
            Err(error) => Self::failure(id, error),
        }
    }
}

/// `-32601` for a method this server does not implement
pub fn method_not_found(method: &str) -> ErrorData {
    ErrorData::new(ErrorCode::METHOD_NOT_FOUND, format!("Method not found: {}", method), None)
}

/// An inbound message from the host.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    /// A response to something we never sent; logged and dropped
    Response(Value),
}

/// Why an inbound line could not be turned into a message.
#[derive(Debug)]
pub enum ParseFailure {
    /// Not JSON at all (including bytes that are not UTF-8)
    Syntax(serde_json::Error),
    /// JSON, but not a JSON-RPC message; carries the id when one was readable
    Shape { id: Value, error: serde_json::Error },
}

/// Parse one raw line into a request, notification or stray response.
pub fn parse_incoming(line: &[u8]) -> Result<IncomingMessage, ParseFailure> {
    let raw: Value = serde_json::from_slice(line).map_err(ParseFailure::Syntax)?;

    let has_method = raw.get("method").is_some();
    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let shape = |error| ParseFailure::Shape {
        id: id.clone(),
        error,
    };

    if !has_method && (raw.get("result").is_some() || raw.get("error").is_some()) {
        return Ok(IncomingMessage::Response(raw));
    }

    if id.is_null() {
        let notif: JsonRpcNotification = serde_json::from_value(raw).map_err(shape)?;
        Ok(IncomingMessage::Notification(notif))
    } else {
        let req: JsonRpcRequest = serde_json::from_value(raw).map_err(shape)?;
        Ok(IncomingMessage::Request(req))
    }
}
