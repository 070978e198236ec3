//! Response envelopes
//!
//! Every invocation ends in exactly one [`ResponseEnvelope`]. The envelope
//! has its own wire shape (`{"ok": true, "payload": ...}` or
//! `{"ok": false, "error": ..., "operation": ...}`) and knows how to turn
//! itself into the MCP result for each capability class.

use base64::Engine as _;
use rmcp::model::{
    CallToolResult, Content, ErrorCode, ErrorData, GetPromptResult, PromptMessage, PromptMessageRole,
    ReadResourceResult, ResourceContents,
};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Value, json};

use crate::descriptor::CapabilityClass;
use crate::error::{Fault, FaultKind};
use crate::provider::Payload;

/// Uniform outcome of one invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    Success {
        payload: Payload,
    },
    Failure {
        message: String,
        operation: String,
        kind: FaultKind,
    },
}

impl ResponseEnvelope {
    /// Wrap a provider outcome
    pub fn build(operation: &str, outcome: Result<Payload, Fault>) -> Self {
        match outcome {
            Ok(payload) => Self::Success { payload },
            Err(fault) => Self::failure(operation, &fault),
        }
    }

    pub fn failure(operation: &str, fault: &Fault) -> Self {
        Self::Failure {
            message: fault.to_string(),
            operation: operation.to_string(),
            kind: fault.kind(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Success { payload } => Some(payload),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::Failure { message, .. } => Some(message),
            Self::Success { .. } => None,
        }
    }

    pub fn fault_kind(&self) -> Option<FaultKind> {
        match self {
            Self::Failure { kind, .. } => Some(*kind),
            Self::Success { .. } => None,
        }
    }

    /// The envelope in its own wire shape
    pub fn to_wire(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Result of `tools/call`
    ///
    /// Provider faults are tool-level errors (`isError: true`) so the host
    /// model can see them; request faults are protocol errors.
    pub fn into_tool_result(self, operation: &str) -> Result<CallToolResult, ErrorData> {
        match self {
            Self::Success { payload } => tool_result(operation, payload, false),
            Self::Failure {
                kind: FaultKind::Provider,
                message,
                ..
            } => tool_result(operation, Payload::Text(message), true),
            failure @ Self::Failure { .. } => Err(failure.rpc_error(CapabilityClass::Action)),
        }
    }

    /// Result of `resources/read`
    pub fn into_resource_result(self, uri: &str, mime_type: &str) -> Result<ReadResourceResult, ErrorData> {
        match self {
            Self::Success { payload } => {
                let contents = match payload {
                    Payload::Text(text) => text_contents(uri, mime_type, text),
                    Payload::Json(value) => text_contents(uri, mime_type, pretty(&value)),
                    Payload::Binary { bytes, mime_type } => blob_contents(uri, &mime_type, &bytes)?,
                };
                Ok(ReadResourceResult {
                    contents: vec![contents],
                })
            }
            failure @ Self::Failure { .. } => Err(failure.rpc_error(CapabilityClass::ReadableItem)),
        }
    }

    /// Result of `prompts/get`
    pub fn into_prompt_result(self, name: &str) -> Result<GetPromptResult, ErrorData> {
        match self {
            Self::Success { payload } => {
                let text = match payload {
                    Payload::Text(text) => text,
                    Payload::Json(value) => pretty(&value),
                    Payload::Binary { bytes, .. } => encode(&bytes),
                };
                Ok(GetPromptResult {
                    description: Some(format!("AI prompt for {}", name)),
                    messages: vec![PromptMessage::new_text(PromptMessageRole::User, text)],
                })
            }
            failure @ Self::Failure { .. } => Err(failure.rpc_error(CapabilityClass::Template)),
        }
    }

    /// JSON-RPC error for a failure; `data` carries the envelope wire shape
    fn rpc_error(&self, class: CapabilityClass) -> ErrorData {
        let (code, message) = match self {
            Self::Failure { kind, message, .. } => {
                let code = match (kind, class) {
                    (FaultKind::UnknownOperation, CapabilityClass::ReadableItem) => ErrorCode::RESOURCE_NOT_FOUND,
                    (FaultKind::Provider, _) => ErrorCode::INTERNAL_ERROR,
                    _ => ErrorCode::INVALID_PARAMS,
                };
                (code, message.clone())
            }
            Self::Success { .. } => (ErrorCode::INTERNAL_ERROR, String::new()),
        };
        ErrorData::new(code, message, Some(self.to_wire()))
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Success { payload } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("payload", &payload_value(payload))?;
                map.end()
            }
            Self::Failure {
                message, operation, ..
            } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", message)?;
                map.serialize_entry("operation", operation)?;
                map.end()
            }
        }
    }
}

fn payload_value(payload: &Payload) -> Value {
    match payload {
        Payload::Text(text) => Value::String(text.clone()),
        Payload::Json(value) => value.clone(),
        Payload::Binary { bytes, mime_type } => json!({
            "mimeType": mime_type,
            "blob": encode(bytes),
        }),
    }
}

fn tool_result(operation: &str, payload: Payload, is_error: bool) -> Result<CallToolResult, ErrorData> {
    let (content, structured) = match payload {
        Payload::Text(text) => (Content::text(text), None),
        // structuredContent must be an object
        Payload::Json(value) => (Content::text(pretty(&value)), Some(value).filter(Value::is_object)),
        Payload::Binary { bytes, mime_type } if mime_type.starts_with("image/") => {
            (Content::image(encode(&bytes), mime_type), None)
        }
        Payload::Binary { bytes, mime_type } => {
            let uri = format!("swmcp://result/{}", operation);
            (Content::resource(blob_contents(&uri, &mime_type, &bytes)?), None)
        }
    };

    let mut result = if is_error {
        CallToolResult::error(vec![content])
    } else {
        CallToolResult::success(vec![content])
    };
    result.structured_content = structured;
    Ok(result)
}

fn text_contents(uri: &str, mime_type: &str, text: String) -> ResourceContents {
    let mut contents = ResourceContents::text(text, uri);
    if let ResourceContents::TextResourceContents { mime_type: slot, .. } = &mut contents {
        *slot = Some(mime_type.to_string());
    }
    contents
}

// rmcp offers no blob constructor; its wire form deserializes into the blob variant
fn blob_contents(uri: &str, mime_type: &str, bytes: &[u8]) -> Result<ResourceContents, ErrorData> {
    serde_json::from_value(json!({
        "uri": uri,
        "mimeType": mime_type,
        "blob": encode(bytes),
    }))
    .map_err(|e| ErrorData::internal_error(format!("Failed to encode binary payload: {}", e), None))
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
