//! The provider contract
//!
//! A provider owns a fixed set of descriptors for one capability class
//! and executes them by name (or by URI for readable items). The router
//! only ever talks to providers through [`CapabilityProvider`].

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::descriptor::{CapabilityClass, CapabilityDescriptor};

/// Untyped argument mapping as received from the transport
pub type Arguments = Map<String, Value>;

/// What a provider hands back on success
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Plain text (rendered prompts, messages)
    Text(String),
    /// A structured record
    Json(Value),
    /// Raw bytes with their content type
    Binary { bytes: Vec<u8>, mime_type: String },
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Serialize any record into a structured payload
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ProviderFault> {
        serde_json::to_value(value)
            .map(Self::Json)
            .map_err(|e| ProviderFault::failed(format!("Failed to encode result: {}", e)))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// A fault raised while a provider executes an operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderFault {
    /// The provider does not implement this identifier
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// An argument was present but unusable
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    /// Anything else (I/O, backend, timeout)
    #[error("{0}")]
    Failed(String),
}

impl ProviderFault {
    pub fn failed(message: impl fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }

    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for ProviderFault {
    fn from(e: std::io::Error) -> Self {
        Self::Failed(format!("IO error: {}", e))
    }
}

/// One capability class's worth of operations
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// The class every descriptor of this provider belongs to
    fn class(&self) -> CapabilityClass;

    /// The provider's catalog
    ///
    /// Must be deterministic: the same list, in the same order, on every
    /// call for the life of the process.
    fn list_descriptors(&self) -> Vec<CapabilityDescriptor>;

    /// Execute `operation` (a name, or a URI for readable items)
    ///
    /// Arguments have already been validated against the descriptor's
    /// schema and carry defaults for absent optional fields.
    async fn invoke(&self, operation: &str, arguments: Arguments) -> Result<Payload, ProviderFault>;
}

/// Typed access to validated arguments
///
/// Type checking is left to providers; these helpers turn a wrong type
/// into an [`ProviderFault::InvalidArgument`].
pub trait ArgumentsExt {
    fn str_arg(&self, name: &str) -> Result<&str, ProviderFault>;
    fn opt_str_arg(&self, name: &str) -> Result<Option<&str>, ProviderFault>;
    fn opt_object_arg(&self, name: &str) -> Result<Option<&Map<String, Value>>, ProviderFault>;
    fn opt_array_arg(&self, name: &str) -> Result<Option<&Vec<Value>>, ProviderFault>;
    fn opt_bool_arg(&self, name: &str) -> Result<Option<bool>, ProviderFault>;
    fn opt_u64_arg(&self, name: &str) -> Result<Option<u64>, ProviderFault>;
}

impl ArgumentsExt for Arguments {
    fn str_arg(&self, name: &str) -> Result<&str, ProviderFault> {
        self.opt_str_arg(name)?
            .ok_or_else(|| ProviderFault::invalid(name, "value is required"))
    }

    fn opt_str_arg(&self, name: &str) -> Result<Option<&str>, ProviderFault> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ProviderFault::invalid(
                name,
                format!("expected a string, got {}", json_type_name(other)),
            )),
        }
    }

    fn opt_object_arg(&self, name: &str) -> Result<Option<&Map<String, Value>>, ProviderFault> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(other) => Err(ProviderFault::invalid(
                name,
                format!("expected an object, got {}", json_type_name(other)),
            )),
        }
    }

    fn opt_array_arg(&self, name: &str) -> Result<Option<&Vec<Value>>, ProviderFault> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(other) => Err(ProviderFault::invalid(
                name,
                format!("expected an array, got {}", json_type_name(other)),
            )),
        }
    }

    fn opt_bool_arg(&self, name: &str) -> Result<Option<bool>, ProviderFault> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(ProviderFault::invalid(
                name,
                format!("expected a boolean, got {}", json_type_name(other)),
            )),
        }
    }

    fn opt_u64_arg(&self, name: &str) -> Result<Option<u64>, ProviderFault> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(Some)
                .ok_or_else(|| ProviderFault::invalid(name, "expected a non-negative integer")),
            Some(other) => Err(ProviderFault::invalid(
                name,
                format!("expected an integer, got {}", json_type_name(other)),
            )),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
