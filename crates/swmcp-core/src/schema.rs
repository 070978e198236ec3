//! Argument schemas and validation
//!
//! Every capability declares an ordered list of fields. Validation only
//! checks presence and fills defaults; value types are the provider's
//! business, so nothing is coerced here.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Primitive argument types understood by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    /// JSON Schema name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a field must be supplied by the host
///
/// Required fields cannot carry a default, which keeps the
/// "required fields have no default" rule true by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    Required,
    Optional { default: Option<Value> },
}

/// One declared argument
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub description: String,
    pub requirement: Requirement,
}

impl FieldSpec {
    pub fn is_required(&self) -> bool {
        matches!(self.requirement, Requirement::Required)
    }

    /// Declared default, if the field is optional and has one
    pub fn default_value(&self) -> Option<&Value> {
        match &self.requirement {
            Requirement::Optional { default } => default.as_ref(),
            Requirement::Required => None,
        }
    }
}

/// Ordered argument schema for one capability
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentSchema {
    fields: Vec<FieldSpec>,
}

impl ArgumentSchema {
    /// An empty schema (the capability takes no arguments)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required field
    pub fn required(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.push(name.into(), field_type, description.into(), Requirement::Required)
    }

    /// Add an optional field without a default
    pub fn optional(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
    ) -> Self {
        self.push(
            name.into(),
            field_type,
            description.into(),
            Requirement::Optional { default: None },
        )
    }

    /// Add an optional field that is filled with `default` when absent
    pub fn with_default(
        self,
        name: impl Into<String>,
        field_type: FieldType,
        description: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        self.push(
            name.into(),
            field_type,
            description.into(),
            Requirement::Optional {
                default: Some(default.into()),
            },
        )
    }

    // A repeated name replaces the earlier declaration in place.
    fn push(
        mut self,
        name: String,
        field_type: FieldType,
        description: String,
        requirement: Requirement,
    ) -> Self {
        let spec = FieldSpec {
            name,
            field_type,
            description,
            requirement,
        };
        match self.fields.iter_mut().find(|f| f.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.fields.push(spec),
        }
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check `arguments` against the schema
    ///
    /// Absent or `null` required fields fail validation; every missing
    /// field is reported, in declaration order. Optional fields that are
    /// absent (or `null`) receive their declared default. Fields the schema
    /// does not know about pass through untouched.
    pub fn validate(&self, mut arguments: Map<String, Value>) -> Result<Map<String, Value>, ValidationError> {
        let missing: Vec<String> = self
            .fields
            .iter()
            .filter(|f| f.is_required() && is_absent(arguments.get(&f.name)))
            .map(|f| f.name.clone())
            .collect();

        if !missing.is_empty() {
            return Err(ValidationError { missing });
        }

        for field in &self.fields {
            if let Some(default) = field.default_value() {
                if is_absent(arguments.get(&field.name)) {
                    arguments.insert(field.name.clone(), default.clone());
                }
            }
        }

        Ok(arguments)
    }

    /// Render as a JSON Schema object (tool `inputSchema`)
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut property = json!({
                "type": field.field_type.as_str(),
                "description": field.description,
            });
            if let (Some(default), Some(obj)) = (field.default_value(), property.as_object_mut()) {
                obj.insert("default".to_string(), default.clone());
            }
            properties.insert(field.name.clone(), property);
        }

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.is_required())
            .map(|f| f.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Render as a prompt argument list (template announcements)
    pub fn to_prompt_arguments(&self) -> Vec<PromptArgument> {
        self.fields
            .iter()
            .map(|f| PromptArgument {
                name: f.name.clone(),
                description: f.description.clone(),
                required: f.is_required(),
            })
            .collect()
    }
}

fn is_absent(value: Option<&Value>) -> bool {
    value.is_none_or(Value::is_null)
}

/// Announced shape of a template argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptArgument {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Required arguments were not supplied
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Missing required {}: {}", argument_noun(.missing), .missing.join(", "))]
pub struct ValidationError {
    pub missing: Vec<String>,
}

fn argument_noun(missing: &[String]) -> &'static str {
    if missing.len() == 1 { "argument" } else { "arguments" }
}
