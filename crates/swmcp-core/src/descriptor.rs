//! Capability classes and descriptors

use std::fmt;
use std::str::FromStr;

use crate::schema::ArgumentSchema;

/// The three kinds of capability a provider can own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityClass {
    /// Operations that perform work (MCP tools)
    Action,
    /// Data items addressed by URI (MCP resources)
    ReadableItem,
    /// Prompt documents rendered from arguments (MCP prompts)
    Template,
}

impl CapabilityClass {
    pub const ALL: [Self; 3] = [Self::Action, Self::ReadableItem, Self::Template];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::ReadableItem => "readable_item",
            Self::Template => "template",
        }
    }

    /// Noun used in "unknown ..." failure messages
    pub fn identifier_noun(&self) -> &'static str {
        match self {
            Self::Action => "tool",
            Self::ReadableItem => "resource URI",
            Self::Template => "prompt",
        }
    }

    /// Parse a class name
    ///
    /// Accepts the class names and their MCP equivalents
    /// ("tool", "resource", "prompt"), case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "action" | "tool" => Some(Self::Action),
            "readable_item" | "readableitem" | "resource" => Some(Self::ReadableItem),
            "template" | "prompt" => Some(Self::Template),
            _ => None,
        }
    }
}

impl FromStr for CapabilityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unknown capability class '{}'", s))
    }
}

impl fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Second namespace for readable items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemAddress {
    pub uri: String,
    /// Content-kind hint announced to the host
    pub mime_type: String,
}

/// Static metadata for one capability
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub schema: ArgumentSchema,
    pub address: Option<ItemAddress>,
}

impl CapabilityDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: ArgumentSchema::new(),
            address: None,
        }
    }

    pub fn with_schema(mut self, schema: ArgumentSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Address a readable item by URI
    pub fn at_uri(mut self, uri: impl Into<String>, mime_type: impl Into<String>) -> Self {
        self.address = Some(ItemAddress {
            uri: uri.into(),
            mime_type: mime_type.into(),
        });
        self
    }

    pub fn uri(&self) -> Option<&str> {
        self.address.as_ref().map(|a| a.uri.as_str())
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.address.as_ref().map(|a| a.mime_type.as_str())
    }

    /// The string requests use to route to this descriptor
    ///
    /// Readable items route by URI; everything else by name.
    pub fn routing_key(&self, class: CapabilityClass) -> Option<&str> {
        match class {
            CapabilityClass::ReadableItem => self.uri(),
            CapabilityClass::Action | CapabilityClass::Template => Some(&self.name),
        }
    }
}
