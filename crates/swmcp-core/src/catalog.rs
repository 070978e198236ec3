//! The session catalog
//!
//! Assembled once from every registered provider and read-only afterwards.
//! Each class keeps its descriptors in registration order (for the
//! announcement) plus an index from routing key to entry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::descriptor::{CapabilityClass, CapabilityDescriptor};
use crate::error::CatalogError;
use crate::provider::CapabilityProvider;
use crate::schema::PromptArgument;

/// A descriptor and the provider that executes it
#[derive(Clone)]
pub struct CatalogEntry {
    pub descriptor: CapabilityDescriptor,
    pub provider: Arc<dyn CapabilityProvider>,
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct ClassCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

/// Every capability the session offers, per class
#[derive(Debug, Default)]
pub struct Catalog {
    actions: ClassCatalog,
    items: ClassCatalog,
    templates: ClassCatalog,
}

impl Catalog {
    /// Build the catalog from the given providers
    ///
    /// Several providers may serve the same class; their descriptors are
    /// merged in registration order. Duplicate routing keys are rejected.
    pub fn build(providers: &[Arc<dyn CapabilityProvider>]) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();

        for provider in providers {
            let class = provider.class();
            for descriptor in provider.list_descriptors() {
                catalog.insert(class, descriptor, Arc::clone(provider))?;
            }
        }

        Ok(catalog)
    }

    fn insert(
        &mut self,
        class: CapabilityClass,
        descriptor: CapabilityDescriptor,
        provider: Arc<dyn CapabilityProvider>,
    ) -> Result<(), CatalogError> {
        let Some(key) = descriptor.routing_key(class).map(str::to_string) else {
            return Err(CatalogError::MissingUri {
                name: descriptor.name,
            });
        };

        let target = self.class_mut(class);
        if target.index.contains_key(&key) {
            return Err(match class {
                CapabilityClass::ReadableItem => CatalogError::DuplicateUri { uri: key },
                CapabilityClass::Action | CapabilityClass::Template => {
                    CatalogError::DuplicateName { class, name: key }
                }
            });
        }

        target.index.insert(key, target.entries.len());
        target.entries.push(CatalogEntry {
            descriptor,
            provider,
        });
        Ok(())
    }

    fn class_ref(&self, class: CapabilityClass) -> &ClassCatalog {
        match class {
            CapabilityClass::Action => &self.actions,
            CapabilityClass::ReadableItem => &self.items,
            CapabilityClass::Template => &self.templates,
        }
    }

    fn class_mut(&mut self, class: CapabilityClass) -> &mut ClassCatalog {
        match class {
            CapabilityClass::Action => &mut self.actions,
            CapabilityClass::ReadableItem => &mut self.items,
            CapabilityClass::Template => &mut self.templates,
        }
    }

    /// Exact-match lookup by name (or URI for readable items)
    pub fn lookup(&self, class: CapabilityClass, identifier: &str) -> Option<&CatalogEntry> {
        let catalog = self.class_ref(class);
        catalog
            .index
            .get(identifier)
            .and_then(|&i| catalog.entries.get(i))
    }

    /// Descriptors of one class in announcement order
    pub fn descriptors(&self, class: CapabilityClass) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.class_ref(class).entries.iter().map(|e| &e.descriptor)
    }

    pub fn len(&self, class: CapabilityClass) -> usize {
        self.class_ref(class).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        CapabilityClass::ALL.iter().all(|&c| self.len(c) == 0)
    }

    /// The catalog as announced to the host
    pub fn announcement(&self) -> CatalogAnnouncement {
        CatalogAnnouncement {
            tools: self
                .descriptors(CapabilityClass::Action)
                .map(|d| ActionEntry {
                    name: d.name.clone(),
                    description: d.description.clone(),
                    input_schema: d.schema.to_json_schema(),
                })
                .collect(),
            resources: self
                .descriptors(CapabilityClass::ReadableItem)
                .filter_map(|d| {
                    let address = d.address.as_ref()?;
                    Some(ItemEntry {
                        uri: address.uri.clone(),
                        name: d.name.clone(),
                        description: d.description.clone(),
                        mime_type: address.mime_type.clone(),
                    })
                })
                .collect(),
            prompts: self
                .descriptors(CapabilityClass::Template)
                .map(|d| TemplateEntry {
                    name: d.name.clone(),
                    description: d.description.clone(),
                    arguments: d.schema.to_prompt_arguments(),
                })
                .collect(),
        }
    }
}

/// Announced action
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEntry {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Announced readable item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEntry {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
}

/// Announced template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateEntry {
    pub name: String,
    pub description: String,
    pub arguments: Vec<PromptArgument>,
}

/// The three catalog lists, in MCP field names
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogAnnouncement {
    pub tools: Vec<ActionEntry>,
    pub resources: Vec<ItemEntry>,
    pub prompts: Vec<TemplateEntry>,
}
