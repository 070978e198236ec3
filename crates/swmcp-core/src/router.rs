//! The dispatch router
//!
//! Turns `{class, operation, arguments}` triples into envelopes. Each
//! request walks `Received → Validating → Executing → Completed`; any
//! fault jumps straight to `Completed` with a failure envelope. There are
//! no retries at this layer.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt as _;
use serde_json::Value;

use crate::catalog::Catalog;
use crate::descriptor::CapabilityClass;
use crate::envelope::ResponseEnvelope;
use crate::error::{CatalogError, Fault};
use crate::provider::{Arguments, CapabilityProvider, Payload, ProviderFault};

/// One inbound invocation
///
/// Owned by the dispatch call that processes it and dropped once the
/// envelope exists.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub class: CapabilityClass,
    /// Name, or URI for readable items
    pub operation: String,
    pub arguments: Arguments,
}

impl InvocationRequest {
    pub fn new(class: CapabilityClass, operation: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            class,
            operation: operation.into(),
            arguments,
        }
    }

    /// Build a request from untyped transport fields
    ///
    /// `arguments` may be absent or `null` (no arguments) but must
    /// otherwise be an object.
    pub fn from_untyped(class: &str, operation: &Value, arguments: Option<&Value>) -> Result<Self, Fault> {
        let class = CapabilityClass::parse(class)
            .ok_or_else(|| Fault::MalformedRequest(format!("unknown capability class '{}'", class)))?;

        let operation = match operation {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::String(_) => {
                return Err(Fault::MalformedRequest("operation identifier is empty".to_string()));
            }
            Value::Null => {
                return Err(Fault::MalformedRequest("operation identifier is missing".to_string()));
            }
            _ => {
                return Err(Fault::MalformedRequest(
                    "operation identifier must be a string".to_string(),
                ));
            }
        };

        let arguments = match arguments {
            None | Some(Value::Null) => Arguments::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(Fault::MalformedRequest("arguments must be an object".to_string()));
            }
        };

        Ok(Self {
            class,
            operation,
            arguments,
        })
    }
}

/// Where a request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DispatchStage {
    Received,
    Validating,
    Executing,
    Completed,
}

impl DispatchStage {
    /// Legal transitions: one step forward, or straight to `Completed`
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::Validating)
                | (Self::Validating, Self::Executing)
                | (Self::Validating | Self::Executing, Self::Completed)
        )
    }
}

struct StageTracker<'a> {
    stage: DispatchStage,
    operation: &'a str,
}

impl StageTracker<'_> {
    fn advance(&mut self, next: DispatchStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal dispatch transition {:?} -> {:?}",
            self.stage,
            next
        );
        tracing::trace!(operation = self.operation, from = ?self.stage, to = ?next, "dispatch stage");
        self.stage = next;
    }
}

/// Routes requests to providers through the session catalog
///
/// Cheap to clone; clones share the same read-only catalog.
#[derive(Debug, Clone)]
pub struct DispatchRouter {
    catalog: Arc<Catalog>,
}

impl DispatchRouter {
    /// Build the router and its catalog from explicit provider instances
    pub fn new(providers: Vec<Arc<dyn CapabilityProvider>>) -> Result<Self, CatalogError> {
        let catalog = Catalog::build(&providers)?;
        Ok(Self {
            catalog: Arc::new(catalog),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Dispatch a request whose shape has not been checked yet
    ///
    /// Shape problems become failures before any field validation.
    pub async fn dispatch_untyped(
        &self,
        class: &str,
        operation: &Value,
        arguments: Option<&Value>,
    ) -> ResponseEnvelope {
        match InvocationRequest::from_untyped(class, operation, arguments) {
            Ok(request) => self.dispatch(request).await,
            Err(fault) => {
                let operation = operation.as_str().unwrap_or("<unknown>");
                tracing::debug!(operation, class, "malformed request: {}", fault);
                ResponseEnvelope::failure(operation, &fault)
            }
        }
    }

    /// Dispatch one request; always yields exactly one envelope
    pub async fn dispatch(&self, request: InvocationRequest) -> ResponseEnvelope {
        let started = Instant::now();
        let InvocationRequest {
            class,
            operation,
            arguments,
        } = request;

        let mut tracker = StageTracker {
            stage: DispatchStage::Received,
            operation: &operation,
        };
        let outcome = self.run(class, &operation, arguments, &mut tracker).await;
        tracker.advance(DispatchStage::Completed);

        let envelope = ResponseEnvelope::build(&operation, outcome);
        tracing::debug!(
            operation = operation.as_str(),
            class = class.as_str(),
            ok = envelope.is_success(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dispatch completed"
        );
        envelope
    }

    async fn run(
        &self,
        class: CapabilityClass,
        operation: &str,
        arguments: Arguments,
        tracker: &mut StageTracker<'_>,
    ) -> Result<Payload, Fault> {
        tracker.advance(DispatchStage::Validating);

        let entry = self
            .catalog
            .lookup(class, operation)
            .ok_or_else(|| Fault::UnknownOperation {
                class,
                identifier: operation.to_string(),
            })?;
        let arguments = entry.descriptor.schema.validate(arguments)?;

        tracker.advance(DispatchStage::Executing);

        // A panicking provider still has to produce an envelope.
        match AssertUnwindSafe(entry.provider.invoke(operation, arguments))
            .catch_unwind()
            .await
        {
            Ok(result) => result.map_err(Fault::from),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(operation, "provider panicked: {}", message);
                Err(Fault::Provider(ProviderFault::failed(format!(
                    "Provider panicked: {}",
                    message
                ))))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_transitions() {
        use DispatchStage::*;
        assert!(Received.can_advance_to(Validating));
        assert!(Validating.can_advance_to(Executing));
        assert!(Validating.can_advance_to(Completed));
        assert!(Executing.can_advance_to(Completed));
        // Validation can't be skipped
        assert!(!Received.can_advance_to(Executing));
        assert!(!Received.can_advance_to(Completed));
        assert!(!Completed.can_advance_to(Validating));
    }

    #[test]
    fn test_from_untyped_shapes() {
        let ok = InvocationRequest::from_untyped(
            "tool",
            &Value::String("convert_file".into()),
            Some(&serde_json::json!({"a": 1})),
        )
        .unwrap();
        assert_eq!(ok.class, CapabilityClass::Action);
        assert_eq!(ok.arguments["a"], 1);

        let no_args =
            InvocationRequest::from_untyped("prompt", &Value::String("p".into()), Some(&Value::Null)).unwrap();
        assert!(no_args.arguments.is_empty());

        assert!(matches!(
            InvocationRequest::from_untyped("gizmo", &Value::String("x".into()), None),
            Err(Fault::MalformedRequest(_))
        ));
        assert!(matches!(
            InvocationRequest::from_untyped("tool", &Value::Null, None),
            Err(Fault::MalformedRequest(_))
        ));
        assert!(matches!(
            InvocationRequest::from_untyped("tool", &Value::String("x".into()), Some(&serde_json::json!([1]))),
            Err(Fault::MalformedRequest(_))
        ));
    }
}
