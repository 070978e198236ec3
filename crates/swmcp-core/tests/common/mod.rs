//! Mock providers shared by the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use swmcp_core::{
    ArgumentSchema, Arguments, ArgumentsExt, CapabilityClass, CapabilityDescriptor, CapabilityProvider,
    DispatchRouter, FieldType, Payload, ProviderFault, async_trait,
};

/// Actions that record how often they were invoked
#[derive(Default)]
pub struct TestActions {
    pub invocations: AtomicUsize,
}

#[async_trait]
impl CapabilityProvider for TestActions {
    fn class(&self) -> CapabilityClass {
        CapabilityClass::Action
    }

    fn list_descriptors(&self) -> Vec<CapabilityDescriptor> {
        vec![
            CapabilityDescriptor::new("echo", "Return the validated arguments").with_schema(
                ArgumentSchema::new()
                    .required("message", FieldType::String, "Text to echo")
                    .with_default("volume", FieldType::Integer, "Loudness", 3),
            ),
            CapabilityDescriptor::new("sleep", "Wait before answering").with_schema(
                ArgumentSchema::new().with_default("delay_ms", FieldType::Integer, "Delay", 50),
            ),
            CapabilityDescriptor::new("fail", "Always fails"),
            CapabilityDescriptor::new("explode", "Always panics"),
        ]
    }

    async fn invoke(&self, operation: &str, arguments: Arguments) -> Result<Payload, ProviderFault> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match operation {
            "echo" => Ok(Payload::Json(Value::Object(arguments))),
            "sleep" => {
                let delay = arguments.opt_u64_arg("delay_ms")?.unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(Payload::Json(json!({ "slept_ms": delay })))
            }
            "fail" => Err(ProviderFault::failed("backend unavailable")),
            "explode" => panic!("boom"),
            other => Err(ProviderFault::UnknownOperation(other.to_string())),
        }
    }
}

pub struct TestItems;

#[async_trait]
impl CapabilityProvider for TestItems {
    fn class(&self) -> CapabilityClass {
        CapabilityClass::ReadableItem
    }

    fn list_descriptors(&self) -> Vec<CapabilityDescriptor> {
        vec![
            CapabilityDescriptor::new("Status", "Test status")
                .at_uri("test://status", "application/json"),
            CapabilityDescriptor::new("Notes", "Plain notes").at_uri("test://notes", "text/plain"),
        ]
    }

    async fn invoke(&self, operation: &str, _arguments: Arguments) -> Result<Payload, ProviderFault> {
        match operation {
            "test://status" => Ok(Payload::Json(json!({ "status": "online" }))),
            "test://notes" => Ok(Payload::text("remember the milk")),
            other => Err(ProviderFault::UnknownOperation(other.to_string())),
        }
    }
}

pub struct TestTemplates;

#[async_trait]
impl CapabilityProvider for TestTemplates {
    fn class(&self) -> CapabilityClass {
        CapabilityClass::Template
    }

    fn list_descriptors(&self) -> Vec<CapabilityDescriptor> {
        vec![
            CapabilityDescriptor::new("greet", "Greeting prompt").with_schema(
                ArgumentSchema::new().required("name", FieldType::String, "Who to greet"),
            ),
        ]
    }

    async fn invoke(&self, operation: &str, arguments: Arguments) -> Result<Payload, ProviderFault> {
        match operation {
            "greet" => Ok(Payload::text(format!("Hello, {}!", arguments.str_arg("name")?))),
            other => Err(ProviderFault::UnknownOperation(other.to_string())),
        }
    }
}

/// A router over the three test providers; the actions are returned for counting
pub fn router() -> (DispatchRouter, Arc<TestActions>) {
    let actions = Arc::new(TestActions::default());
    let router = DispatchRouter::new(vec![
        actions.clone() as Arc<dyn CapabilityProvider>,
        Arc::new(TestItems),
        Arc::new(TestTemplates),
    ])
    .expect("test catalog is consistent");
    (router, actions)
}

pub fn args(value: Value) -> Arguments {
    value.as_object().cloned().expect("arguments must be an object")
}
