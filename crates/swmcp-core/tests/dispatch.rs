//! Integration tests for catalog assembly and the dispatch router

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

mod common;

use std::sync::atomic::Ordering;

use serde_json::{Value, json};
use swmcp_core::{CapabilityClass, CapabilityProvider, FaultKind, InvocationRequest, Payload};

use common::{TestActions, args, router};

#[tokio::test]
async fn missing_required_field_never_reaches_provider() {
    let (router, actions) = router();

    let envelope = router
        .dispatch(InvocationRequest::new(CapabilityClass::Action, "echo", args(json!({}))))
        .await;

    assert_eq!(envelope.fault_kind(), Some(FaultKind::Validation));
    assert_eq!(
        envelope.failure_message(),
        Some("Missing required argument: message")
    );
    assert_eq!(envelope.to_wire()["operation"], "echo");
    assert_eq!(actions.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn null_required_field_counts_as_missing() {
    let (router, actions) = router();

    let envelope = router
        .dispatch(InvocationRequest::new(
            CapabilityClass::Action,
            "echo",
            args(json!({ "message": null })),
        ))
        .await;

    assert_eq!(envelope.fault_kind(), Some(FaultKind::Validation));
    assert_eq!(actions.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn defaults_are_filled_and_extras_pass_through() {
    let (router, _) = router();

    let envelope = router
        .dispatch(InvocationRequest::new(
            CapabilityClass::Action,
            "echo",
            args(json!({ "message": "hi", "extra": true })),
        ))
        .await;

    let payload = envelope.payload().and_then(Payload::as_json).unwrap();
    assert_eq!(payload, &json!({ "message": "hi", "volume": 3, "extra": true }));
}

#[tokio::test]
async fn unknown_identifiers_for_every_class() {
    let (router, actions) = router();

    let cases = [
        (CapabilityClass::Action, "nope", "Unknown tool: nope"),
        (CapabilityClass::ReadableItem, "test://nope", "Unknown resource URI: test://nope"),
        (CapabilityClass::Template, "nope", "Unknown prompt: nope"),
    ];

    for (class, id, message) in cases {
        let envelope = router
            .dispatch(InvocationRequest::new(class, id, args(json!({}))))
            .await;
        assert_eq!(envelope.fault_kind(), Some(FaultKind::UnknownOperation));
        assert_eq!(envelope.failure_message(), Some(message));
    }
    assert_eq!(actions.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn identifiers_do_not_cross_classes() {
    let (router, _) = router();

    // "greet" is a template, not an action
    let envelope = router
        .dispatch(InvocationRequest::new(
            CapabilityClass::Action,
            "greet",
            args(json!({ "name": "x" })),
        ))
        .await;
    assert_eq!(envelope.failure_message(), Some("Unknown tool: greet"));
}

#[tokio::test]
async fn provider_faults_and_panics_become_failures() {
    let (router, _) = router();

    let failed = router
        .dispatch(InvocationRequest::new(CapabilityClass::Action, "fail", args(json!({}))))
        .await;
    assert_eq!(failed.fault_kind(), Some(FaultKind::Provider));
    assert_eq!(
        failed.to_wire(),
        json!({ "ok": false, "error": "backend unavailable", "operation": "fail" })
    );

    let panicked = router
        .dispatch(InvocationRequest::new(CapabilityClass::Action, "explode", args(json!({}))))
        .await;
    assert_eq!(panicked.fault_kind(), Some(FaultKind::Provider));
    assert_eq!(panicked.failure_message(), Some("Provider panicked: boom"));

    // The router is still usable afterwards
    let ok = router
        .dispatch(InvocationRequest::new(CapabilityClass::Action, "echo", args(json!({ "message": "m" }))))
        .await;
    assert!(ok.is_success());
}

#[tokio::test]
async fn malformed_untyped_requests_are_rejected_before_lookup() {
    let (router, actions) = router();

    let bad_args = router
        .dispatch_untyped("action", &json!("echo"), Some(&json!(["message"])))
        .await;
    assert_eq!(bad_args.fault_kind(), Some(FaultKind::MalformedRequest));

    let bad_class = router.dispatch_untyped("widget", &json!("echo"), None).await;
    assert_eq!(bad_class.fault_kind(), Some(FaultKind::MalformedRequest));

    let no_operation = router.dispatch_untyped("tool", &Value::Null, None).await;
    assert_eq!(no_operation.to_wire()["operation"], "<unknown>");

    assert_eq!(actions.invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn readable_items_and_templates_dispatch() {
    let (router, _) = router();

    let status = router.dispatch_untyped("resource", &json!("test://status"), None).await;
    assert_eq!(
        status.payload().and_then(Payload::as_json),
        Some(&json!({ "status": "online" }))
    );

    let prompt = router
        .dispatch_untyped("prompt", &json!("greet"), Some(&json!({ "name": "Ada" })))
        .await;
    assert_eq!(prompt.payload().and_then(Payload::as_text), Some("Hello, Ada!"));
}

#[tokio::test]
async fn concurrent_dispatches_get_their_own_envelopes() {
    let (router, actions) = router();

    let calls = (0..16).map(|i| {
        let router = router.clone();
        async move {
            let envelope = router
                .dispatch(InvocationRequest::new(
                    CapabilityClass::Action,
                    "echo",
                    args(json!({ "message": format!("m{i}") })),
                ))
                .await;
            (i, envelope)
        }
    });

    for (i, envelope) in futures::future::join_all(calls).await {
        let payload = envelope.payload().and_then(Payload::as_json).unwrap();
        assert_eq!(payload["message"], format!("m{i}"));
    }
    assert_eq!(actions.invocations.load(Ordering::SeqCst), 16);
}

#[test]
fn descriptor_listing_is_stable() {
    let provider = TestActions::default();
    assert_eq!(provider.list_descriptors(), provider.list_descriptors());

    let (router, _) = router();
    let first = router.catalog().announcement();
    let second = router.catalog().announcement();
    assert_eq!(first, second);

    let names: Vec<_> = first.tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["echo", "sleep", "fail", "explode"]);
    assert_eq!(first.tools[0].input_schema["required"], json!(["message"]));
    assert_eq!(first.resources.len(), 2);
    assert_eq!(first.prompts[0].arguments[0].name, "name");
}
