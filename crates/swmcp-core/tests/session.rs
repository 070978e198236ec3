//! End-to-end session tests over an in-memory channel

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

mod common;

use std::collections::HashSet;
use std::io;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::{Value, json};
use swmcp_core::{DispatchRouter, ErrorCode, SessionCoordinator, SessionError, SessionSummary, implementation};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadBuf,
    ReadHalf, WriteHalf,
};
use tokio::task::JoinHandle;

/// The host side of a running session
struct Host {
    writer: WriteHalf<DuplexStream>,
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    session: JoinHandle<Result<SessionSummary, SessionError>>,
}

impl Host {
    fn start(router: DispatchRouter) -> Self {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (server_read, server_write) = tokio::io::split(server);
        let coordinator = SessionCoordinator::new(router, implementation("swmcp-test", "0.0.0"));
        let session = tokio::spawn(coordinator.run(BufReader::new(server_read), server_write));

        let (client_read, writer) = tokio::io::split(client);
        Self {
            writer,
            lines: BufReader::new(client_read).lines(),
            session,
        }
    }

    async fn send(&mut self, message: Value) {
        self.send_raw(&message.to_string()).await;
    }

    async fn send_raw(&mut self, line: &str) {
        self.send_bytes(line.as_bytes()).await;
    }

    async fn send_bytes(&mut self, line: &[u8]) {
        self.writer.write_all(line).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a response")
            .unwrap()
            .expect("channel closed");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, id: Value, method: &str, params: Value) -> Value {
        self.send(json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await;
        self.recv().await
    }

    async fn initialize(&mut self) -> Value {
        let response = self
            .request(
                json!(0),
                "initialize",
                json!({
                    "protocolVersion": "2025-03-26",
                    "capabilities": {},
                    "clientInfo": { "name": "test-host", "version": "1.0" },
                }),
            )
            .await;
        self.send(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
            .await;
        response
    }

    async fn close(mut self) -> SessionSummary {
        self.writer.shutdown().await.unwrap();
        let summary = self.session.await.unwrap().unwrap();
        // Nothing is written after teardown
        assert!(self.lines.next_line().await.unwrap().is_none());
        summary
    }
}

fn call(name: &str, arguments: Value) -> Value {
    json!({ "name": name, "arguments": arguments })
}

#[tokio::test]
async fn handshake_and_listing() {
    let (router, _) = common::router();
    let mut host = Host::start(router);

    let init = host.initialize().await;
    assert_eq!(init["id"], 0);
    assert_eq!(init["result"]["protocolVersion"], "2025-03-26");
    assert_eq!(init["result"]["serverInfo"]["name"], "swmcp-test");
    assert!(init["result"]["capabilities"]["tools"].is_object());
    assert!(init["result"]["capabilities"]["resources"].is_object());
    assert!(init["result"]["capabilities"]["prompts"].is_object());

    let tools = host.request(json!(1), "tools/list", json!({})).await;
    assert_eq!(tools["result"]["tools"][0]["name"], "echo");
    assert_eq!(tools["result"]["tools"][0]["inputSchema"]["type"], "object");

    let resources = host.request(json!(2), "resources/list", json!({})).await;
    assert_eq!(resources["result"]["resources"][0]["uri"], "test://status");

    let prompts = host.request(json!(3), "prompts/list", json!({})).await;
    assert_eq!(prompts["result"]["prompts"][0]["arguments"][0]["required"], true);

    let again = host.request(json!(4), "initialize", json!({})).await;
    assert_eq!(again["error"]["code"], ErrorCode::INVALID_REQUEST.0);

    let summary = host.close().await;
    assert_eq!(summary.requests, 5);
    assert_eq!(summary.notifications, 1);
    assert_eq!(summary.invocations, 0);
}

#[tokio::test]
async fn invocation_before_initialize_is_rejected() {
    let (router, actions) = common::router();
    let mut host = Host::start(router);

    let response = host
        .request(json!(1), "tools/call", call("echo", json!({ "message": "early" })))
        .await;
    assert_eq!(response["id"], 1);
    assert_eq!(response["error"]["code"], ErrorCode::INVALID_REQUEST.0);
    assert_eq!(actions.invocations.load(Ordering::SeqCst), 0);

    host.close().await;
}

#[tokio::test]
async fn request_ids_round_trip() {
    let (router, _) = common::router();
    let mut host = Host::start(router);
    host.initialize().await;

    let numeric = host
        .request(json!(42), "tools/call", call("echo", json!({ "message": "n" })))
        .await;
    assert_eq!(numeric["id"], json!(42));

    let text = host
        .request(json!("req-7"), "tools/call", call("echo", json!({ "message": "s" })))
        .await;
    assert_eq!(text["id"], json!("req-7"));
    assert_eq!(text["result"]["structuredContent"]["message"], "s");

    host.close().await;
}

#[tokio::test]
async fn tool_faults_map_to_results_and_errors() {
    let (router, actions) = common::router();
    let mut host = Host::start(router);
    host.initialize().await;

    // Validation: protocol error, provider untouched
    let missing = host.request(json!(1), "tools/call", call("echo", json!({}))).await;
    assert_eq!(missing["error"]["code"], ErrorCode::INVALID_PARAMS.0);
    assert_eq!(missing["error"]["data"]["ok"], false);
    assert_eq!(missing["error"]["data"]["operation"], "echo");
    assert_eq!(actions.invocations.load(Ordering::SeqCst), 0);

    let unknown = host.request(json!(2), "tools/call", call("nope", json!({}))).await;
    assert_eq!(unknown["error"]["code"], ErrorCode::INVALID_PARAMS.0);
    assert_eq!(unknown["error"]["message"], "Unknown tool: nope");

    // Provider faults stay visible to the model
    let failed = host.request(json!(3), "tools/call", call("fail", json!({}))).await;
    assert_eq!(failed["result"]["isError"], true);
    assert_eq!(failed["result"]["content"][0]["text"], "backend unavailable");

    let panicked = host.request(json!(4), "tools/call", call("explode", json!({}))).await;
    assert_eq!(panicked["result"]["isError"], true);

    // The session survived all of the above
    let pong = host.request(json!(5), "ping", json!({})).await;
    assert_eq!(pong["result"], json!({}));

    host.close().await;
}

#[tokio::test]
async fn resources_and_prompts() {
    let (router, _) = common::router();
    let mut host = Host::start(router);
    host.initialize().await;

    let status = host
        .request(json!(1), "resources/read", json!({ "uri": "test://status" }))
        .await;
    let content = &status["result"]["contents"][0];
    assert_eq!(content["mimeType"], "application/json");
    let parsed: Value = serde_json::from_str(content["text"].as_str().unwrap()).unwrap();
    assert_eq!(parsed["status"], "online");

    let notes = host
        .request(json!(2), "resources/read", json!({ "uri": "test://notes" }))
        .await;
    assert_eq!(notes["result"]["contents"][0]["text"], "remember the milk");
    assert_eq!(notes["result"]["contents"][0]["mimeType"], "text/plain");

    let unknown = host
        .request(json!(3), "resources/read", json!({ "uri": "test://missing" }))
        .await;
    assert_eq!(unknown["error"]["code"], ErrorCode::RESOURCE_NOT_FOUND.0);

    let prompt = host
        .request(json!(4), "prompts/get", call("greet", json!({ "name": "Ada" })))
        .await;
    assert_eq!(prompt["result"]["messages"][0]["content"]["text"], "Hello, Ada!");

    let no_name = host.request(json!(5), "prompts/get", call("greet", json!({}))).await;
    assert_eq!(no_name["error"]["code"], ErrorCode::INVALID_PARAMS.0);

    host.close().await;
}

#[tokio::test]
async fn malformed_lines_do_not_end_the_session() {
    let (router, _) = common::router();
    let mut host = Host::start(router);

    host.send_raw("{ this is not json").await;
    let parse = host.recv().await;
    assert_eq!(parse["id"], Value::Null);
    assert_eq!(parse["error"]["code"], ErrorCode::PARSE_ERROR.0);

    host.send(json!({ "jsonrpc": "2.0", "id": 9, "method": 17 })).await;
    let shape = host.recv().await;
    assert_eq!(shape["id"], 9);
    assert_eq!(shape["error"]["code"], ErrorCode::INVALID_REQUEST.0);

    let unknown = host.request(json!(10), "tools/frobnicate", json!({})).await;
    assert_eq!(unknown["error"]["code"], ErrorCode::METHOD_NOT_FOUND.0);

    // Blank lines are skipped
    host.send_raw("").await;
    let pong = host.request(json!(11), "ping", Value::Null).await;
    assert_eq!(pong["id"], 11);

    host.close().await;
}

#[tokio::test]
async fn invalid_utf8_is_a_parse_error() {
    let (router, _) = common::router();
    let mut host = Host::start(router);

    host.send_bytes(b"\xff\xfe{\"jsonrpc\":\"2.0\"}").await;
    let parse = host.recv().await;
    assert_eq!(parse["id"], Value::Null);
    assert_eq!(parse["error"]["code"], ErrorCode::PARSE_ERROR.0);

    // Invalid bytes inside an otherwise well-formed string
    host.send_bytes(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"pi\xffng\"}").await;
    let parse = host.recv().await;
    assert_eq!(parse["error"]["code"], ErrorCode::PARSE_ERROR.0);

    let pong = host.request(json!(2), "ping", json!({})).await;
    assert_eq!(pong["id"], 2);
    assert_eq!(pong["result"], json!({}));

    host.close().await;
}

#[tokio::test]
async fn unsolicited_responses_are_dropped() {
    let (router, _) = common::router();
    let mut host = Host::start(router);

    host.send(json!({ "jsonrpc": "2.0", "id": 40, "result": {} })).await;
    host.send(json!({ "jsonrpc": "2.0", "error": { "code": -1, "message": "no id" } }))
        .await;

    // The next line out answers the ping, nothing was sent for the strays
    let pong = host.request(json!(41), "ping", json!({})).await;
    assert_eq!(pong["id"], 41);
    assert_eq!(pong["result"], json!({}));

    host.close().await;
}

#[tokio::test]
async fn duplicate_in_flight_id_is_rejected() {
    let (router, actions) = common::router();
    let mut host = Host::start(router);
    host.initialize().await;

    host.send(json!({
        "jsonrpc": "2.0", "id": 7, "method": "tools/call",
        "params": call("sleep", json!({ "delay_ms": 300 })),
    }))
    .await;
    let duplicate = host
        .request(json!(7), "tools/call", call("echo", json!({ "message": "twin" })))
        .await;
    assert_eq!(duplicate["id"], 7);
    assert_eq!(duplicate["error"]["code"], ErrorCode::INVALID_REQUEST.0);

    // The original request still completes, exactly once
    let original = host.recv().await;
    assert_eq!(original["id"], 7);
    assert_eq!(original["result"]["structuredContent"]["slept_ms"], 300);

    // Once answered, the id is free again
    let reused = host
        .request(json!(7), "tools/call", call("echo", json!({ "message": "again" })))
        .await;
    assert_eq!(reused["result"]["structuredContent"]["message"], "again");
    assert_eq!(actions.invocations.load(Ordering::SeqCst), 2);

    let summary = host.close().await;
    assert_eq!(summary.invocations, 2);
}

#[tokio::test]
async fn concurrent_requests_get_unique_responses() {
    let (router, actions) = common::router();
    let mut host = Host::start(router);
    host.initialize().await;

    for id in 1..=20 {
        host.send(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": call("echo", json!({ "message": format!("m{id}") })),
        }))
        .await;
    }

    let mut seen = HashSet::new();
    for _ in 0..20 {
        let response = host.recv().await;
        let id = response["id"].as_i64().unwrap();
        assert_eq!(
            response["result"]["structuredContent"]["message"],
            format!("m{id}")
        );
        assert!(seen.insert(id), "duplicate response for id {id}");
    }
    assert_eq!(seen, (1..=20).collect::<HashSet<_>>());
    assert_eq!(actions.invocations.load(Ordering::SeqCst), 20);

    let summary = host.close().await;
    assert_eq!(summary.invocations, 20);
}

#[tokio::test]
async fn responses_follow_completion_order() {
    let (router, _) = common::router();
    let mut host = Host::start(router);
    host.initialize().await;

    host.send(json!({
        "jsonrpc": "2.0", "id": "slow", "method": "tools/call",
        "params": call("sleep", json!({ "delay_ms": 300 })),
    }))
    .await;
    host.send(json!({
        "jsonrpc": "2.0", "id": "fast", "method": "tools/call",
        "params": call("echo", json!({ "message": "quick" })),
    }))
    .await;

    assert_eq!(host.recv().await["id"], "fast");
    let slow = host.recv().await;
    assert_eq!(slow["id"], "slow");
    assert_eq!(slow["result"]["structuredContent"]["slept_ms"], 300);

    host.close().await;
}

#[tokio::test]
async fn cancelled_request_is_never_answered() {
    let (router, _) = common::router();
    let mut host = Host::start(router);
    host.initialize().await;

    host.send(json!({
        "jsonrpc": "2.0", "id": 7, "method": "tools/call",
        "params": call("sleep", json!({ "delay_ms": 10_000 })),
    }))
    .await;
    host.send(json!({
        "jsonrpc": "2.0",
        "method": "notifications/cancelled",
        "params": { "requestId": 7, "reason": "user aborted" },
    }))
    .await;

    let pong = host.request(json!(8), "ping", json!({})).await;
    assert_eq!(pong["id"], 8);

    let summary = host.close().await;
    assert_eq!(summary.cancelled, 1);
    assert_eq!(summary.abandoned, 0);
}

#[tokio::test]
async fn closing_the_channel_abandons_in_flight_work() {
    let (router, _) = common::router();
    let mut host = Host::start(router);
    host.initialize().await;

    host.send(json!({
        "jsonrpc": "2.0", "id": 1, "method": "tools/call",
        "params": call("sleep", json!({ "delay_ms": 10_000 })),
    }))
    .await;

    // Give the loop a moment to spawn the invocation
    tokio::time::sleep(Duration::from_millis(50)).await;

    let summary = host.close().await;
    assert_eq!(summary.invocations, 1);
    assert_eq!(summary.abandoned, 1);
}

/// A writer whose peer has gone away
struct BrokenPipe;

impl AsyncWrite for BrokenPipe {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// A reader whose connection was reset
struct ResetReader;

impl AsyncRead for ResetReader {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::ErrorKind::ConnectionReset.into()))
    }
}

fn coordinator() -> SessionCoordinator {
    let (router, _) = common::router();
    SessionCoordinator::new(router, implementation("swmcp-test", "0.0.0"))
}

#[tokio::test]
async fn write_failure_ends_the_session() {
    let input: &[u8] = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n";
    let result = coordinator().run(BufReader::new(input), BrokenPipe).await;

    match result {
        Err(SessionError::Write(e)) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("expected a write failure, got {other:?}"),
    }
}

#[tokio::test]
async fn read_failure_ends_the_session() {
    let input: &[u8] = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n";
    let reader = BufReader::new(input.chain(ResetReader));
    let result = coordinator().run(reader, tokio::io::sink()).await;

    match result {
        Err(SessionError::Read(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
        other => panic!("expected a read failure, got {other:?}"),
    }
}
