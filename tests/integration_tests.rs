//! End-to-end integration tests: a real listener on an OS-assigned port,
//! driven through reqwest with the protocol crate's client helpers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use jrpc_protocol::{ClientError, ErrorCode, RpcError, decode_client_response, encode_client_request};
use jrpc_server::{DispatchContext, JsonCodec, RpcServer, Service};
use jrpc_transport::{TransportConfig, TransportServer};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Args {
    a: i64,
    b: i64,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Product {
    c: i64,
}

#[derive(Default)]
struct Arith {
    calls: AtomicUsize,
}

/// Start a server on a random port; returns the transport and the endpoint URL.
async fn start_test_server() -> (TransportServer, String) {
    let mut builder = RpcServer::builder();
    builder.register_codec(JsonCodec::new(), "application/json");
    builder.before(|ctx, _method, headers, _request| {
        let agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        ctx.with_value("user_agent", agent)
    });
    builder
        .register_service(
            Service::new(Arith::default())
                .method("Multiply", |arith: &Arith, args: Args| {
                    arith.calls.fetch_add(1, Ordering::Relaxed);
                    Ok::<_, RpcError>(Product { c: args.a * args.b })
                })
                .method0("Calls", |arith: &Arith| {
                    Ok::<_, RpcError>(arith.calls.load(Ordering::Relaxed))
                })
                .method_ctx0("Whoami", |_: &Arith, ctx: &DispatchContext| {
                    Ok::<_, RpcError>(json!({
                        "remoteAddr": ctx.value("remote_addr"),
                        "userAgent": ctx.value("user_agent"),
                    }))
                }),
        )
        .unwrap();

    let config = TransportConfig {
        port: 0,
        path: "/rpc".into(),
        ..TransportConfig::default()
    };
    let transport = TransportServer::start(config, Arc::new(builder.build()))
        .await
        .unwrap();
    let url = format!("http://127.0.0.1:{}/rpc", transport.port());
    (transport, url)
}

async fn call(url: &str, body: Vec<u8>) -> reqwest::Response {
    reqwest::Client::new()
        .post(url)
        .header("content-type", "application/json")
        .header("user-agent", "jrpc-tests")
        .body(body)
        .send()
        .await
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Request/response cycle
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn multiply_round_trip() {
    let (mut transport, url) = start_test_server().await;

    let body = encode_client_request("Arith.Multiply", &Args { a: 4, b: 2 }).unwrap();
    let resp = call(&url, body).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");

    let product: Product = decode_client_response(&resp.bytes().await.unwrap()).unwrap();
    assert_eq!(product, Product { c: 8 });

    transport.stop().await;
}

#[tokio::test]
async fn calls_share_one_receiver() {
    let (mut transport, url) = start_test_server().await;

    for _ in 0..3 {
        let body = encode_client_request("Arith.Multiply", &Args { a: 1, b: 1 }).unwrap();
        call(&url, body).await;
    }
    let body = encode_client_request("Arith.Calls", &json!({})).unwrap();
    let calls: usize = decode_client_response(&call(&url, body).await.bytes().await.unwrap()).unwrap();
    assert_eq!(calls, 3);

    transport.stop().await;
}

#[tokio::test]
async fn context_carries_peer_and_hook_values() {
    let (mut transport, url) = start_test_server().await;

    let body = encode_client_request("Arith.Whoami", &json!({})).unwrap();
    let info: Value = decode_client_response(&call(&url, body).await.bytes().await.unwrap()).unwrap();
    assert_eq!(info["userAgent"], "jrpc-tests");
    assert!(info["remoteAddr"].as_str().unwrap().starts_with("127.0.0.1:"));

    transport.stop().await;
}

#[tokio::test]
async fn unknown_method_decodes_as_rpc_error() {
    let (mut transport, url) = start_test_server().await;

    let body = encode_client_request("Arith.Divide", &Args::default()).unwrap();
    let resp = call(&url, body).await;
    assert_eq!(resp.status(), 200);

    let err = decode_client_response::<Value>(&resp.bytes().await.unwrap()).unwrap_err();
    let rpc = err.rpc_error().unwrap();
    assert_eq!(rpc.error_code(), ErrorCode::MethodNotFound);
    assert_eq!(rpc.message, "rpc: can't find method \"Arith.Divide\"");

    transport.stop().await;
}

#[tokio::test]
async fn notification_gets_empty_body() {
    let (mut transport, url) = start_test_server().await;

    let body = serde_json::to_vec(&json!({
        "jsonrpc": "2.0",
        "method": "Arith.Multiply",
        "params": {"A": 2, "B": 3},
    }))
    .unwrap();
    let resp = call(&url, body).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.bytes().await.unwrap().is_empty());

    transport.stop().await;
}

#[tokio::test]
async fn malformed_json_is_parse_error() {
    let (mut transport, url) = start_test_server().await;

    let resp = call(&url, b"{not json".to_vec()).await;
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"]["code"], -32700);
    assert!(json["id"].is_null());

    let err = decode_client_response::<Value>(&serde_json::to_vec(&json).unwrap()).unwrap_err();
    assert!(matches!(err, ClientError::Rpc(_)));

    transport.stop().await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Transport-level rejections
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_is_rejected_with_405() {
    let (mut transport, url) = start_test_server().await;

    let resp = reqwest::get(&url).await.unwrap();
    assert_eq!(resp.status(), 405);
    assert_eq!(resp.text().await.unwrap(), "rpc: POST method required, received GET");

    transport.stop().await;
}

#[tokio::test]
async fn unknown_content_type_is_rejected_with_415() {
    let (mut transport, url) = start_test_server().await;

    let resp = reqwest::Client::new()
        .post(&url)
        .header("content-type", "text/xml")
        .body("<call/>")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 415);
    assert_eq!(resp.text().await.unwrap(), "rpc: unrecognized Content-Type: text/xml");

    transport.stop().await;
}

#[tokio::test]
async fn health_endpoint_reports_methods() {
    let (mut transport, url) = start_test_server().await;

    let health_url = url.replace("/rpc", "/health");
    let json: Value = reqwest::get(&health_url).await.unwrap().json().await.unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["methods"], json!(["Arith.Calls", "Arith.Multiply", "Arith.Whoami"]));

    transport.stop().await;
}
