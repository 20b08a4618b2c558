//! A wiremock-backed stand-in for the aria2 JSON-RPC endpoint.

use serde_json::{Value, json};
use superdownload_core::RpcSettings;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::socket_guard::start_mock_server_or_skip;

pub const JSONRPC_PATH: &str = "/jsonrpc";

/// Starts a fake daemon that answers `aria2.getVersion`, or `None` when
/// sockets are unavailable.
pub async fn start_fake_daemon() -> Option<MockServer> {
    let server = start_mock_server_or_skip().await?;
    respond_to(&server, "aria2.getVersion", json!({"version": "1.37.0", "enabledFeatures": []})).await;
    Some(server)
}

/// Settings pointing a client at `server`.
#[must_use]
pub fn settings_for(server: &MockServer) -> RpcSettings {
    let address = server.address();
    RpcSettings {
        host: format!("http://{}", address.ip()),
        port: address.port(),
        ..RpcSettings::default()
    }
}

/// Answers every call to `rpc_method` with `result`.
pub async fn respond_to(server: &MockServer, rpc_method: &str, result: Value) {
    Mock::given(method("POST"))
        .and(path(JSONRPC_PATH))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "result": result,
        })))
        .mount(server)
        .await;
}

/// Answers calls to `rpc_method` for `gid` with `result`.
pub async fn respond_to_gid(server: &MockServer, rpc_method: &str, gid: &str, result: Value) {
    Mock::given(method("POST"))
        .and(path(JSONRPC_PATH))
        .and(body_partial_json(json!({ "method": rpc_method, "params": [gid] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "result": result,
        })))
        .mount(server)
        .await;
}

/// Fails every call to `rpc_method` the way aria2 does: HTTP 400 with an error body.
pub async fn fault_on(server: &MockServer, rpc_method: &str, message: &str) {
    Mock::given(method("POST"))
        .and(path(JSONRPC_PATH))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "error": { "code": 1, "message": message },
        })))
        .mount(server)
        .await;
}

/// A `tellStatus` result in aria2's string-encoded shape.
#[must_use]
pub fn tell_status(gid: &str, status: &str, completed: u64, total: u64, speed: u64) -> Value {
    json!({
        "gid": gid,
        "status": status,
        "completedLength": completed.to_string(),
        "totalLength": total.to_string(),
        "downloadSpeed": speed.to_string(),
        "files": [{ "path": format!("/downloads/{gid}.bin") }],
    })
}

/// Names of the RPC methods the fake daemon has received, in order.
pub async fn received_methods(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|request| {
            serde_json::from_slice::<Value>(&request.body)
                .ok()
                .and_then(|body| body["method"].as_str().map(str::to_string))
        })
        .collect()
}
