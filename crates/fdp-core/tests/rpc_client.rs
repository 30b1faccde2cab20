//! Integration tests: the aria2 JSON-RPC client against a canned HTTP endpoint.

mod common;

use std::time::Duration;

use common::rpc_server;
use fdp_core::retry::RetryPolicy;
use fdp_core::rpc::{Aria2Client, DownloaderRpc, RpcError};

fn client(endpoint: &str) -> Aria2Client {
    Aria2Client::new(
        endpoint,
        Duration::from_secs(5),
        RetryPolicy::fixed(3, Duration::from_millis(10)),
    )
}

fn ok(result: &str) -> (&'static str, String) {
    (
        "200 OK",
        format!(r#"{{"id":"{{id}}","jsonrpc":"2.0","result":{}}}"#, result),
    )
}

#[test]
fn add_uri_sends_nested_uri_list() {
    let server = rpc_server::start(vec![ok(r#""2089b05ecca3d829""#)]);
    let gid = client(&server.endpoint)
        .add_uri("magnet:?xt=urn:btih:abc")
        .unwrap();
    assert_eq!(gid, "2089b05ecca3d829");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req["jsonrpc"], "2.0");
    assert_eq!(req["method"], "aria2.addUri");
    assert_eq!(req["params"], serde_json::json!([["magnet:?xt=urn:btih:abc"]]));
    assert!(req["id"].as_str().unwrap().starts_with("fdp-"));
}

#[test]
fn tell_status_reads_numbers_sent_as_strings() {
    let server = rpc_server::start(vec![ok(
        r#"{"gid":"g1","status":"active","totalLength":"1000","completedLength":"250",
            "downloadSpeed":"50","files":[{"path":"/srv/dl/a.iso","length":"1000","completedLength":"250"}]}"#,
    )]);
    let status = client(&server.endpoint).tell_status("g1").unwrap();
    assert_eq!(status.status, "active");
    assert_eq!(status.total_length, 1000);
    assert_eq!(status.completed_length, 250);
    assert_eq!(status.first_file_path(), Some("/srv/dl/a.iso"));
    assert!(!status.is_complete());
    assert_eq!(server.requests()[0]["params"], serde_json::json!(["g1"]));
}

#[test]
fn daemon_rejection_is_not_retried() {
    let server = rpc_server::start(vec![(
        "200 OK",
        r#"{"id":"{id}","jsonrpc":"2.0","error":{"code":1,"message":"GID g9 is not found"}}"#
            .to_string(),
    )]);
    let err = client(&server.endpoint).tell_status("g9").unwrap_err();
    match err {
        RpcError::Rpc { code, message } => {
            assert_eq!(code, 1);
            assert!(message.contains("g9"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn server_error_is_retried() {
    let server = rpc_server::start(vec![
        ("500 Internal Server Error", String::new()),
        ok(r#""g2""#),
    ]);
    let gid = client(&server.endpoint).add_torrent("ZDg6YW5ub3VuY2UzOmZvbw==").unwrap();
    assert_eq!(gid, "g2");
    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1]["method"], "aria2.addTorrent");
    assert_eq!(requests[1]["params"], serde_json::json!(["ZDg6YW5ub3VuY2UzOmZvbw=="]));
    // retries resend the same request
    assert_eq!(requests[0]["id"], requests[1]["id"]);
}

#[test]
fn unreachable_daemon_is_a_transport_error() {
    let err = client(&rpc_server::closed_endpoint())
        .add_uri("magnet:?xt=urn:btih:abc")
        .unwrap_err();
    assert!(matches!(err, RpcError::Transport(_)), "{err}");
}

#[test]
fn remove_requires_ok_answer() {
    let server = rpc_server::start(vec![ok(r#""OK""#), ok(r#""nope""#)]);
    let client = client(&server.endpoint);
    client.remove_download_result("g1").unwrap();
    let err = client.remove_download_result("g1").unwrap_err();
    assert!(matches!(err, RpcError::Malformed(_)), "{err}");
    assert_eq!(server.requests()[0]["method"], "aria2.removeDownloadResult");
}
