//! Fake JSON-RPC endpoint for exercising the real aria2 client over HTTP.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub struct RpcServer {
    /// `http://127.0.0.1:<port>/jsonrpc`
    pub endpoint: String,
    requests: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl RpcServer {
    /// Request bodies received so far, parsed.
    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.requests.lock().unwrap().clone()
    }
}

/// One canned reply per request, in order; the last repeats.
/// A reply is `(status line, body)`; `{id}` in the body is replaced with the request id.
pub fn start(replies: Vec<(&'static str, String)>) -> RpcServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&requests);
    thread::spawn(move || {
        let mut replies = replies.into_iter().collect::<std::collections::VecDeque<_>>();
        for stream in listener.incoming().flatten() {
            let reply = if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies.front().cloned().unwrap()
            };
            handle(stream, reply, &seen);
        }
    });
    RpcServer {
        endpoint: format!("http://127.0.0.1:{}/jsonrpc", port),
        requests,
    }
}

/// An endpoint nothing listens on.
pub fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/jsonrpc", port)
}

fn handle(
    mut stream: TcpStream,
    (status, body): (&'static str, String),
    seen: &Mutex<Vec<serde_json::Value>>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let Some(request) = read_body(&mut stream) else {
        return;
    };
    let parsed: serde_json::Value = serde_json::from_slice(&request).unwrap_or_default();
    let id = parsed["id"].as_str().unwrap_or("").to_string();
    seen.lock().unwrap().push(parsed);

    let body = body.replace("{id}", &id);
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

/// Reads headers, then exactly `Content-Length` body bytes.
fn read_body(stream: &mut TcpStream) -> Option<Vec<u8>> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
        let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&data[..end]).to_string();
        let length: usize = head
            .lines()
            .filter_map(|l| l.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse().ok())
            .unwrap_or(0);
        let body_start = end + 4;
        while data.len() < body_start + length {
            let n = stream.read(&mut buf).ok()?;
            if n == 0 {
                return None;
            }
            data.extend_from_slice(&buf[..n]);
        }
        return Some(data[body_start..body_start + length].to_vec());
    }
}
