//! curl-backed aria2 JSON-RPC client.

use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::types::{RpcRequest, RpcResponse, TellStatus};
use super::{DownloaderRpc, RpcError};
use crate::config::DaemonConfig;
use crate::retry::{classify_curl_error, classify_http_status, run_with_retry, RetryPolicy};

/// Blocking JSON-RPC client. Call from a worker thread (`spawn_blocking`).
#[derive(Debug)]
pub struct Aria2Client {
    endpoint: String,
    timeout: Duration,
    retry: RetryPolicy,
    next_id: AtomicU64,
}

/// Failure of a single POST, before the retry loop decides what to do.
#[derive(Debug)]
enum AttemptError {
    Curl(curl::Error),
    Status(u32),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::Curl(e) => write!(f, "{} (is aria2c running?)", e),
            AttemptError::Status(code) => write!(f, "HTTP {}", code),
        }
    }
}

impl Aria2Client {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            retry,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(cfg: &DaemonConfig) -> Self {
        Self::new(
            cfg.endpoint(),
            Duration::from_secs(cfg.rpc_timeout_secs),
            cfg.retry.policy(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Calls `method` and decodes the `result` member into `T`.
    pub fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        let id = format!("fdp-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            id: id.clone(),
            params,
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| RpcError::Malformed(format!("encode request: {}", e)))?;

        let raw = run_with_retry(
            &self.retry,
            |e: &AttemptError| match e {
                AttemptError::Curl(e) => classify_curl_error(e),
                AttemptError::Status(code) => classify_http_status(*code),
            },
            || self.post(&body),
        )
        .map_err(|e| match e {
            AttemptError::Curl(e) => RpcError::Transport(e.to_string()),
            AttemptError::Status(code) => RpcError::HttpStatus(code),
        })?;

        tracing::trace!(method, %id, bytes = raw.len(), "rpc response");
        decode_response(&raw, &id)
    }

    fn post(&self, body: &[u8]) -> Result<Vec<u8>, AttemptError> {
        let mut out = Vec::new();
        let code = self.perform(body, &mut out).map_err(AttemptError::Curl)?;
        if !(200..300).contains(&code) {
            return Err(AttemptError::Status(code));
        }
        Ok(out)
    }

    fn perform(&self, body: &[u8], out: &mut Vec<u8>) -> Result<u32, curl::Error> {
        let mut easy = curl::easy::Easy::new();
        easy.url(&self.endpoint)?;
        easy.post(true)?;
        easy.post_fields_copy(body)?;
        easy.connect_timeout(self.timeout)?;
        easy.timeout(self.timeout)?;
        let mut headers = curl::easy::List::new();
        headers.append("Content-Type: application/json-rpc")?;
        easy.http_headers(headers)?;
        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                out.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }
        easy.response_code()
    }
}

fn decode_response<T: DeserializeOwned>(raw: &[u8], id: &str) -> Result<T, RpcError> {
    let response: RpcResponse = serde_json::from_slice(raw).map_err(|e| {
        RpcError::Malformed(format!("{}: {}", e, String::from_utf8_lossy(raw)))
    })?;
    if let Some(err) = response.error.filter(|e| e.code != 0) {
        return Err(RpcError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    if let Some(got) = response.id.as_ref().and_then(|v| v.as_str()) {
        if got != id {
            return Err(RpcError::Malformed(format!(
                "response id {} does not match request {}",
                got, id
            )));
        }
    }
    let result = response
        .result
        .ok_or_else(|| RpcError::Malformed("response has no result".into()))?;
    serde_json::from_value(result).map_err(|e| RpcError::Malformed(format!("result: {}", e)))
}

impl DownloaderRpc for Aria2Client {
    fn add_uri(&self, uri: &str) -> Result<String, RpcError> {
        self.call("aria2.addUri", json!([[uri]]))
    }

    fn add_torrent(&self, torrent_base64: &str) -> Result<String, RpcError> {
        self.call("aria2.addTorrent", json!([torrent_base64]))
    }

    fn tell_status(&self, gid: &str) -> Result<TellStatus, RpcError> {
        self.call("aria2.tellStatus", json!([gid]))
    }

    fn remove_download_result(&self, gid: &str) -> Result<(), RpcError> {
        let answer: String = self.call("aria2.removeDownloadResult", json!([gid]))?;
        if answer != "OK" {
            return Err(RpcError::Malformed(format!("expected OK, got {}", answer)));
        }
        Ok(())
    }
}
