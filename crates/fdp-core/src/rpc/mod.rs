//! JSON-RPC client for the external aria2c daemon.
//!
//! Delegated tasks talk to the daemon only through [`DownloaderRpc`], so tests
//! can drive them with an in-process fake.

mod client;
mod types;

pub use client::Aria2Client;
pub use types::{StatusFile, TellStatus};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    /// Daemon unreachable after retries (refused, timed out, reset).
    #[error("rpc transport: {0}")]
    Transport(String),
    /// Endpoint answered with a non-2xx HTTP status.
    #[error("rpc endpoint returned HTTP {0}")]
    HttpStatus(u32),
    /// Body was not a JSON-RPC response of the expected shape.
    #[error("malformed rpc response: {0}")]
    Malformed(String),
    /// Daemon rejected the call.
    #[error("aria2 error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// Operations a delegated task needs from the external downloader.
pub trait DownloaderRpc: Send + Sync {
    /// `aria2.addUri`; returns the job id (GID).
    fn add_uri(&self, uri: &str) -> Result<String, RpcError>;
    /// `aria2.addTorrent` with a base64 torrent body; returns the GID.
    fn add_torrent(&self, torrent_base64: &str) -> Result<String, RpcError>;
    /// `aria2.tellStatus`.
    fn tell_status(&self, gid: &str) -> Result<TellStatus, RpcError>;
    /// `aria2.removeDownloadResult`; succeeds only when the daemon answers `OK`.
    fn remove_download_result(&self, gid: &str) -> Result<(), RpcError>;
}

/// Capability handed to every task: the RPC client plus whether the daemon
/// is confirmed running. The flag is owned by whoever supervises the daemon.
#[derive(Clone)]
pub struct DaemonHandle {
    running: Arc<AtomicBool>,
    rpc: Arc<dyn DownloaderRpc>,
}

impl DaemonHandle {
    pub fn new(rpc: Arc<dyn DownloaderRpc>, running: bool) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(running)),
            rpc,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn rpc(&self) -> &dyn DownloaderRpc {
        self.rpc.as_ref()
    }
}

impl std::fmt::Debug for DaemonHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonHandle")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
