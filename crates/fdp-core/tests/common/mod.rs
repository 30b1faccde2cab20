#![allow(dead_code)]

pub mod fake_daemon;
pub mod file_server;
pub mod rpc_server;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fdp_core::config::FdpConfig;
use fdp_core::manager::TaskManager;
use fdp_core::rpc::{DaemonHandle, DownloaderRpc};

/// Config for tests: everything under `root`, fast polling and ticks.
pub fn config(root: &Path) -> FdpConfig {
    let mut cfg = FdpConfig {
        download_dir: root.join("download"),
        workers: 2,
        queue_capacity: 4,
        snapshot_path: Some(root.join("state").join("tasks.json")),
        ..FdpConfig::default()
    };
    cfg.daemon.poll_interval_ms = 10;
    cfg.broadcast.tick_ms = 20;
    cfg.broadcast.debounce_ms = 20;
    cfg
}

pub fn start(cfg: &FdpConfig, rpc: Arc<dyn DownloaderRpc>, daemon_running: bool) -> TaskManager {
    TaskManager::start(cfg, DaemonHandle::new(rpc, daemon_running)).expect("start manager")
}

/// Waits for the pool to drain, failing the test instead of hanging.
pub async fn idle(manager: &TaskManager) {
    tokio::time::timeout(Duration::from_secs(20), manager.wait_until_idle())
        .await
        .expect("tasks did not finish in time");
}
