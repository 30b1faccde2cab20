use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::task::TaskSettings;

/// Retry policy for calls to the downloader daemon (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per call (including the first).
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_attempts, Duration::from_millis(self.delay_ms))
    }
}

/// Connection to the external aria2c daemon. The daemon itself is started elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// `--rpc-listen-port` the daemon was started with.
    pub rpc_port: u16,
    /// Per-request timeout for JSON-RPC calls, in seconds.
    pub rpc_timeout_secs: u64,
    /// Interval between status polls of a delegated task, in milliseconds.
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            rpc_port: 6902,
            rpc_timeout_secs: 60,
            poll_interval_ms: 5000,
            retry: RetryConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}/jsonrpc", self.rpc_port)
    }
}

/// Live-update fan-out tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Periodic push interval while downloads are in progress, in milliseconds.
    pub tick_ms: u64,
    /// Per-subscriber coalescing window, in milliseconds.
    pub debounce_ms: u64,
    /// Capacity of each subscriber's outbound queue.
    pub subscriber_queue: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            debounce_ms: 1000,
            subscriber_queue: 100,
        }
    }
}

/// Global configuration loaded from `~/.config/fdp/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FdpConfig {
    /// Directory downloads are written to (and reconciled against).
    pub download_dir: PathBuf,
    /// Cap on bytes under management; also the per-task size limit.
    pub limit_bytes: u64,
    /// Overall deadline of a single task, in seconds.
    pub task_timeout_secs: u64,
    /// Connect + TLS handshake timeout for direct transfers, in seconds.
    pub connect_timeout_secs: u64,
    /// Number of download workers.
    pub workers: usize,
    /// Pending submissions the worker queue holds before `submit` blocks.
    pub queue_capacity: usize,
    /// Registry snapshot file; defaults to `~/.local/state/fdp/tasks.json`.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl Default for FdpConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("download"),
            limit_bytes: 3 * 1024 * 1024 * 1024,
            task_timeout_secs: 24 * 60 * 60,
            connect_timeout_secs: 20,
            workers: 10,
            queue_capacity: 32,
            snapshot_path: None,
            broadcast: BroadcastConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl FdpConfig {
    /// Settings handed to each task's state machine.
    pub fn task_settings(&self) -> TaskSettings {
        TaskSettings {
            download_dir: self.download_dir.clone(),
            limit_bytes: self.limit_bytes,
            task_timeout: Duration::from_secs(self.task_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            poll_interval: Duration::from_millis(self.daemon.poll_interval_ms),
        }
    }

    /// Snapshot path from config, or the XDG state default.
    pub fn resolved_snapshot_path(&self) -> Result<PathBuf> {
        match &self.snapshot_path {
            Some(p) => Ok(p.clone()),
            None => default_snapshot_path(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fdp")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Default snapshot location: `~/.local/state/fdp/tasks.json`.
pub fn default_snapshot_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fdp")?;
    Ok(xdg_dirs.get_state_home().join("fdp").join("tasks.json"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FdpConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FdpConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: FdpConfig = toml::from_str(&data)?;
    Ok(cfg)
}
