//! In-process stand-in for the aria2c daemon.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use fdp_core::rpc::{DownloaderRpc, RpcError, StatusFile, TellStatus};

/// Scripted daemon: each GID serves its statuses in order, repeating the last one.
#[derive(Default)]
pub struct FakeDaemon {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    next_gid: String,
    scripts: HashMap<String, VecDeque<TellStatus>>,
    added_uris: Vec<String>,
    added_torrents: Vec<String>,
    polled: Vec<String>,
    removed: Vec<String>,
    fail_status_with: Option<(i64, String)>,
}

impl FakeDaemon {
    /// Daemon whose next submission gets `gid`.
    pub fn new(gid: &str) -> Self {
        let daemon = Self::default();
        daemon.state.lock().unwrap().next_gid = gid.to_string();
        daemon
    }

    pub fn script(&self, gid: &str, statuses: Vec<TellStatus>) {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(gid.to_string(), statuses.into());
    }

    pub fn fail_status(&self, code: i64, message: &str) {
        self.state.lock().unwrap().fail_status_with = Some((code, message.to_string()));
    }

    pub fn added_uris(&self) -> Vec<String> {
        self.state.lock().unwrap().added_uris.clone()
    }

    pub fn added_torrents(&self) -> Vec<String> {
        self.state.lock().unwrap().added_torrents.clone()
    }

    pub fn polled(&self) -> Vec<String> {
        self.state.lock().unwrap().polled.clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.state.lock().unwrap().removed.clone()
    }
}

impl DownloaderRpc for FakeDaemon {
    fn add_uri(&self, uri: &str) -> Result<String, RpcError> {
        let mut st = self.state.lock().unwrap();
        st.added_uris.push(uri.to_string());
        Ok(st.next_gid.clone())
    }

    fn add_torrent(&self, torrent_base64: &str) -> Result<String, RpcError> {
        let mut st = self.state.lock().unwrap();
        st.added_torrents.push(torrent_base64.to_string());
        Ok(st.next_gid.clone())
    }

    fn tell_status(&self, gid: &str) -> Result<TellStatus, RpcError> {
        let mut st = self.state.lock().unwrap();
        st.polled.push(gid.to_string());
        if let Some((code, message)) = st.fail_status_with.clone() {
            return Err(RpcError::Rpc { code, message });
        }
        let script = st.scripts.get_mut(gid).ok_or_else(|| RpcError::Rpc {
            code: 1,
            message: format!("GID {} is not found", gid),
        })?;
        let status = if script.len() > 1 {
            script.pop_front().unwrap_or_default()
        } else {
            script.front().cloned().unwrap_or_default()
        };
        Ok(status)
    }

    fn remove_download_result(&self, gid: &str) -> Result<(), RpcError> {
        self.state.lock().unwrap().removed.push(gid.to_string());
        Ok(())
    }
}

/// Status of one job with a single file.
pub fn status(gid: &str, state: &str, done: u64, total: u64, path: &str) -> TellStatus {
    TellStatus {
        gid: gid.to_string(),
        status: state.to_string(),
        total_length: total,
        completed_length: done,
        files: vec![StatusFile {
            path: path.to_string(),
            length: total,
            completed_length: done,
        }],
        ..TellStatus::default()
    }
}

/// Status that hands over to follow-up jobs.
pub fn handover(gid: &str, path: &str, follow_ups: &[&str]) -> TellStatus {
    TellStatus {
        followed_by: follow_ups.iter().map(|s| s.to_string()).collect(),
        ..status(gid, "complete", 0, 0, path)
    }
}
