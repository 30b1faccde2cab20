//! Download tasks: the shared record plus the two state machines that fill it.
//!
//! A task is created with only its name and source populated, mutated by the
//! one worker driving it, and frozen once `completed` is set.

mod delegated;
mod direct;
mod progress;

pub use progress::{human_size, throughput, unix_now, ProgressSampler};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::rpc::DaemonHandle;

/// Fields common to both variants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Filesystem-safe name; registry key and on-disk file name.
    pub name: String,
    /// Locator as submitted (a saved `.torrent` path once a torrent body was accepted).
    pub source: String,
    /// Unix seconds when the transfer started (0 until then).
    pub start_time: u64,
    /// Expected total bytes; 0 while unknown.
    pub content_length: u64,
    /// Bytes transferred so far.
    pub size: u64,
    pub duration: Duration,
    /// Bytes per second.
    pub speed: u64,
    /// No further work will happen (success or failure).
    pub completed: bool,
    pub errored: bool,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskKind {
    /// Bytes fetched in-process over HTTP(S).
    Direct,
    /// Bytes fetched by the aria2c daemon.
    Delegated {
        gid: Option<String>,
        #[serde(default)]
        follow_ups: Vec<String>,
    },
}

impl TaskKind {
    pub fn delegated() -> Self {
        TaskKind::Delegated {
            gid: None,
            follow_ups: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub info: TaskInfo,
    pub kind: TaskKind,
}

pub type SharedTask = Arc<Mutex<Task>>;

/// Lock a task, recovering the data if a worker panicked while holding it.
pub fn lock(task: &SharedTask) -> MutexGuard<'_, Task> {
    task.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Task {
    pub fn new(name: impl Into<String>, source: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            info: TaskInfo {
                name: name.into(),
                source: source.into(),
                ..TaskInfo::default()
            },
            kind,
        }
    }

    /// A completed task for a file found in the download directory that nothing submitted.
    pub fn local(name: impl Into<String>, size: u64, modified: u64) -> Self {
        Self {
            info: TaskInfo {
                name: name.into(),
                source: "Local".into(),
                start_time: modified,
                content_length: size,
                size,
                completed: true,
                ..TaskInfo::default()
            },
            kind: TaskKind::Direct,
        }
    }

    pub fn into_shared(self) -> SharedTask {
        Arc::new(Mutex::new(self))
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn is_completed(&self) -> bool {
        self.info.completed
    }

    pub fn is_delegated(&self) -> bool {
        matches!(self.kind, TaskKind::Delegated { .. })
    }

    /// Progress sample from the driving worker. Ignored once terminal.
    pub fn record_progress(&mut self, size: u64, elapsed: Duration) {
        if self.info.completed {
            return;
        }
        self.info.size = size;
        self.info.duration = elapsed;
        self.info.speed = throughput(size, elapsed);
    }

    /// Mark success with final size and elapsed time. No-op once terminal.
    pub fn finish(&mut self, size: u64, elapsed: Duration) {
        if self.info.completed {
            return;
        }
        self.record_progress(size, elapsed);
        self.info.completed = true;
    }

    /// Mark failure. No-op once terminal, so the first recorded error wins.
    pub fn fail(&mut self, err: &Error) {
        if self.info.completed {
            return;
        }
        self.info.completed = true;
        self.info.errored = true;
        self.info.error = err.to_string();
    }

    /// Back to the submitted state, for restarting an interrupted download from scratch.
    pub fn reset(&mut self) {
        let TaskInfo { name, source, .. } = std::mem::take(&mut self.info);
        self.info = TaskInfo {
            name,
            source,
            ..TaskInfo::default()
        };
        if let TaskKind::Delegated { gid, follow_ups } = &mut self.kind {
            *gid = None;
            follow_ups.clear();
        }
    }
}

/// Knobs a task's state machine reads; built from the global config.
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub download_dir: PathBuf,
    /// Largest payload a single task may fetch.
    pub limit_bytes: u64,
    /// Overall deadline of a delegated task; also the transfer timeout of a direct one.
    pub task_timeout: Duration,
    /// TCP connect plus TLS handshake timeout.
    pub connect_timeout: Duration,
    pub poll_interval: Duration,
}

/// Re-keys a task in whatever registry holds it.
pub trait TaskRenamer: Send + Sync {
    /// Rename `task` to `new_name`, keeping its position and every other field.
    /// Fails with [`Error::NameCollision`] when another task already has the name.
    fn rename(&self, task: &SharedTask, new_name: &str) -> Result<()>;
}

/// Everything a worker hands to a running task.
#[derive(Clone)]
pub struct TaskEnv {
    pub settings: TaskSettings,
    pub daemon: DaemonHandle,
    pub renamer: Arc<dyn TaskRenamer>,
}

/// Runs the task's state machine to the end. Any error is recorded on the task.
pub fn execute(task: &SharedTask, env: &TaskEnv) {
    let (name, delegated) = {
        let t = lock(task);
        (t.info.name.clone(), t.is_delegated())
    };
    tracing::debug!(task = %name, delegated, "task started");

    let result = if delegated {
        delegated::run(task, env)
    } else {
        direct::run(task, env)
    };

    let mut t = lock(task);
    match result {
        Ok(()) => tracing::info!(
            task = %t.info.name,
            size = %human_size(t.info.size),
            duration = ?t.info.duration,
            "task completed"
        ),
        Err(e) => {
            tracing::error!(task = %t.info.name, source = %t.info.source, class = ?e.class(), "task failed: {}", e);
            t.fail(&e);
        }
    }
}
