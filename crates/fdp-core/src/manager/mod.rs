//! Task manager: registry, intake operations, worker pool and update pump.
//!
//! ```text
//! add(locator) -> admission -> create_task -> registry -> queue -> worker
//!                                                 |                  |
//!                                                 +--- signal <------+
//!                                                        |
//!                                                      pump -> broadcaster -> subscribers
//! ```

mod disk;
mod persist;
mod pool;
mod pump;
mod registry;

pub use persist::{read_snapshot, write_snapshot};
pub use registry::Registry;

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::broadcast::{Broadcaster, SubscriberId, SubscriberSink};
use crate::config::FdpConfig;
use crate::error::{Error, Result};
use crate::locator::{self, LocatorKind};
use crate::rpc::DaemonHandle;
use crate::task::{human_size, lock, SharedTask, Task, TaskEnv, TaskKind, TaskSettings};

use disk::remove_backing_files;
use pump::Signal;

struct Inner {
    settings: TaskSettings,
    snapshot_path: PathBuf,
    registry: Arc<Registry>,
    broadcaster: Broadcaster,
    queue: mpsc::Sender<SharedTask>,
    signal: Signal,
}

/// Cheap to clone; all clones drive the same registry and pool.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<Inner>,
}

impl TaskManager {
    /// Creates the download directory, then spawns the workers and the update
    /// pump on the current tokio runtime.
    pub fn start(config: &FdpConfig, daemon: DaemonHandle) -> anyhow::Result<Self> {
        let snapshot_path = config.resolved_snapshot_path()?;
        Self::start_with(config, daemon, snapshot_path)
    }

    /// Like [`TaskManager::start`] with an explicit snapshot location.
    pub fn start_with(
        config: &FdpConfig,
        daemon: DaemonHandle,
        snapshot_path: PathBuf,
    ) -> anyhow::Result<Self> {
        let settings = config.task_settings();
        fs::create_dir_all(&settings.download_dir).with_context(|| {
            format!("create download dir: {}", settings.download_dir.display())
        })?;

        let registry = Arc::new(Registry::new());
        let broadcaster = Broadcaster::from_config(&config.broadcast);
        let (signal, wake) = Signal::new();

        let env = TaskEnv {
            settings: settings.clone(),
            daemon,
            renamer: registry.clone(),
        };
        let queue = pool::spawn(config.workers, config.queue_capacity, env, signal.clone());
        tokio::spawn(pump::run(
            wake,
            Arc::clone(&registry),
            broadcaster.clone(),
            Duration::from_millis(config.broadcast.tick_ms.max(1)),
        ));

        tracing::info!(
            dir = %settings.download_dir.display(),
            workers = config.workers,
            limit = %human_size(settings.limit_bytes),
            "task manager started"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                settings,
                snapshot_path,
                registry,
                broadcaster,
                queue,
                signal,
            }),
        })
    }

    pub fn download_dir(&self) -> &Path {
        &self.inner.settings.download_dir
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.inner.snapshot_path
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.inner.broadcaster
    }

    /// Validates the locator, derives its unique name and registers the new task.
    pub fn create_task(&self, locator: &str) -> Result<SharedTask> {
        let locator = locator.trim();
        let kind = locator::validate(locator)?;
        let task_kind = match kind {
            LocatorKind::Http => TaskKind::Direct,
            LocatorKind::Magnet | LocatorKind::EncodedTorrent | LocatorKind::TorrentFile => {
                TaskKind::delegated()
            }
        };
        let task = Task::new(locator::safe_name(locator), locator, task_kind).into_shared();
        self.inner.registry.insert(Arc::clone(&task))?;
        tracing::info!(task = %lock(&task).info.name, ?kind, "task created");
        self.inner.signal.notify();
        Ok(task)
    }

    /// Submission intake: admission check, create, queue. Waits while the queue is full.
    pub async fn add(&self, locator: &str) -> Result<Task> {
        let used = self.total_bytes_on_disk()?;
        let limit = self.inner.settings.limit_bytes;
        if used >= limit {
            return Err(Error::StorageFull { used, limit });
        }
        let task = self.create_task(locator)?;
        let snapshot = lock(&task).clone();
        self.submit(task).await?;
        Ok(snapshot)
    }

    /// Queues a registered task for a worker.
    pub async fn submit(&self, task: SharedTask) -> Result<()> {
        self.inner
            .queue
            .send(task)
            .await
            .map_err(|_| Error::QueueClosed)
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.inner.registry.snapshot()
    }

    pub fn get_task(&self, name: &str) -> Option<Task> {
        self.inner.registry.get(name).map(|t| lock(&t).clone())
    }

    /// Deletes a terminal task and its files. The entry stays registered when
    /// the files cannot be deleted.
    pub fn remove_task(&self, name: &str) -> Result<()> {
        match self.inner.registry.get(name) {
            None => return Err(Error::NotFound(name.to_string())),
            Some(task) if !lock(&task).is_completed() => {
                return Err(Error::StillDownloading(name.to_string()))
            }
            Some(_) => {}
        }
        remove_backing_files(&self.inner.settings.download_dir, name)?;
        self.inner.registry.remove_completed(name)?;
        tracing::info!(task = %name, "task removed");
        self.inner.signal.notify();
        Ok(())
    }

    /// Registers a live-update subscriber; it receives the current tasks right away.
    pub fn subscribe(&self, sink: Box<dyn SubscriberSink>) -> SubscriberId {
        let id = self.inner.broadcaster.subscribe(sink);
        self.inner.signal.notify();
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.broadcaster.unsubscribe(id)
    }

    pub fn has_in_progress(&self) -> bool {
        self.inner.registry.has_in_progress()
    }

    /// Resolves once no registered task is still in progress.
    pub async fn wait_until_idle(&self) {
        let mut changes = self.inner.signal.watch();
        while self.has_in_progress() {
            if changes.changed().await.is_err() {
                return;
            }
        }
    }
}
