//! Fixed pool of download workers over a bounded submission queue.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use super::pump::Signal;
use crate::error::Error;
use crate::task::{execute, lock, SharedTask, TaskEnv};

/// Spawns `workers` workers sharing one queue of `capacity` pending tasks.
pub(super) fn spawn(
    workers: usize,
    capacity: usize,
    env: TaskEnv,
    signal: Signal,
) -> mpsc::Sender<SharedTask> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let rx = Arc::new(Mutex::new(rx));
    for id in 0..workers.max(1) {
        tokio::spawn(worker(id, Arc::clone(&rx), env.clone(), signal.clone()));
    }
    tx
}

async fn worker(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<SharedTask>>>,
    env: TaskEnv,
    signal: Signal,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };

        let job = Arc::clone(&task);
        let job_env = env.clone();
        // Curl and the polling sleep block, so each task runs on the blocking pool.
        let joined = tokio::task::spawn_blocking(move || execute(&job, &job_env)).await;
        if let Err(e) = joined {
            let mut t = lock(&task);
            tracing::error!(worker = id, task = %t.info.name, "task panicked: {}", e);
            t.fail(&Error::WorkerFault(e.to_string()));
        }
        signal.notify();
    }
    tracing::debug!(worker = id, "worker stopped");
}
