//! CLI command handlers, one file per command, plus the manager plumbing they share.

mod add;
mod remove;
mod run;
mod status;
mod watch;

pub use add::run_add;
pub use remove::run_remove;
pub use run::run_resume;
pub use status::run_status;

use anyhow::Result;
use fdp_core::config::FdpConfig;
use fdp_core::manager::TaskManager;
use fdp_core::rpc::{Aria2Client, DaemonHandle};
use fdp_core::task::Task;
use std::sync::Arc;

/// Flags shared by `add` and `run`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub watch: bool,
    pub daemon: bool,
}

/// Starts a manager wired to the configured aria2c endpoint.
fn open_manager(cfg: &FdpConfig, daemon_running: bool) -> Result<TaskManager> {
    let client = Aria2Client::from_config(&cfg.daemon);
    tracing::debug!(endpoint = %client.endpoint(), daemon_running, "aria2 rpc client");
    let daemon = DaemonHandle::new(Arc::new(client), daemon_running);
    TaskManager::start(cfg, daemon)
}

/// Waits for all tasks (or Ctrl-C), then persists the registry either way.
async fn drain(manager: &TaskManager, opts: RunOptions) -> Result<()> {
    let watcher = opts
        .watch
        .then(|| manager.subscribe(Box::new(watch::TerminalSink::stdout())));

    tokio::select! {
        _ = manager.wait_until_idle() => {
            tracing::info!("all tasks finished");
        }
        res = tokio::signal::ctrl_c() => {
            res?;
            eprintln!("interrupted, saving state");
            tracing::warn!("interrupted with tasks in progress");
        }
    }

    if let Some(id) = watcher {
        manager.unsubscribe(id);
    }
    manager.persist()?;
    print_summary(&manager.list_tasks());
    Ok(())
}

/// One-word state of a task for terminal output.
pub(crate) fn state_label(task: &Task) -> &'static str {
    match (task.info.completed, task.info.errored) {
        (_, true) => "error",
        (true, false) => "done",
        (false, false) if task.info.start_time == 0 => "queued",
        (false, false) => "active",
    }
}

/// Completion percentage, when the total is known.
pub(crate) fn percent(task: &Task) -> Option<f64> {
    (task.info.content_length > 0)
        .then(|| task.info.size as f64 * 100.0 / task.info.content_length as f64)
}

fn print_summary(tasks: &[Task]) {
    let done = tasks.iter().filter(|t| state_label(t) == "done").count();
    let failed: Vec<&Task> = tasks.iter().filter(|t| t.info.errored).collect();
    println!("{} task(s): {} done, {} failed", tasks.len(), done, failed.len());
    for t in failed {
        println!("  {}: {}", t.info.name, t.info.error);
    }
}
