//! `fdp status` – show the saved registry.

use anyhow::Result;
use fdp_core::config::FdpConfig;
use fdp_core::manager::read_snapshot;
use fdp_core::task::human_size;

use super::{percent, state_label};

pub fn run_status(cfg: &FdpConfig) -> Result<()> {
    let path = cfg.resolved_snapshot_path()?;
    let tasks = read_snapshot(&path)?;
    if tasks.is_empty() {
        println!("No tasks in {}.", path.display());
        return Ok(());
    }
    println!(
        "{:<8} {:>6} {:>12} {:>12} {:<40} {}",
        "STATE", "DONE", "SIZE", "SPEED", "NAME", "SOURCE"
    );
    for t in &tasks {
        let pct = percent(t)
            .map(|p| format!("{:.0}%", p))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:>6} {:>12} {:>12} {:<40} {}",
            state_label(t),
            pct,
            human_size(t.info.size),
            format!("{}/s", human_size(t.info.speed)),
            t.info.name,
            t.info.source
        );
        if t.info.errored {
            println!("         error: {}", t.info.error);
        }
    }
    Ok(())
}
