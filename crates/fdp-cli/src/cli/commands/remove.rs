//! `fdp remove <name>` – delete a finished task and its files.

use anyhow::{Context, Result};
use fdp_core::config::FdpConfig;

use super::open_manager;

pub async fn run_remove(cfg: &FdpConfig, name: &str) -> Result<()> {
    let manager = open_manager(cfg, false)?;
    // Only load: unfinished tasks stay as they are in the snapshot.
    manager.load()?;
    manager
        .remove_task(name)
        .with_context(|| format!("remove {}", name))?;
    manager.persist()?;
    println!("Removed {}", name);
    Ok(())
}
