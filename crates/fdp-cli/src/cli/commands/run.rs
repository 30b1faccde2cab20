//! `fdp run` – restore the registry and finish whatever was interrupted.

use anyhow::Result;
use fdp_core::config::FdpConfig;

use super::{drain, open_manager, RunOptions};

pub async fn run_resume(cfg: &FdpConfig, opts: RunOptions) -> Result<()> {
    let manager = open_manager(cfg, opts.daemon)?;
    let loaded = manager.restore().await?;
    if !manager.has_in_progress() {
        println!("Nothing to resume ({} task(s) restored).", loaded);
        manager.persist()?;
        return Ok(());
    }
    drain(&manager, opts).await
}
