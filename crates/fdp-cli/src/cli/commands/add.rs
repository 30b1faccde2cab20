//! `fdp add <locator>...` – submit locators and wait for them to finish.

use anyhow::{bail, Result};
use fdp_core::config::FdpConfig;

use super::{drain, open_manager, RunOptions};

pub async fn run_add(cfg: &FdpConfig, locators: &[String], opts: RunOptions) -> Result<()> {
    let manager = open_manager(cfg, opts.daemon)?;
    let restored = manager.restore().await?;
    if restored > 0 {
        tracing::info!("restored {} task(s) from previous run", restored);
    }

    let mut accepted = 0;
    for locator in locators {
        match manager.add(locator).await {
            Ok(task) => {
                println!("Added {} for {}", task.info.name, locator);
                accepted += 1;
            }
            Err(e) => {
                tracing::warn!(%locator, class = ?e.class(), "rejected: {}", e);
                eprintln!("Rejected {}: {}", locator, e);
            }
        }
    }

    drain(&manager, opts).await?;
    if accepted == 0 {
        bail!("no locator was accepted");
    }
    Ok(())
}
