//! Update pump: turns change signals and a periodic tick into broadcasts.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use super::registry::Registry;
use crate::broadcast::Broadcaster;

/// Raised on every change subscribers should hear about. Coalescing: many
/// signals before the pump wakes produce one broadcast.
#[derive(Clone)]
pub(super) struct Signal {
    wake: mpsc::Sender<()>,
    changes: Arc<watch::Sender<u64>>,
}

impl Signal {
    pub(super) fn new() -> (Self, mpsc::Receiver<()>) {
        let (wake, rx) = mpsc::channel(1);
        let (changes, _) = watch::channel(0);
        (
            Self {
                wake,
                changes: Arc::new(changes),
            },
            rx,
        )
    }

    pub(super) fn notify(&self) {
        let _ = self.wake.try_send(());
        self.changes.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Receiver that sees every later `notify`.
    pub(super) fn watch(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

pub(super) async fn run(
    mut wake: mpsc::Receiver<()>,
    registry: Arc<Registry>,
    broadcaster: Broadcaster,
    tick: Duration,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            msg = wake.recv() => {
                if msg.is_none() {
                    break;
                }
            }
            _ = ticker.tick() => {
                if !registry.has_in_progress() {
                    continue;
                }
            }
        }
        if broadcaster.count() == 0 {
            continue;
        }
        broadcaster.broadcast(Arc::new(registry.snapshot()));
    }
    tracing::debug!("update pump stopped");
}
