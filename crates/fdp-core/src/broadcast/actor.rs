//! Per-subscriber delivery actor.

use std::sync::Weak;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

use super::{Shared, Snapshot, SubscriberId, SubscriberSink};

/// Removes the subscriber from the set when the actor ends, however it ends.
pub(super) struct Membership {
    pub(super) shared: Weak<Shared>,
    pub(super) id: SubscriberId,
}

impl Drop for Membership {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            let remaining = {
                let mut subs = shared.subscribers();
                subs.remove(&self.id);
                subs.len()
            };
            tracing::info!(subscriber = %self.id, active = remaining, "subscriber removed");
        }
    }
}

/// First snapshot goes out at once; after that each window forwards only the
/// latest snapshot received in it. Ends on the first sink failure or when the
/// queue is closed, after flushing the window in progress.
pub(super) async fn run(
    mut rx: mpsc::Receiver<Snapshot>,
    mut sink: Box<dyn SubscriberSink>,
    debounce: Duration,
    membership: Membership,
) {
    let Some(first) = rx.recv().await else {
        return;
    };
    if !deliver(sink.as_mut(), &first, &membership) {
        return;
    }

    while let Some(mut latest) = rx.recv().await {
        let window_end = Instant::now() + debounce;
        let mut closed = false;
        loop {
            match timeout_at(window_end, rx.recv()).await {
                Ok(Some(snapshot)) => latest = snapshot,
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }
        // What was collected before the queue closed still goes out.
        if !deliver(sink.as_mut(), &latest, &membership) || closed {
            return;
        }
    }
}

fn deliver(sink: &mut dyn SubscriberSink, snapshot: &Snapshot, membership: &Membership) -> bool {
    match sink.deliver(snapshot) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(subscriber = %membership.id, "{}", e);
            false
        }
    }
}
