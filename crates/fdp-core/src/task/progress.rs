//! Throughput, size formatting and progress sampling.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Bytes per second. Elapsed time is floored at one millisecond.
pub fn throughput(bytes: u64, elapsed: Duration) -> u64 {
    let nanos = elapsed.as_nanos().max(1_000_000);
    (bytes as u128 * 1_000_000_000 / nanos).min(u64::MAX as u128) as u64
}

/// "12.34 MB" style size for logs and listings.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Decides which reads update the shared progress fields.
#[derive(Debug)]
pub struct ProgressSampler {
    every: u64,
    reads: u64,
}

impl ProgressSampler {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            reads: 0,
        }
    }

    /// Counts one read; true on the first read and every `every`-th after it.
    pub fn tick(&mut self) -> bool {
        let due = self.reads % self.every == 0;
        self.reads += 1;
        due
    }
}
