//! Retry loop: run a closure until success or policy says stop.

use super::policy::{ErrorKind, RetryDecision, RetryPolicy};

/// Runs a closure until it succeeds or the retry policy says to stop.
/// `classify` maps each failure to an [`ErrorKind`]; on a retryable failure the
/// loop sleeps for the backoff duration then tries again. Blocking: call from a
/// worker thread, not from async code.
pub fn run_with_retry<T, E, F, C>(policy: &RetryPolicy, classify: C, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    C: Fn(&E) -> ErrorKind,
    E: std::fmt::Display,
{
    let mut attempt = 1u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) => match policy.decide(attempt, classify(&e)) {
                RetryDecision::NoRetry => return Err(e),
                RetryDecision::RetryAfter(d) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        "{}, retrying in {:?}",
                        e,
                        d
                    );
                    std::thread::sleep(d);
                    attempt += 1;
                }
            },
        }
    }
}
