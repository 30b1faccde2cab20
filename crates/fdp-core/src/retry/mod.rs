//! Retry and backoff policy.
//!
//! This module encapsulates error classification (timeouts, throttling,
//! connection failures) and backoff decisions so that the RPC client and any
//! future transport share one policy.

mod classify;
mod policy;
mod run;

pub use classify::{classify_curl_error, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
