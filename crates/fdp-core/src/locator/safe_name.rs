use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Characters kept from the locator, before the stamp is added.
pub const SAFE_NAME_MAX: usize = 50;

static SAFE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9_.\-]+").expect("static regex"));

static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

/// Millisecond unix timestamp, strictly increasing within the process.
pub fn creation_stamp() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    let mut prev = LAST_STAMP.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_STAMP.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(seen) => prev = seen,
        }
    }
}

/// Filesystem- and URL-safe name for a locator or attachment name.
///
/// Only `[A-Za-z0-9_.-]` runs survive; the tail is kept because it carries the
/// file name and extension. The stamp makes repeated submissions distinct.
pub fn safe_name(source: &str) -> String {
    let joined: String = SAFE_RUN.find_iter(source).map(|m| m.as_str()).collect();
    // ASCII only, so byte slicing is on char boundaries.
    let tail = &joined[joined.len().saturating_sub(SAFE_NAME_MAX)..];
    let base = if tail.is_empty() { "download" } else { tail };
    format!("{}-{}", base, creation_stamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_safe(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
    }

    #[test]
    fn keeps_only_safe_characters() {
        let name = safe_name("http://example.com/my file (1).bin");
        assert!(name.chars().all(is_safe), "{name}");
        assert!(name.starts_with("httpexample.commyfile1.bin-"));
    }

    #[test]
    fn truncates_to_tail() {
        let long = format!("http://example.com/{}/end.iso", "a".repeat(200));
        let name = safe_name(&long);
        let (base, stamp) = name.rsplit_once('-').unwrap();
        assert_eq!(base.len(), SAFE_NAME_MAX);
        assert!(base.ends_with("end.iso"));
        assert!(stamp.parse::<u64>().is_ok());
        assert!(name.len() <= SAFE_NAME_MAX + 1 + 20);
    }

    #[test]
    fn same_source_gets_distinct_names() {
        let a = safe_name("http://example.com/file.bin");
        let b = safe_name("http://example.com/file.bin");
        assert_ne!(a, b);
    }

    #[test]
    fn non_ascii_only_source_falls_back() {
        let name = safe_name("ファイル");
        assert!(name.starts_with("download-"));
    }

    #[test]
    fn stamps_strictly_increase() {
        let mut prev = creation_stamp();
        for _ in 0..1000 {
            let next = creation_stamp();
            assert!(next > prev);
            prev = next;
        }
    }
}
