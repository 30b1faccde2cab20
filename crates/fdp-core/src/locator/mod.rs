//! Locator model: what a submitted string points at and the name it gets.
//!
//! A locator is whatever the client typed: an HTTP(S) URL, a magnet link, a
//! base64-encoded torrent body, or the path of a `.torrent` file saved by an
//! earlier run.

mod content_disposition;
mod safe_name;

pub use content_disposition::parse_content_disposition_filename;
pub use safe_name::{creation_stamp, safe_name, SAFE_NAME_MAX};

use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::error::{Error, Result};

pub const MAGNET_PREFIX: &str = "magnet:?xt=urn:btih:";

/// Synthetic load-test payloads such as `100MB.bin` or `test1G-data`.
static TEST_PAYLOAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(test)?\d+[mg]b?[-.]").expect("static regex"));

/// How a locator is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorKind {
    Http,
    Magnet,
    EncodedTorrent,
    TorrentFile,
}

impl LocatorKind {
    pub fn is_delegated(self) -> bool {
        !matches!(self, LocatorKind::Http)
    }
}

/// Classify a locator. Whitespace around it is ignored.
pub fn classify(locator: &str) -> Result<LocatorKind> {
    let locator = locator.trim();
    if locator.is_empty() {
        return Err(Error::InvalidLocator("locator is empty".into()));
    }
    if let Ok(url) = url::Url::parse(locator) {
        if matches!(url.scheme(), "http" | "https") {
            return Ok(LocatorKind::Http);
        }
    }
    if locator.starts_with(MAGNET_PREFIX) {
        return Ok(LocatorKind::Magnet);
    }
    if decode_torrent(locator).is_some() {
        return Ok(LocatorKind::EncodedTorrent);
    }
    if locator.ends_with(".torrent") && Path::new(locator).is_file() {
        return Ok(LocatorKind::TorrentFile);
    }
    Err(Error::UnsupportedScheme(locator.to_string()))
}

/// Decode a base64 torrent body. Only bencoded dictionaries count, so plain
/// words that happen to be valid base64 are not mistaken for torrents.
pub fn decode_torrent(locator: &str) -> Option<Vec<u8>> {
    let data = base64::engine::general_purpose::STANDARD
        .decode(locator.trim())
        .ok()?;
    (data.first() == Some(&b'd')).then_some(data)
}

/// True when the last path segment of an HTTP locator looks like a
/// bandwidth-test file.
pub fn is_test_payload(locator: &str) -> bool {
    let Ok(url) = url::Url::parse(locator.trim()) else {
        return false;
    };
    let segment = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .unwrap_or("");
    TEST_PAYLOAD.is_match(segment)
}

/// Classify and apply the test-payload guard in one step.
pub fn validate(locator: &str) -> Result<LocatorKind> {
    let kind = classify(locator)?;
    if kind == LocatorKind::Http && is_test_payload(locator) {
        return Err(Error::InvalidLocator(format!(
            "refusing synthetic test payload: {}",
            locator.trim()
        )));
    }
    Ok(kind)
}
