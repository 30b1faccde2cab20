//! Wire shapes of the aria2 JSON-RPC conversation.

use serde::{de, Deserialize, Deserializer, Serialize};

/// Path prefix aria2 uses for the job that only fetches a magnet's metadata.
const METADATA_MARKER: &str = "[METADATA]";

#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    pub id: String,
    pub params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Result of `aria2.tellStatus`. aria2 encodes every number as a string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TellStatus {
    #[serde(default)]
    pub gid: String,
    /// `active`, `waiting`, `paused`, `error`, `complete` or `removed`.
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "string_u64")]
    pub total_length: u64,
    #[serde(default, deserialize_with = "string_u64")]
    pub completed_length: u64,
    #[serde(default, deserialize_with = "string_u64")]
    pub download_speed: u64,
    #[serde(default)]
    pub files: Vec<StatusFile>,
    /// GIDs spawned by this job, e.g. the real download after a magnet's metadata.
    #[serde(default)]
    pub followed_by: Vec<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusFile {
    #[serde(default)]
    pub path: String,
    #[serde(default, deserialize_with = "string_u64")]
    pub length: u64,
    #[serde(default, deserialize_with = "string_u64")]
    pub completed_length: u64,
}

impl TellStatus {
    pub fn is_complete(&self) -> bool {
        self.status == "complete"
    }

    /// Daemon-side failure message, if the job ended in error.
    pub fn failure(&self) -> Option<String> {
        let message = self.error_message.as_deref().unwrap_or("").trim();
        if !message.is_empty() {
            return Some(message.to_string());
        }
        (self.status == "error").then(|| {
            format!(
                "job failed with code {}",
                self.error_code.as_deref().unwrap_or("unknown")
            )
        })
    }

    /// Path of the first file once the daemon knows where it goes. A magnet's
    /// metadata job reports `[METADATA]<name or info hash>`, which is not a
    /// location on disk, so it yields `None` like an empty path.
    pub fn first_file_path(&self) -> Option<&str> {
        self.files
            .first()
            .map(|f| f.path.as_str())
            .filter(|p| !p.is_empty() && !p.starts_with(METADATA_MARKER))
    }
}

fn string_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) if s.is_empty() => Ok(0),
        Raw::Text(s) => s.parse().map_err(de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tell_status_numbers_arrive_as_strings() {
        let raw = r#"{
            "gid": "2089b05ecca3d829",
            "status": "active",
            "totalLength": "34896138",
            "completedLength": "34896138",
            "downloadSpeed": "0",
            "connections": "1",
            "files": [{"index": "1", "path": "/srv/dl/ubuntu.iso", "length": "34896138", "completedLength": "34896138", "selected": "true", "uris": []}]
        }"#;
        let st: TellStatus = serde_json::from_str(raw).unwrap();
        assert_eq!(st.total_length, 34_896_138);
        assert_eq!(st.completed_length, st.total_length);
        assert!(!st.is_complete());
        assert_eq!(st.first_file_path(), Some("/srv/dl/ubuntu.iso"));
        assert!(st.followed_by.is_empty());
        assert_eq!(st.failure(), None);
    }

    #[test]
    fn metadata_marker_and_follow_ups() {
        let raw = r#"{
            "gid": "a", "status": "complete", "totalLength": "0", "completedLength": "0",
            "files": [{"path": "[METADATA]ubuntu", "length": "0"}],
            "followedBy": ["b", "c"]
        }"#;
        let st: TellStatus = serde_json::from_str(raw).unwrap();
        assert!(st.is_complete());
        assert_eq!(st.first_file_path(), None);
        assert_eq!(st.followed_by, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn error_status_reports_failure() {
        let raw = r#"{"gid": "a", "status": "error", "errorCode": "3", "errorMessage": "Resource not found"}"#;
        let st: TellStatus = serde_json::from_str(raw).unwrap();
        assert_eq!(st.failure().as_deref(), Some("Resource not found"));
        let raw = r#"{"gid": "a", "status": "error", "errorCode": "3"}"#;
        let st: TellStatus = serde_json::from_str(raw).unwrap();
        assert_eq!(st.failure().as_deref(), Some("job failed with code 3"));
    }

    #[test]
    fn bad_number_is_an_error() {
        let raw = r#"{"totalLength": "lots"}"#;
        assert!(serde_json::from_str::<TellStatus>(raw).is_err());
    }
}
