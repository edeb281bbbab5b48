//! Wire types for whole-repository synchronization
//!
//! Shared by the HTTP server (`/{repo}/push`, `/{repo}/pull`,
//! `/{repo}/status`, `/`) and the client. A payload always carries the full
//! snapshot of one commit; there is no incremental transfer.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::object::{CommitRecord, ObjectId};
use crate::repository::RepositoryError;
use crate::snapshot::is_safe_path;

/// Body of `POST /{repo}/push` and of a successful `GET /{repo}/pull`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPayload {
    /// The commit being transferred
    pub commit: CommitRecord,
    /// Path to base64-encoded file contents
    pub files: BTreeMap<String, String>,
    /// Digest the sender computed for `commit`; informational only
    #[serde(default)]
    pub head: Option<ObjectId>,
}

impl SyncPayload {
    /// Build a payload from raw file contents
    pub fn new(commit: CommitRecord, files: &BTreeMap<String, Vec<u8>>, head: ObjectId) -> Self {
        Self {
            commit,
            files: files
                .iter()
                .map(|(path, data)| (path.clone(), STANDARD.encode(data)))
                .collect(),
            head: Some(head),
        }
    }

    /// Parse a payload received over the wire
    pub fn from_slice(data: &[u8]) -> Result<Self, RepositoryError> {
        serde_json::from_slice(data).map_err(|e| RepositoryError::InvalidPayload(e.to_string()))
    }

    /// Decode every file, rejecting bad base64 and paths that escape the tree
    pub fn decode_files(&self) -> Result<BTreeMap<String, Vec<u8>>, RepositoryError> {
        let mut decoded = BTreeMap::new();
        for (path, encoded) in &self.files {
            if !is_safe_path(path) {
                return Err(RepositoryError::InvalidPayload(format!(
                    "unsafe file path {:?}",
                    path
                )));
            }
            let data = STANDARD.decode(encoded).map_err(|e| {
                RepositoryError::InvalidPayload(format!("invalid base64 for {}: {}", path, e))
            })?;
            decoded.insert(path.clone(), data);
        }
        Ok(decoded)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Response to a successful push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    pub success: bool,
    pub message: String,
    /// Full digest of the commit the server now has at HEAD
    #[serde(default)]
    pub commit: Option<String>,
}

/// Response of `GET /{repo}/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
    pub repository: String,
    /// Short head digest, `None` before the first push
    pub commit: Option<String>,
    pub files: usize,
    /// Time the status was produced, not the commit time
    pub last_update: Option<String>,
    pub branch: String,
}

/// Response of `GET /`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryList {
    pub repositories: Vec<String>,
    pub count: usize,
}

impl RepositoryList {
    pub fn new(repositories: Vec<String>) -> Self {
        let count = repositories.len();
        Self {
            repositories,
            count,
        }
    }
}

/// Body of every non-2xx response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit() -> CommitRecord {
        let mut files = BTreeMap::new();
        files.insert("a.txt".to_string(), ObjectId::from_data(b"x"));
        CommitRecord::new("m".into(), "a".into(), None, files)
    }

    #[test]
    fn test_payload_missing_fields_is_invalid() {
        let err = SyncPayload::from_slice(br#"{"files": {}}"#).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidPayload(_)));

        let body = serde_json::json!({ "commit": commit() }).to_string();
        let err = SyncPayload::from_slice(body.as_bytes()).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidPayload(_)));

        let err = SyncPayload::from_slice(b"not json").unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidPayload(_)));
    }

    #[test]
    fn test_payload_head_is_optional() {
        let body = serde_json::json!({ "commit": commit(), "files": {} }).to_string();
        let payload = SyncPayload::from_slice(body.as_bytes()).unwrap();
        assert_eq!(payload.head, None);
    }

    #[test]
    fn test_decode_files() {
        let mut raw = BTreeMap::new();
        raw.insert("a.txt".to_string(), b"x".to_vec());
        raw.insert("bin/data".to_string(), vec![0u8, 159, 255]);
        let payload = SyncPayload::new(commit(), &raw, ObjectId::from_data(b"h"));

        assert_eq!(payload.files["a.txt"], "eA==");
        assert_eq!(payload.decode_files().unwrap(), raw);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        let mut payload = SyncPayload::new(commit(), &BTreeMap::new(), ObjectId::from_data(b"h"));
        payload.files.insert("ok.txt".into(), "%%%".into());
        assert!(matches!(
            payload.decode_files(),
            Err(RepositoryError::InvalidPayload(_))
        ));

        payload.files.clear();
        payload.files.insert("../evil".into(), "eA==".into());
        assert!(matches!(
            payload.decode_files(),
            Err(RepositoryError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_remote_status_wire_names() {
        let status = RemoteStatus {
            repository: "demo".into(),
            commit: None,
            files: 0,
            last_update: None,
            branch: "main".into(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert!(json.get("lastUpdate").is_some());
        assert!(json["commit"].is_null());
    }
}
