//! Core object model for SGit
//!
//! Content-addressable identifiers and the commit record. File contents and
//! serialized commits are both stored as plain blobs keyed by [`ObjectId`].

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// Length of a digest in bytes (SHA-1)
pub const DIGEST_LEN: usize = 20;

/// Number of hex characters shown for abbreviated ids
pub const SHORT_ID_LEN: usize = 8;

/// Unique identifier for any stored object
///
/// Serialized as a lowercase hex string so commit records and sync payloads
/// stay readable JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId([u8; DIGEST_LEN]);

impl ObjectId {
    /// Create a new ObjectId from raw bytes
    pub fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Compute ObjectId from data
    pub fn from_data(data: &[u8]) -> Self {
        let hash = Sha1::digest(data);
        Self(hash.into())
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated hex form used in user-facing output
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(SHORT_ID_LEN);
        hex
    }

    /// Parse from hexadecimal string
    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        if bytes.len() != DIGEST_LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; DIGEST_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for ObjectId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}

impl TryFrom<String> for ObjectId {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.to_hex()
    }
}

/// Snapshot of the whole working tree at one point in history
///
/// Field order is the serialization order; `files` is sorted by path so the
/// same snapshot always hashes to the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Commit message
    pub message: String,
    /// Author name
    pub author: String,
    /// ISO-8601 timestamp (UTC)
    pub timestamp: String,
    /// Previous commit, `None` for the first one
    pub parent: Option<ObjectId>,
    /// Repo-relative path (`/`-separated) to blob id
    #[serde(default)]
    pub files: BTreeMap<String, ObjectId>,
}

impl CommitRecord {
    /// Create a new commit stamped with the current time
    pub fn new(
        message: String,
        author: String,
        parent: Option<ObjectId>,
        files: BTreeMap<String, ObjectId>,
    ) -> Self {
        Self {
            message,
            author,
            timestamp: now_iso8601(),
            parent,
            files,
        }
    }

    /// Serialize to the canonical stored form
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Deserialize from the stored form
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Compute the object ID
    pub fn id(&self) -> Result<ObjectId, serde_json::Error> {
        Ok(ObjectId::from_data(&self.to_bytes()?))
    }

    /// Check if this is an initial commit (no parent)
    pub fn is_initial(&self) -> bool {
        self.parent.is_none()
    }
}

/// Current time as `2024-01-02T03:04:05.678Z`
pub fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_roundtrip() {
        let bytes = [42u8; DIGEST_LEN];
        let id = ObjectId::new(bytes);
        let hex = id.to_hex();
        let id2 = ObjectId::from_hex(&hex).unwrap();
        assert_eq!(id, id2);
    }

    #[test]
    fn test_object_id_is_sha1() {
        let id = ObjectId::from_data(b"hello world");
        assert_eq!(id.to_hex(), "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
        assert_eq!(id.short(), "2aae6c35");
    }

    #[test]
    fn test_object_id_rejects_wrong_length() {
        assert!(ObjectId::from_hex("abcd").is_err());
        assert!(ObjectId::from_hex("zz").is_err());
    }

    #[test]
    fn test_object_id_serializes_as_hex() {
        let id = ObjectId::from_data(b"x");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_commit_serialization() {
        let mut files = BTreeMap::new();
        files.insert("b/c.txt".to_string(), ObjectId::from_data(b"y"));
        files.insert("a.txt".to_string(), ObjectId::from_data(b"x"));
        let commit = CommitRecord::new("msg".into(), "A".into(), None, files);

        let bytes = commit.to_bytes().unwrap();
        let commit2 = CommitRecord::from_bytes(&bytes).unwrap();
        assert_eq!(commit, commit2);
        assert_eq!(commit.id().unwrap(), commit2.id().unwrap());
        assert!(commit2.is_initial());
    }

    #[test]
    fn test_commit_null_parent_in_json() {
        let commit = CommitRecord::new("m".into(), "a".into(), None, BTreeMap::new());
        let text = String::from_utf8(commit.to_bytes().unwrap()).unwrap();
        assert!(text.contains("\"parent\": null"));
        let message_pos = text.find("\"message\"").unwrap();
        let files_pos = text.find("\"files\"").unwrap();
        assert!(message_pos < files_pos);
    }

    #[test]
    fn test_timestamp_format() {
        let ts = now_iso8601();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
