//! Storage layer for SGit
//!
//! Flat content-addressed object directory under `.sgit/objects`. Every
//! object is written once, named by its own digest, and never removed: there
//! is no reachability analysis or garbage collection, so unreferenced blobs
//! accumulate for the life of the repository.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::object::{CommitRecord, ObjectId};
use crate::refs::DEFAULT_HEAD;

/// Name of the control directory inside a working tree
pub const CONTROL_DIR: &str = ".sgit";

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(ObjectId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid reference {path}: {reason}")]
    InvalidRef { path: PathBuf, reason: String },
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Content-addressed blob store rooted at a `.sgit` directory
#[derive(Debug, Clone)]
pub struct ObjectStore {
    control_dir: PathBuf,
}

impl ObjectStore {
    /// Create a store handle for `control_dir` (no I/O)
    pub fn new(control_dir: impl Into<PathBuf>) -> Self {
        Self {
            control_dir: control_dir.into(),
        }
    }

    pub fn control_dir(&self) -> &Path {
        &self.control_dir
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.control_dir.join("objects")
    }

    /// Whether the control directory exists
    pub fn is_initialized(&self) -> bool {
        self.control_dir.is_dir()
    }

    /// Create the control directory layout
    ///
    /// Returns `false` without touching anything when the control directory
    /// already exists.
    pub fn init(&self) -> Result<bool> {
        if self.control_dir.exists() {
            return Ok(false);
        }
        fs::create_dir_all(self.objects_dir())?;
        fs::create_dir_all(self.control_dir.join("refs"))?;
        fs::write(self.control_dir.join("HEAD"), DEFAULT_HEAD)?;
        tracing::debug!("Created control directory at {:?}", self.control_dir);
        Ok(true)
    }

    fn object_path(&self, id: &ObjectId) -> PathBuf {
        self.objects_dir().join(id.to_hex())
    }

    /// Check if an object exists
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.object_path(id).is_file()
    }

    /// Store `data`, returning its id
    ///
    /// First writer wins; an existing object is never rewritten.
    pub fn put(&self, data: &[u8]) -> Result<ObjectId> {
        let id = ObjectId::from_data(data);
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }

        // Write atomically via temp file
        let dir = self.objects_dir();
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(data)?;
        tmp.persist(&path).map_err(|e| StorageError::Io(e.error))?;

        tracing::trace!("Stored object {} ({} bytes)", id, data.len());
        Ok(id)
    }

    /// Load an object; `None` when it was never stored
    pub fn get(&self, id: &ObjectId) -> Result<Option<Vec<u8>>> {
        match fs::read(self.object_path(id)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load an object that must exist
    pub fn require(&self, id: &ObjectId) -> Result<Vec<u8>> {
        self.get(id)?.ok_or(StorageError::NotFound(*id))
    }

    /// Serialize and store a commit record
    pub fn put_commit(&self, commit: &CommitRecord) -> Result<ObjectId> {
        let data = commit.to_bytes()?;
        self.put(&data)
    }

    /// Load a commit record; `None` when absent, error when malformed
    pub fn get_commit(&self, id: &ObjectId) -> Result<Option<CommitRecord>> {
        match self.get(id)? {
            Some(data) => Ok(Some(CommitRecord::from_bytes(&data)?)),
            None => Ok(None),
        }
    }
}
