//! Repository operations
//!
//! Ties the object store, HEAD and the working tree together. There is no
//! staging area: `commit` always records every regular file currently on
//! disk, and `checkout` always replaces the whole working tree.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::object::{CommitRecord, ObjectId};
use crate::refs::RefStore;
use crate::snapshot::{self, TreeDiff, is_safe_path};
use crate::storage::{CONTROL_DIR, ObjectStore, StorageError};
use crate::sync::SyncPayload;

/// Number of commits `log` returns when no limit is given
pub const DEFAULT_LOG_LIMIT: usize = 10;

/// Author recorded when none is given
pub const DEFAULT_AUTHOR: &str = "Simple Git User";

/// Marker holding the target of a checkout that has not finished
const CHECKOUT_MARKER: &str = "CHECKOUT";

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Errors raised by repository operations
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not a simple-git repository: {0}")]
    NotARepository(PathBuf),

    #[error("Commit {0} not found")]
    CommitNotFound(String),

    #[error("No commits to push")]
    NoCommitsToPush,

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<std::io::Error> for RepositoryError {
    fn from(e: std::io::Error) -> Self {
        RepositoryError::Storage(StorageError::Io(e))
    }
}

/// One entry of `log`, newest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub id: ObjectId,
    #[serde(flatten)]
    pub record: CommitRecord,
}

/// Result of `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryStatus {
    pub branch: String,
    /// Short HEAD digest, `None` before the first commit
    pub commit: Option<String>,
    /// Number of files in the working tree
    pub files: usize,
    pub modified: Vec<String>,
    pub untracked: Vec<String>,
    pub deleted: Vec<String>,
    /// Target of a checkout that was interrupted before completing
    pub interrupted: Option<ObjectId>,
}

impl RepositoryStatus {
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty() && self.untracked.is_empty() && self.deleted.is_empty()
    }
}

/// Result of `checkout`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutSummary {
    pub commit: ObjectId,
    pub restored: usize,
    pub skipped: usize,
}

/// A working tree plus its `.sgit` control directory
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
    store: ObjectStore,
    refs: RefStore,
}

impl Repository {
    /// Open a repository handle at `root` (no I/O)
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let control_dir = root.join(CONTROL_DIR);
        Self {
            store: ObjectStore::new(&control_dir),
            refs: RefStore::new(&control_dir),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Whether `.sgit` exists
    pub fn is_repository(&self) -> bool {
        self.store.is_initialized()
    }

    /// Create the control directory; `false` if it already existed
    pub fn init(&self) -> Result<bool> {
        let created = self.store.init()?;
        if created {
            tracing::info!("Initialized empty repository at {:?}", self.root);
        }
        Ok(created)
    }

    fn ensure_repository(&self) -> Result<()> {
        if self.is_repository() {
            Ok(())
        } else {
            Err(RepositoryError::NotARepository(self.root.clone()))
        }
    }

    /// Current HEAD commit, if any
    pub fn head(&self) -> Result<Option<ObjectId>> {
        Ok(self.refs.head()?)
    }

    pub fn branch(&self) -> Result<String> {
        Ok(self.refs.branch()?)
    }

    /// Record every file currently in the working tree
    pub fn commit(&self, message: &str, author: &str) -> Result<ObjectId> {
        self.ensure_repository()?;

        let mut files = BTreeMap::new();
        snapshot::walk_working_tree(&self.root, |path, data| {
            files.insert(path.to_string(), self.store.put(data)?);
            Ok(())
        })?;

        let parent = self.refs.head()?;
        let record = CommitRecord::new(message.to_string(), author.to_string(), parent, files);
        let id = self.store.put_commit(&record)?;
        self.refs.update_head(&id)?;

        tracing::info!("Committed {} files as {}", record.files.len(), id.short());
        Ok(id)
    }

    /// Walk history from HEAD, newest first
    ///
    /// Stops at the first commit or at a parent whose record is missing.
    pub fn log(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.ensure_repository()?;

        let mut entries = Vec::new();
        let mut current = self.refs.head()?;
        while let Some(id) = current {
            if entries.len() >= limit {
                break;
            }
            let record = match self.store.get_commit(&id)? {
                Some(record) => record,
                None => {
                    tracing::debug!("History truncated at missing commit {}", id);
                    break;
                }
            };
            current = record.parent;
            entries.push(LogEntry { id, record });
        }
        Ok(entries)
    }

    /// Compare the working tree with HEAD
    pub fn status(&self) -> Result<RepositoryStatus> {
        self.ensure_repository()?;

        let branch = self.refs.branch()?;
        let interrupted = self.interrupted_checkout()?;
        let scan = snapshot::scan_working_tree(&self.root)?;

        let head = match self.refs.head()? {
            Some(head) => head,
            None => {
                return Ok(RepositoryStatus {
                    branch,
                    commit: None,
                    files: scan.len(),
                    modified: Vec::new(),
                    untracked: scan.keys().cloned().collect(),
                    deleted: Vec::new(),
                    interrupted,
                });
            }
        };

        let committed = self
            .store
            .get_commit(&head)?
            .map(|record| record.files)
            .unwrap_or_default();
        let TreeDiff {
            modified,
            untracked,
            deleted,
        } = snapshot::diff_against_commit(&scan, &committed);

        Ok(RepositoryStatus {
            branch,
            commit: Some(head.short()),
            files: scan.len(),
            modified,
            untracked,
            deleted,
            interrupted,
        })
    }

    /// Resolve a full digest or a unique prefix of at least 4 hex chars to a commit
    pub fn resolve_commit(&self, rev: &str) -> Result<ObjectId> {
        let rev = rev.trim().to_ascii_lowercase();
        if let Ok(id) = ObjectId::from_hex(&rev) {
            return Ok(id);
        }
        if rev.len() < 4 || !rev.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RepositoryError::CommitNotFound(rev));
        }

        let mut matches = Vec::new();
        let objects_dir = self.store.objects_dir();
        if objects_dir.is_dir() {
            for entry in fs::read_dir(&objects_dir)? {
                let name = entry?.file_name();
                let name = name.to_string_lossy();
                if !name.starts_with(&rev) {
                    continue;
                }
                if let Ok(id) = ObjectId::from_hex(&name) {
                    if matches!(self.store.get_commit(&id), Ok(Some(_))) {
                        matches.push(id);
                    }
                }
            }
        }

        match matches.as_slice() {
            [id] => Ok(*id),
            _ => Err(RepositoryError::CommitNotFound(rev)),
        }
    }

    /// Make the working tree and HEAD equal to `id`
    ///
    /// Unknown commits fail before anything on disk changes.
    pub fn checkout(&self, id: &ObjectId) -> Result<CheckoutSummary> {
        self.ensure_repository()?;

        let record = self
            .store
            .get_commit(id)?
            .ok_or_else(|| RepositoryError::CommitNotFound(id.to_hex()))?;

        let marker = self.checkout_marker_path();
        fs::write(&marker, format!("{}\n", id))?;

        let summary = snapshot::materialize(&self.store, &record, &self.root)?;
        self.refs.update_head(id)?;
        fs::remove_file(&marker)?;

        tracing::info!(
            "Checked out {} ({} files restored, {} skipped)",
            id.short(),
            summary.restored,
            summary.skipped
        );
        Ok(CheckoutSummary {
            commit: *id,
            restored: summary.restored,
            skipped: summary.skipped,
        })
    }

    fn checkout_marker_path(&self) -> PathBuf {
        self.store.control_dir().join(CHECKOUT_MARKER)
    }

    /// Target of a checkout that started but never finished
    pub fn interrupted_checkout(&self) -> Result<Option<ObjectId>> {
        match fs::read_to_string(self.checkout_marker_path()) {
            Ok(content) => Ok(ObjectId::from_hex(content.trim()).ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Package HEAD's snapshot for transfer
    pub fn export(&self) -> Result<SyncPayload> {
        self.ensure_repository()?;

        let head = self.refs.head()?.ok_or(RepositoryError::NoCommitsToPush)?;
        let record = self
            .store
            .get_commit(&head)?
            .ok_or_else(|| RepositoryError::CommitNotFound(head.to_hex()))?;

        let mut contents = BTreeMap::new();
        for (path, digest) in &record.files {
            match self.store.get(digest)? {
                Some(data) => {
                    contents.insert(path.clone(), data);
                }
                None => tracing::warn!("Object {} for {} not found, not exported", digest, path),
            }
        }

        Ok(SyncPayload::new(record, &contents, head))
    }

    /// Replace local state with a received snapshot
    ///
    /// Initializes the repository on first contact. The commit id is
    /// recomputed locally; the payload's `head` is never trusted. Older local
    /// commits stay in the object store but leave the HEAD chain unless the
    /// imported commit's parent references them.
    pub fn import(&self, payload: &SyncPayload) -> Result<ObjectId> {
        if let Some(path) = payload.commit.files.keys().find(|p| !is_safe_path(p)) {
            return Err(RepositoryError::InvalidPayload(format!(
                "unsafe file path {:?}",
                path
            )));
        }
        let contents = payload.decode_files()?;

        if self.init()? {
            tracing::info!("Auto-initialized repository for import at {:?}", self.root);
        }

        let id = self.store.put_commit(&payload.commit)?;
        if let Some(claimed) = payload.head {
            if claimed != id {
                tracing::warn!("Payload head {} does not match computed {}", claimed, id);
            }
        }

        for data in contents.values() {
            self.store.put(data)?;
        }

        self.checkout(&id)?;
        Ok(id)
    }
}
