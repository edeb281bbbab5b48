//! Working tree snapshots
//!
//! A scan is recomputed from scratch every time it is needed and is never
//! persisted. Comparison against a commit is by digest only; size and
//! modification time are informational.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

use crate::object::{CommitRecord, ObjectId};
use crate::storage::{CONTROL_DIR, ObjectStore, Result};

/// State of one regular file at scan time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    /// Digest of the current bytes
    pub digest: ObjectId,
    /// Size in bytes
    pub size: u64,
    /// Modification time, milliseconds since the Unix epoch
    pub modified: i64,
}

/// Path to file state, keyed by `/`-separated repo-relative path
pub type WorkingTree = BTreeMap<String, FileState>;

/// Difference between a scan and a commit's file set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDiff {
    pub modified: Vec<String>,
    pub untracked: Vec<String>,
    pub deleted: Vec<String>,
}

impl TreeDiff {
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty() && self.untracked.is_empty() && self.deleted.is_empty()
    }
}

/// Outcome of restoring a commit into a working tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeSummary {
    /// Files written
    pub restored: usize,
    /// Files listed in the commit but not written (missing blob or unsafe path)
    pub skipped: usize,
}

/// Scan every regular file under `root`
///
/// Entries named `.sgit` are pruned at any depth and symlinks are not
/// followed, so the control directory is never reached through an alias.
pub fn scan_working_tree(root: &Path) -> Result<WorkingTree> {
    walk_working_tree(root, |_, _| Ok(()))
}

/// Scan like [`scan_working_tree`], handing each file's bytes to `visit`
///
/// `visit` sees exactly the bytes the returned digest was computed from.
/// Names that cannot be recorded as a repo path (not UTF-8, or containing a
/// separator of another platform) are skipped with a warning.
pub fn walk_working_tree<F>(root: &Path, mut visit: F) -> Result<WorkingTree>
where
    F: FnMut(&str, &[u8]) -> Result<()>,
{
    let mut files = WorkingTree::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != CONTROL_DIR);

    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = match entry.path().strip_prefix(root) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let Some(path) = to_repo_path(relative) else {
            tracing::warn!("Skipping {:?}: name cannot be recorded", relative);
            continue;
        };

        let data = fs::read(entry.path())?;
        let metadata = entry.metadata().map_err(std::io::Error::from)?;
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        visit(&path, &data)?;
        files.insert(
            path,
            FileState {
                digest: ObjectId::from_data(&data),
                size: data.len() as u64,
                modified,
            },
        );
    }

    tracing::debug!("Scanned {} files under {:?}", files.len(), root);
    Ok(files)
}

/// Classify every path as modified, untracked or deleted
pub fn diff_against_commit(scan: &WorkingTree, committed: &BTreeMap<String, ObjectId>) -> TreeDiff {
    let mut diff = TreeDiff::default();

    for (path, state) in scan {
        match committed.get(path) {
            Some(digest) if *digest != state.digest => diff.modified.push(path.clone()),
            Some(_) => {}
            None => diff.untracked.push(path.clone()),
        }
    }

    diff.deleted = committed
        .keys()
        .filter(|path| !scan.contains_key(*path))
        .cloned()
        .collect();

    diff
}

/// Replace everything under `root` (except `.sgit`) with the commit's files
///
/// Two phases: every existing entry is enumerated and deleted first, then
/// every committed file is written. Untracked files do not survive.
pub fn materialize(store: &ObjectStore, commit: &CommitRecord, root: &Path) -> Result<MaterializeSummary> {
    clear_working_tree(root)?;

    let mut summary = MaterializeSummary::default();
    for (path, digest) in &commit.files {
        if !is_safe_path(path) {
            tracing::warn!("Skipping unsafe path {:?} in commit", path);
            summary.skipped += 1;
            continue;
        }
        let data = match store.get(digest)? {
            Some(data) => data,
            None => {
                tracing::warn!("Object {} for {} not found, skipping", digest, path);
                summary.skipped += 1;
                continue;
            }
        };

        let full_path = root.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full_path, &data)?;
        summary.restored += 1;
    }

    Ok(summary)
}

/// Delete every top-level entry of `root` except the control directory
pub fn clear_working_tree(root: &Path) -> Result<usize> {
    let mut doomed: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_name() == CONTROL_DIR {
            continue;
        }
        doomed.push(entry.path());
    }

    for path in &doomed {
        let file_type = fs::symlink_metadata(path)?.file_type();
        if file_type.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
    }

    Ok(doomed.len())
}

/// Whether `path` is a plain relative path that stays inside the working tree
///
/// A backslash is an ordinary filename character on Unix and a separator elsewhere.
pub fn is_safe_path(path: &str) -> bool {
    if path.is_empty() || path.contains('\0') {
        return false;
    }
    if !cfg!(unix) && path.contains('\\') {
        return false;
    }
    let mut components = Path::new(path).components().peekable();
    if components.peek().is_none() {
        return false;
    }
    path.split('/')
        .all(|part| !matches!(part, "" | "." | "..") && part != CONTROL_DIR)
        && components.all(|c| matches!(c, Component::Normal(_)))
}

/// `/`-joined form of a relative path, `None` if it cannot round-trip
fn to_repo_path(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            let part = part.to_str()?;
            if !cfg!(unix) && part.contains('\\') {
                return None;
            }
            parts.push(part);
        }
    }
    let path = parts.join("/");
    is_safe_path(&path).then_some(path)
}
