//! HEAD and named references
//!
//! HEAD either holds a commit id directly or points at a ref file
//! (`ref: refs/heads/main`) that holds one. Only one level of indirection is
//! followed.

use std::fs;
use std::path::{Path, PathBuf};

use crate::object::ObjectId;
use crate::storage::{Result, StorageError};

/// Prefix marking a symbolic HEAD
const SYMBOLIC_PREFIX: &str = "ref: ";

/// The single branch every repository starts on
pub const DEFAULT_BRANCH: &str = "main";

/// HEAD contents of a freshly initialized repository
pub const DEFAULT_HEAD: &str = "ref: refs/heads/main\n";

/// Parsed contents of the HEAD file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// HEAD names a commit directly
    Direct(ObjectId),
    /// HEAD names a ref file, relative to the control directory
    Symbolic(String),
}

impl Head {
    /// Parse HEAD file contents
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let content = content.trim();
        if let Some(target) = content.strip_prefix(SYMBOLIC_PREFIX) {
            let target = target.trim();
            if target.is_empty() {
                return Err("empty symbolic ref".to_string());
            }
            return Ok(Head::Symbolic(target.to_string()));
        }
        ObjectId::from_hex(content)
            .map(Head::Direct)
            .map_err(|e| format!("expected commit id, got {:?}: {}", content, e))
    }

    /// Serialize to HEAD file contents
    pub fn to_file_content(&self) -> String {
        match self {
            Head::Direct(id) => format!("{}\n", id),
            Head::Symbolic(target) => format!("{}{}\n", SYMBOLIC_PREFIX, target),
        }
    }

    fn default_symbolic() -> Self {
        Head::Symbolic(format!("refs/heads/{}", DEFAULT_BRANCH))
    }
}

/// Reads and advances HEAD inside a control directory
#[derive(Debug, Clone)]
pub struct RefStore {
    control_dir: PathBuf,
}

impl RefStore {
    pub fn new(control_dir: impl Into<PathBuf>) -> Self {
        Self {
            control_dir: control_dir.into(),
        }
    }

    fn head_path(&self) -> PathBuf {
        self.control_dir.join("HEAD")
    }

    fn ref_path(&self, target: &str) -> PathBuf {
        self.control_dir.join(target)
    }

    /// Read and parse HEAD; `None` if the file does not exist
    pub fn read_head(&self) -> Result<Option<Head>> {
        let path = self.head_path();
        let content = match read_optional(&path)? {
            Some(content) => content,
            None => return Ok(None),
        };
        Head::parse(&content)
            .map(Some)
            .map_err(|reason| StorageError::InvalidRef { path, reason })
    }

    /// Resolve HEAD to a commit id
    ///
    /// `None` is the normal state of a repository without commits.
    pub fn head(&self) -> Result<Option<ObjectId>> {
        match self.read_head()? {
            None => Ok(None),
            Some(Head::Direct(id)) => Ok(Some(id)),
            Some(Head::Symbolic(target)) => {
                let path = self.ref_path(&target);
                match read_optional(&path)? {
                    None => Ok(None),
                    Some(content) => ObjectId::from_hex(content.trim())
                        .map(Some)
                        .map_err(|e| StorageError::InvalidRef {
                            path,
                            reason: e.to_string(),
                        }),
                }
            }
        }
    }

    /// Point HEAD (or the ref it names) at `id`
    pub fn update_head(&self, id: &ObjectId) -> Result<()> {
        let head = self.read_head()?.unwrap_or_else(Head::default_symbolic);
        match head {
            Head::Direct(_) => {
                fs::write(self.head_path(), Head::Direct(*id).to_file_content())?;
            }
            Head::Symbolic(target) => {
                let path = self.ref_path(&target);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, format!("{}\n", id))?;
                if !self.head_path().exists() {
                    fs::write(self.head_path(), DEFAULT_HEAD)?;
                }
            }
        }
        tracing::debug!("HEAD -> {}", id);
        Ok(())
    }

    /// Short branch name for display (`HEAD` when detached)
    pub fn branch(&self) -> Result<String> {
        Ok(match self.read_head()? {
            Some(Head::Symbolic(target)) => target
                .rsplit('/')
                .next()
                .unwrap_or(DEFAULT_BRANCH)
                .to_string(),
            Some(Head::Direct(_)) => "HEAD".to_string(),
            None => DEFAULT_BRANCH.to_string(),
        })
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CONTROL_DIR, ObjectStore};
    use tempfile::TempDir;

    fn refs() -> (TempDir, RefStore) {
        let tmp = TempDir::new().unwrap();
        let control = tmp.path().join(CONTROL_DIR);
        ObjectStore::new(&control).init().unwrap();
        (tmp, RefStore::new(control))
    }

    #[test]
    fn test_parse_head() {
        assert_eq!(
            Head::parse("ref: refs/heads/main\n").unwrap(),
            Head::Symbolic("refs/heads/main".into())
        );
        let id = ObjectId::from_data(b"c");
        assert_eq!(Head::parse(&format!("{}\n", id)).unwrap(), Head::Direct(id));
        assert!(Head::parse("garbage").is_err());
        assert!(Head::parse("ref: ").is_err());
    }

    #[test]
    fn test_fresh_repository_has_no_head() {
        let (_tmp, refs) = refs();
        assert_eq!(refs.head().unwrap(), None);
        assert_eq!(refs.branch().unwrap(), "main");
    }

    #[test]
    fn test_update_through_symbolic_ref() {
        let (tmp, refs) = refs();
        let id = ObjectId::from_data(b"commit");
        refs.update_head(&id).unwrap();

        assert_eq!(refs.head().unwrap(), Some(id));
        let main = fs::read_to_string(tmp.path().join(".sgit/refs/heads/main")).unwrap();
        assert_eq!(main, format!("{}\n", id));
        let head = fs::read_to_string(tmp.path().join(".sgit/HEAD")).unwrap();
        assert_eq!(head, DEFAULT_HEAD);
    }

    #[test]
    fn test_update_direct_head() {
        let (tmp, refs) = refs();
        let first = ObjectId::from_data(b"1");
        let second = ObjectId::from_data(b"2");
        fs::write(tmp.path().join(".sgit/HEAD"), format!("{}\n", first)).unwrap();
        assert_eq!(refs.head().unwrap(), Some(first));

        refs.update_head(&second).unwrap();
        assert_eq!(refs.head().unwrap(), Some(second));
        assert!(!tmp.path().join(".sgit/refs/heads/main").exists());
        assert_eq!(refs.branch().unwrap(), "HEAD");
    }

    #[test]
    fn test_corrupt_ref_is_error() {
        let (tmp, refs) = refs();
        fs::create_dir_all(tmp.path().join(".sgit/refs/heads")).unwrap();
        fs::write(tmp.path().join(".sgit/refs/heads/main"), "nope\n").unwrap();
        assert!(matches!(refs.head(), Err(StorageError::InvalidRef { .. })));
    }
}
