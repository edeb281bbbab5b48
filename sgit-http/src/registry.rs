//! Named repositories under the server's base path
//!
//! Handles are created lazily on first use and cached for the life of the
//! registry. The lock only guards the map; operations on a repository are
//! not serialized, so concurrent pushes to one name race and the last import
//! wins.

use sgit_core::{CONTROL_DIR, Repository, RepositoryError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Repository registry for multi-repository mode
pub struct RepositoryRegistry {
    base_path: PathBuf,
    repositories: RwLock<HashMap<String, Arc<Repository>>>,
}

impl RepositoryRegistry {
    /// Create a registry rooted at `base_path` (no I/O)
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            repositories: RwLock::new(HashMap::new()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Get a cached handle without touching disk
    pub async fn get(&self, name: &str) -> Option<Arc<Repository>> {
        self.repositories.read().await.get(name).cloned()
    }

    /// Get the repository called `name`, creating and initializing it on disk
    /// if needed
    pub async fn get_or_create(&self, name: &str) -> Result<Arc<Repository>, RepositoryError> {
        if let Some(repo) = self.get(name).await {
            return Ok(repo);
        }

        let mut repositories = self.repositories.write().await;
        if let Some(repo) = repositories.get(name) {
            return Ok(repo.clone());
        }

        let path = self.base_path.join(name);
        fs::create_dir_all(&path)?;
        let repo = Repository::open(path);
        if repo.init()? {
            tracing::info!("Initialized repository: {}", name);
        }

        let repo = Arc::new(repo);
        repositories.insert(name.to_string(), repo.clone());
        Ok(repo)
    }

    /// Names of cached handles
    pub async fn cached(&self) -> Vec<String> {
        let mut names: Vec<String> = self.repositories.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Every child of the base path that has a control directory, sorted
    ///
    /// This is a directory scan, so a repository is listed as soon as its
    /// control directory exists, whether or not it has commits.
    pub fn list_on_disk(&self) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        if !self.base_path.is_dir() {
            return Ok(names);
        }
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if entry.path().join(CONTROL_DIR).is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Check that a path segment can name a directory under the base path
pub fn validate_repo_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Repository name is required".to_string());
    }
    if name.starts_with('.') {
        return Err(format!("Invalid repository name '{}'", name));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(format!("Invalid repository name '{}'", name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_get_or_create_caches_handle() {
        let tmp = TempDir::new().unwrap();
        let registry = RepositoryRegistry::new(tmp.path());
        assert!(registry.get("demo").await.is_none());

        let first = registry.get_or_create("demo").await.unwrap();
        let second = registry.get_or_create("demo").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(tmp.path().join("demo/.sgit").is_dir());
        assert_eq!(registry.cached().await, vec!["demo"]);
    }

    #[test]
    fn test_list_on_disk_requires_control_dir() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("b/.sgit")).unwrap();
        fs::create_dir_all(tmp.path().join("a/.sgit")).unwrap();
        fs::create_dir_all(tmp.path().join("plain-dir")).unwrap();
        fs::write(tmp.path().join("file.txt"), "x").unwrap();

        let registry = RepositoryRegistry::new(tmp.path());
        assert_eq!(registry.list_on_disk().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_list_on_missing_base_path() {
        let tmp = TempDir::new().unwrap();
        let registry = RepositoryRegistry::new(tmp.path().join("missing"));
        assert!(registry.list_on_disk().unwrap().is_empty());
    }

    #[test]
    fn test_validate_repo_name() {
        assert!(validate_repo_name("my-project_2.0").is_ok());
        assert!(validate_repo_name("").is_err());
        assert!(validate_repo_name("..").is_err());
        assert!(validate_repo_name(".hidden").is_err());
        assert!(validate_repo_name("a%2Fb").is_err());
        assert!(validate_repo_name("spaces here").is_err());
    }
}
