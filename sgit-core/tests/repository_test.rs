//! Integration tests for SGit repository operations
//! These tests drive the public API end to end on real directories

use sgit_core::{ObjectId, Repository, RepositoryError, SyncPayload};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Test helper that creates an initialized repository in a temp dir
fn setup_test_repository() -> (TempDir, Repository) {
    let tmp = TempDir::new().unwrap();
    let repo = Repository::open(tmp.path());
    repo.init().unwrap();
    (tmp, repo)
}

fn write(root: &Path, path: &str, content: &[u8]) {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(full, content).unwrap();
}

fn read(root: &Path, path: &str) -> Vec<u8> {
    fs::read(root.join(path)).unwrap()
}

#[test]
fn test_commit_log_checkout_scenario() {
    let (tmp, repo) = setup_test_repository();

    write(tmp.path(), "f", b"1");
    let first = repo.commit("first", "A").unwrap();

    write(tmp.path(), "f", b"2");
    let second = repo.commit("second", "A").unwrap();

    let log = repo.log(2).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].id, second);
    assert_eq!(log[0].record.message, "second");
    assert_eq!(log[1].id, first);
    assert_eq!(log[1].record.message, "first");
    assert_eq!(log[1].record.parent, None);

    repo.checkout(&first).unwrap();
    assert_eq!(read(tmp.path(), "f"), b"1");
    assert_eq!(repo.head().unwrap(), Some(first));

    let status = repo.status().unwrap();
    assert!(status.modified.is_empty());
    assert!(status.is_clean());
}

#[test]
fn test_checkout_reproduces_tree_byte_for_byte() {
    let (tmp, repo) = setup_test_repository();
    let binary: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    write(tmp.path(), "top.txt", b"top level");
    write(tmp.path(), "nested/deeper/file.bin", &binary);
    write(tmp.path(), "nested/empty.txt", b"");
    let id = repo.commit("snapshot", "A").unwrap();

    // Scribble over the tree, then restore
    fs::remove_dir_all(tmp.path().join("nested")).unwrap();
    write(tmp.path(), "top.txt", b"changed");
    write(tmp.path(), "stray/untracked.txt", b"gone after checkout");

    repo.checkout(&id).unwrap();
    assert_eq!(read(tmp.path(), "top.txt"), b"top level");
    assert_eq!(read(tmp.path(), "nested/deeper/file.bin"), binary);
    assert_eq!(read(tmp.path(), "nested/empty.txt"), b"");
    assert!(!tmp.path().join("stray").exists());
    assert!(repo.status().unwrap().is_clean());
}

#[test]
fn test_commit_captures_untracked_and_deleted_files() {
    let (tmp, repo) = setup_test_repository();
    write(tmp.path(), "keep.txt", b"k");
    write(tmp.path(), "drop.txt", b"d");
    repo.commit("one", "A").unwrap();

    fs::remove_file(tmp.path().join("drop.txt")).unwrap();
    write(tmp.path(), "keep.txt", b"k2");
    write(tmp.path(), "new.txt", b"n");

    let status = repo.status().unwrap();
    assert_eq!(status.modified, vec!["keep.txt"]);
    assert_eq!(status.untracked, vec!["new.txt"]);
    assert_eq!(status.deleted, vec!["drop.txt"]);

    let id = repo.commit("two", "A").unwrap();
    let record = repo.store().get_commit(&id).unwrap().unwrap();
    let paths: Vec<_> = record.files.keys().cloned().collect();
    assert_eq!(paths, vec!["keep.txt", "new.txt"]);
}

#[test]
fn test_identical_content_is_stored_once() {
    let (tmp, repo) = setup_test_repository();
    write(tmp.path(), "a.txt", b"same");
    write(tmp.path(), "b.txt", b"same");
    repo.commit("dupes", "A").unwrap();

    let blobs = fs::read_dir(repo.store().objects_dir()).unwrap().count();
    // one shared blob plus the commit record
    assert_eq!(blobs, 2);
    assert!(repo.store().contains(&ObjectId::from_data(b"same")));
}

#[test]
fn test_sync_roundtrip_preserves_content() {
    let (src_dir, source) = setup_test_repository();
    write(src_dir.path(), "a.txt", b"x");
    write(src_dir.path(), "b/c.txt", b"y");
    source.commit("to sync", "A").unwrap();

    let payload = source.export().unwrap();
    let wire = serde_json::to_vec(&payload).unwrap();
    let received = SyncPayload::from_slice(&wire).unwrap();

    let dest_dir = TempDir::new().unwrap();
    let dest = Repository::open(dest_dir.path());
    assert!(!dest.is_repository());
    let imported = dest.import(&received).unwrap();

    assert!(dest.is_repository());
    assert_eq!(read(dest_dir.path(), "a.txt"), b"x");
    assert_eq!(read(dest_dir.path(), "b/c.txt"), b"y");
    assert_eq!(Some(imported), payload.head);
    assert_eq!(dest.head().unwrap(), payload.head);
    assert!(dest.status().unwrap().is_clean());
}

#[test]
fn test_import_replaces_existing_history() {
    let (src_dir, source) = setup_test_repository();
    write(src_dir.path(), "remote.txt", b"remote");
    source.commit("remote", "B").unwrap();

    let (dest_dir, dest) = setup_test_repository();
    write(dest_dir.path(), "local.txt", b"local");
    let local = dest.commit("local", "A").unwrap();

    let imported = dest.import(&source.export().unwrap()).unwrap();
    assert_eq!(dest.head().unwrap(), Some(imported));
    assert!(!dest_dir.path().join("local.txt").exists());
    assert_eq!(read(dest_dir.path(), "remote.txt"), b"remote");

    // The old commit is still addressable by digest
    assert!(dest.store().get_commit(&local).unwrap().is_some());
    let log = dest.log(10).unwrap();
    assert_eq!(log.len(), 1);
}

#[test]
fn test_import_without_files_is_invalid() {
    let (src_dir, source) = setup_test_repository();
    write(src_dir.path(), "a.txt", b"x");
    source.commit("m", "A").unwrap();
    let commit = source.export().unwrap().commit;

    let body = serde_json::json!({ "commit": commit, "head": null }).to_string();
    let err = SyncPayload::from_slice(body.as_bytes()).unwrap_err();
    match err {
        RepositoryError::InvalidPayload(reason) => assert!(reason.contains("files")),
        other => panic!("unexpected error: {other}"),
    }
}

#[cfg(unix)]
#[test]
fn test_backslash_filename_roundtrip() {
    let (tmp, repo) = setup_test_repository();
    write(tmp.path(), "a\\b.txt", b"backslash");
    write(tmp.path(), "plain.txt", b"plain");
    let id = repo.commit("odd names", "A").unwrap();

    let summary = repo.checkout(&id).unwrap();
    assert_eq!(summary.restored, 2);
    assert_eq!(summary.skipped, 0);
    assert_eq!(read(tmp.path(), "a\\b.txt"), b"backslash");

    let dest_dir = TempDir::new().unwrap();
    let dest = Repository::open(dest_dir.path());
    let imported = dest.import(&repo.export().unwrap()).unwrap();
    assert_eq!(imported, id);
    assert_eq!(read(dest_dir.path(), "a\\b.txt"), b"backslash");
}

#[cfg(unix)]
#[test]
fn test_commit_skips_non_utf8_names() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let (tmp, repo) = setup_test_repository();
    write(tmp.path(), "good.txt", b"g");
    fs::write(tmp.path().join(OsStr::from_bytes(b"bad\xff.txt")), b"b").unwrap();

    let id = repo.commit("m", "A").unwrap();
    let record = repo.store().get_commit(&id).unwrap().unwrap();
    assert_eq!(record.files.keys().collect::<Vec<_>>(), vec!["good.txt"]);
    assert_eq!(record.files["good.txt"], ObjectId::from_data(b"g"));
}
