//! SGit Core Library
//!
//! Core functionality for SGit including:
//! - Object model (content-addressed ids, commit records)
//! - Flat object store under `.sgit/objects`
//! - HEAD and named references
//! - Working tree scan, restore and diff
//! - Repository operations (init/commit/log/status/checkout/export/import)
//! - Wire types for whole-repository sync

pub mod object;
pub mod refs;
pub mod repository;
pub mod snapshot;
pub mod storage;
pub mod sync;

pub use object::{CommitRecord, ObjectId};
pub use refs::{DEFAULT_BRANCH, Head, RefStore};
pub use repository::{
    CheckoutSummary, DEFAULT_AUTHOR, DEFAULT_LOG_LIMIT, LogEntry, Repository, RepositoryError,
    RepositoryStatus,
};
pub use snapshot::{FileState, MaterializeSummary, TreeDiff, WorkingTree};
pub use storage::{CONTROL_DIR, ObjectStore, Result, StorageError};
pub use sync::{ErrorBody, PushResponse, RemoteStatus, RepositoryList, SyncPayload};
