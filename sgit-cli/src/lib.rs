//! Client side of sgit: the sync protocol client used by the `sgit` binary.

pub mod remote;

pub use remote::{RemoteClient, RemoteError};
