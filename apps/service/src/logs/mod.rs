//! Per-check outcome logs: one append-only log per check, plus the compressed
//! archives produced by rotation.

pub mod file;

use anyhow::Result;
use async_trait::async_trait;

pub use file::FileLogStore;

/// Which logs [`LogStore::list`] should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    /// Uncompressed logs still being appended to
    Live,
    /// Compressed archives written by rotation
    Archived,
}

#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one line to the live log `name`, creating it when absent
    async fn append(&self, name: &str, line: &str) -> Result<()>;

    /// Names of the logs of the given kind, sorted
    async fn list(&self, kind: LogKind) -> Result<Vec<String>>;

    /// Compress the current contents of live log `name` into a new archive.
    ///
    /// Returns `false` without writing an archive when the log is empty.
    async fn compress(&self, name: &str, archive: &str) -> Result<bool>;

    /// Read an archive back as text
    async fn decompress(&self, archive: &str) -> Result<String>;

    /// Drop the contents of live log `name` that its last compression
    /// archived; the whole log when it was never compressed
    async fn truncate(&self, name: &str) -> Result<()>;
}
