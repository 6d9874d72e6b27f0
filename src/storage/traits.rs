//! Storage traits and error types
//!
//! This module defines the two durable sinks the harvest loop depends on: the
//! checkpoint store (resume cursor plus fingerprint set) and the append-only
//! record sink.

use crate::storage::{Checkpoint, CommentRecord};
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt store: {0}")]
    Corrupt(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable (page cursor, fingerprint set) pair
///
/// Implementations must replace the previous checkpoint atomically: a failed
/// save leaves the old checkpoint readable, never a partial one.
pub trait CheckpointStore: Send {
    /// Loads the checkpoint, or the zero value when none exists yet
    fn load(&self) -> StorageResult<Checkpoint>;

    /// Persists `last_page` together with the full fingerprint set
    fn save(&mut self, last_page: u32, fingerprints: &HashSet<String>) -> StorageResult<()>;
}

/// Append-only writer of comment records
///
/// The sink does no deduplication of its own; callers hand it only records
/// whose fingerprints were unseen.
pub trait RecordSink: Send {
    /// Durably appends `records`; an empty slice is a no-op
    fn append(&mut self, records: &[CommentRecord]) -> StorageResult<()>;

    /// Reads every stored record back, in write order
    fn read_all(&self) -> StorageResult<Vec<CommentRecord>>;

    /// Counts stored records
    fn count(&self) -> StorageResult<u64> {
        Ok(self.read_all()?.len() as u64)
    }
}
