//! Content-fingerprint deduplication

use crate::storage::{Checkpoint, CommentRecord};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Computes the content fingerprint of a comment body
///
/// Hex SHA-256 of the trimmed text. Two comments with the same trimmed text
/// always share a fingerprint and are treated as one.
pub fn fingerprint(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// In-memory set of every fingerprint committed so far
///
/// Grows with the crawl history; the set is seeded from the checkpoint and only
/// extended with fingerprints whose records reached the sink.
#[derive(Debug, Clone, Default)]
pub struct DedupStore {
    seen: HashSet<String>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store from a persisted checkpoint
    pub fn from_checkpoint(checkpoint: &Checkpoint) -> Self {
        Self {
            seen: checkpoint.seen_fingerprints.iter().cloned().collect(),
        }
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Adds a fingerprint, returning true if it was new
    pub fn add(&mut self, fingerprint: impl Into<String>) -> bool {
        self.seen.insert(fingerprint.into())
    }

    /// Snapshot of every fingerprint in the store
    pub fn all(&self) -> HashSet<String> {
        self.seen.clone()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Splits extracted records into unseen ones and a count of duplicates
    ///
    /// Duplicates within `records` itself are dropped too (first one wins).
    /// The store is not modified; callers add fingerprints once the records
    /// are safely written.
    pub fn partition_new(&self, records: Vec<CommentRecord>) -> (Vec<CommentRecord>, usize) {
        let mut page_seen = HashSet::new();
        let total = records.len();

        let fresh: Vec<CommentRecord> = records
            .into_iter()
            .filter(|record| {
                !self.contains(&record.fingerprint) && page_seen.insert(record.fingerprint.clone())
            })
            .collect();

        let duplicates = total - fresh.len();
        (fresh, duplicates)
    }

    /// Adds the fingerprints of records that were committed
    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a CommentRecord>) {
        for record in records {
            self.seen.insert(record.fingerprint.clone());
        }
    }
}
