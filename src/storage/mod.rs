//! Storage module for persisting harvest data
//!
//! This module handles everything that must survive a crash:
//! - The checkpoint file (last committed page plus every fingerprint seen)
//! - The append-only record store, as CSV or SQLite

mod checkpoint;
mod csv_sink;
mod schema;
mod sqlite_sink;
mod traits;

pub use checkpoint::JsonCheckpointStore;
pub use csv_sink::CsvRecordSink;
pub use sqlite_sink::SqliteRecordSink;
pub use traits::{CheckpointStore, RecordSink, StorageError, StorageResult};

use crate::config::{OutputConfig, OutputFormat};
use crate::state::fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Column order of the record store
pub const RECORD_COLUMNS: [&str; 10] = [
    "page",
    "index_in_page",
    "datetime",
    "username",
    "like",
    "dislike",
    "comment_id",
    "comment",
    "fingerprint",
    "source_url",
];

/// One harvested comment
///
/// Built once by the extractor from a rendered page and never modified after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub page: u32,

    /// 1-based position of the comment on its page
    pub index_in_page: u32,

    /// Site-native display timestamp, kept verbatim
    #[serde(rename = "datetime")]
    pub timestamp: String,

    #[serde(rename = "username")]
    pub author: String,

    #[serde(rename = "like")]
    pub likes: Option<u32>,

    #[serde(rename = "dislike")]
    pub dislikes: Option<u32>,

    /// External comment identifier, empty when it could not be recovered
    pub comment_id: String,

    /// Whitespace-normalized body text
    #[serde(rename = "comment")]
    pub body: String,

    pub fingerprint: String,

    /// The exact URL that produced this comment
    pub source_url: String,
}

impl CommentRecord {
    /// Creates a record with a normalized body and its fingerprint
    ///
    /// Author, timestamp, counts and id start empty.
    pub fn new(page: u32, index_in_page: u32, body: &str, source_url: &str) -> Self {
        let body = normalize_whitespace(body);
        Self {
            page,
            index_in_page,
            timestamp: String::new(),
            author: String::new(),
            likes: None,
            dislikes: None,
            comment_id: String::new(),
            fingerprint: fingerprint(&body),
            body,
            source_url: source_url.to_string(),
        }
    }
}

/// Collapses every whitespace run to one space and trims the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resume metadata: last committed page and every fingerprint seen so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_page: u32,
    pub seen_fingerprints: Vec<String>,
}

impl Checkpoint {
    /// Page the next run should start from
    pub fn resume_page(&self) -> u32 {
        self.last_page.saturating_add(1)
    }
}

/// Opens the record sink selected by the output configuration
pub fn open_record_sink(config: &OutputConfig) -> Box<dyn RecordSink> {
    let path = Path::new(&config.records_path);
    match config.format {
        OutputFormat::Csv => Box::new(CsvRecordSink::new(path)),
        OutputFormat::Sqlite => Box::new(SqliteRecordSink::new(path)),
    }
}

/// Rewinds the checkpoint to page 0 without forgetting stored comments
///
/// The fingerprint set is rebuilt from the record store, so a harvest started
/// from page 1 again never appends a comment the store already holds.
/// Returns the number of fingerprints carried over.
pub fn rewind_checkpoint(
    checkpoints: &mut dyn CheckpointStore,
    sink: &dyn RecordSink,
) -> StorageResult<usize> {
    let known: HashSet<String> = sink
        .read_all()?
        .into_iter()
        .map(|record| record.fingerprint)
        .collect();
    checkpoints.save(0, &known)?;
    Ok(known.len())
}

/// Opens the checkpoint store at the configured path
pub fn open_checkpoint_store(config: &OutputConfig) -> JsonCheckpointStore {
    JsonCheckpointStore::new(Path::new(&config.checkpoint_path))
}
