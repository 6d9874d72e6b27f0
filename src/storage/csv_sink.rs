//! CSV record store

use crate::storage::traits::{RecordSink, StorageResult};
use crate::storage::{CommentRecord, RECORD_COLUMNS};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Appends records to a CSV file
///
/// The file (with its header row) is created on the first non-empty append;
/// later appends add rows only.
#[derive(Debug, Clone)]
pub struct CsvRecordSink {
    path: PathBuf,
}

impl CsvRecordSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn needs_header(&self) -> io::Result<bool> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e),
        }
    }
}

impl RecordSink for CsvRecordSink {
    fn append(&mut self, records: &[CommentRecord]) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let write_header = self.needs_header()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if write_header {
            writer.write_record(RECORD_COLUMNS)?;
        }
        for record in records {
            writer.serialize(record)?;
        }

        writer.flush()?;
        let file = writer
            .into_inner()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        file.sync_all()?;

        tracing::debug!(
            "Appended {} records to {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }

    fn read_all(&self) -> StorageResult<Vec<CommentRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new().from_path(&self.path)?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row?);
        }
        Ok(records)
    }
}
