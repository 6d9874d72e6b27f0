//! SQLite record store

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordSink, StorageResult};
use crate::storage::CommentRecord;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};

/// Appends records to a SQLite database
///
/// The database file and schema are created on the first non-empty append.
/// Each append is one transaction.
pub struct SqliteRecordSink {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqliteRecordSink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            conn: None,
        }
    }

    fn open(path: &Path) -> rusqlite::Result<Connection> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
        ",
        )?;
        initialize_schema(&conn)?;
        Ok(conn)
    }

    fn connection(&mut self) -> StorageResult<&mut Connection> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                Self::open(&self.path)?
            }
        };
        Ok(self.conn.insert(conn))
    }
}

impl RecordSink for SqliteRecordSink {
    fn append(&mut self, records: &[CommentRecord]) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let harvested_at = Utc::now().to_rfc3339();
        let conn = self.connection()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO comments (page, index_in_page, datetime, username, \"like\", dislike,
                 comment_id, comment, fingerprint, source_url, harvested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.page,
                    record.index_in_page,
                    record.timestamp,
                    record.author,
                    record.likes,
                    record.dislikes,
                    record.comment_id,
                    record.body,
                    record.fingerprint,
                    record.source_url,
                    harvested_at,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!(
            "Inserted {} records into {}",
            records.len(),
            self.path.display()
        );
        Ok(())
    }

    fn read_all(&self) -> StorageResult<Vec<CommentRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let conn = Self::open(&self.path)?;
        let mut stmt = conn.prepare(
            "SELECT page, index_in_page, datetime, username, \"like\", dislike, comment_id,
             comment, fingerprint, source_url FROM comments ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(CommentRecord {
                page: row.get(0)?,
                index_in_page: row.get(1)?,
                timestamp: row.get(2)?,
                author: row.get(3)?,
                likes: row.get(4)?,
                dislikes: row.get(5)?,
                comment_id: row.get(6)?,
                body: row.get(7)?,
                fingerprint: row.get(8)?,
                source_url: row.get(9)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn count(&self) -> StorageResult<u64> {
        if !self.path.exists() {
            return Ok(0);
        }
        let conn = Self::open(&self.path)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
