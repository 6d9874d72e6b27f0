//! Database schema definitions for the SQLite record store

/// SQL schema for the record store
///
/// `fingerprint` is indexed but not unique: the harvest loop owns dedup.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page INTEGER NOT NULL,
    index_in_page INTEGER NOT NULL,
    datetime TEXT NOT NULL,
    username TEXT NOT NULL,
    "like" INTEGER,
    dislike INTEGER,
    comment_id TEXT NOT NULL,
    comment TEXT NOT NULL,
    fingerprint TEXT NOT NULL,
    source_url TEXT NOT NULL,
    harvested_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_page ON comments(page);
CREATE INDEX IF NOT EXISTS idx_comments_fingerprint ON comments(fingerprint);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
