//! JSON checkpoint file, rewritten atomically on every commit

use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use crate::storage::Checkpoint;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Checkpoint store backed by a single JSON file
///
/// Each save writes a sibling temp file, syncs it and renames it over the old
/// checkpoint, so readers only ever see a whole checkpoint.
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saves like [`CheckpointStore::save`], running `pre_rename_hook` on the
    /// fully written temp file just before it replaces the checkpoint
    pub(crate) fn save_with_hook<F>(
        &mut self,
        last_page: u32,
        fingerprints: &HashSet<String>,
        pre_rename_hook: F,
    ) -> StorageResult<()>
    where
        F: FnOnce(&Path) -> io::Result<()>,
    {
        let mut seen_fingerprints: Vec<String> = fingerprints.iter().cloned().collect();
        seen_fingerprints.sort_unstable();

        let checkpoint = Checkpoint {
            last_page,
            seen_fingerprints,
        };
        let json = serde_json::to_string_pretty(&checkpoint)?;
        atomic_write_with_hook(&self.path, format!("{json}\n").as_bytes(), pre_rename_hook)?;

        tracing::trace!(
            "Checkpoint saved: page {} with {} fingerprints",
            last_page,
            checkpoint.seen_fingerprints.len()
        );
        Ok(())
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&self) -> StorageResult<Checkpoint> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Checkpoint::default()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Err(StorageError::Corrupt(format!(
                "checkpoint {} is empty",
                self.path.display()
            )));
        }

        Ok(serde_json::from_str(&content)?)
    }

    fn save(&mut self, last_page: u32, fingerprints: &HashSet<String>) -> StorageResult<()> {
        self.save_with_hook(last_page, fingerprints, |_| Ok(()))
    }
}

fn atomic_write_with_hook<F>(path: &Path, contents: &[u8], pre_rename_hook: F) -> io::Result<()>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.as_file_mut().sync_all()?;

    let temp_path = temp.into_temp_path();
    pre_rename_hook(temp_path.as_ref())?;
    temp_path.persist(path).map_err(|e| e.error)
}
