//! Statistics from the checkpoint and the record store
//!
//! This module provides the summary shown by `--stats`: where the next run
//! would resume and what the record store holds.

use crate::storage::{CheckpointStore, RecordSink, StorageResult};
use std::collections::{BTreeMap, HashSet};

/// Harvest statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestStatistics {
    /// Last page recorded in the checkpoint
    pub last_page: u32,

    /// Fingerprints held by the checkpoint
    pub known_fingerprints: usize,

    /// Rows in the record store
    pub stored_records: u64,

    /// Stored records per page
    pub records_per_page: BTreeMap<u32, u64>,

    /// Stored fingerprints missing from the checkpoint
    pub unknown_fingerprints: usize,

    /// Stored records without an external comment id
    pub records_without_id: u64,
}

impl HarvestStatistics {
    pub fn distinct_pages(&self) -> usize {
        self.records_per_page.len()
    }

    /// Page the next run starts at
    pub fn resume_page(&self) -> u32 {
        self.last_page.saturating_add(1)
    }
}

/// Loads statistics from the checkpoint and the record store
///
/// # Arguments
///
/// * `checkpoints` - The checkpoint store to read
/// * `sink` - The record store to scan
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - A store could not be read
pub fn load_statistics(
    checkpoints: &dyn CheckpointStore,
    sink: &dyn RecordSink,
) -> StorageResult<HarvestStatistics> {
    let checkpoint = checkpoints.load()?;
    let known: HashSet<&str> = checkpoint
        .seen_fingerprints
        .iter()
        .map(String::as_str)
        .collect();

    let records = sink.read_all()?;
    let mut stats = HarvestStatistics {
        last_page: checkpoint.last_page,
        known_fingerprints: known.len(),
        stored_records: records.len() as u64,
        ..HarvestStatistics::default()
    };

    let mut unknown = HashSet::new();
    for record in &records {
        *stats.records_per_page.entry(record.page).or_insert(0) += 1;
        if record.comment_id.is_empty() {
            stats.records_without_id += 1;
        }
        if !known.contains(record.fingerprint.as_str()) {
            unknown.insert(record.fingerprint.as_str());
        }
    }
    stats.unknown_fingerprints = unknown.len();

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Checkpoint:");
    println!("  Last committed page: {}", stats.last_page);
    println!("  Next run starts at page: {}", stats.resume_page());
    println!("  Known fingerprints: {}", stats.known_fingerprints);
    println!();

    println!("Record Store:");
    println!("  Stored records: {}", stats.stored_records);
    println!("  Distinct pages: {}", stats.distinct_pages());
    if let (Some((first, _)), Some((last, _))) = (
        stats.records_per_page.first_key_value(),
        stats.records_per_page.last_key_value(),
    ) {
        println!("  Page range: {} - {}", first, last);
        let average = stats.stored_records as f64 / stats.distinct_pages() as f64;
        println!("  Average records per page: {:.1}", average);
    }
    println!("  Records without comment id: {}", stats.records_without_id);
    println!();

    if stats.unknown_fingerprints > 0 {
        println!(
            "Warning: {} stored fingerprints are not in the checkpoint",
            stats.unknown_fingerprints
        );
    }
}
