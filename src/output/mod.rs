//! Output module for reporting on harvest progress
//!
//! This module handles:
//! - Summarizing the checkpoint and record store
//! - Printing that summary for the `--stats` command

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};
