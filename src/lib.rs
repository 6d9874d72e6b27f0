//! Comment-Harvest: a resumable comment feed harvester
//!
//! This crate walks a paginated comment feed page by page, extracts every comment,
//! drops the ones already seen (by content fingerprint), appends the rest to a
//! record store and checkpoints progress after every page so an interrupted run
//! picks up exactly where it stopped.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Comment-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rendering session could not be opened after {attempts} attempts: {message}")]
    SessionInit { attempts: u32, message: String },

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::StorageError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector in config: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Comment-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{HarvestOutcome, Harvester};
pub use state::{DedupStore, HarvestPhase};
pub use storage::{Checkpoint, CommentRecord};
pub use url::{AddressingScheme, UrlMode, UrlStrategy};
