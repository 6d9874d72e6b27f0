//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `HarvestPhase`: the phase the harvest loop is in for the current page
//! - `SessionState`: page budget of the live rendering session
//! - `DedupStore`: fingerprints of every comment committed so far

mod dedup;
mod harvest_phase;
mod session_state;

// Re-export main types
pub use dedup::{fingerprint, DedupStore};
pub use harvest_phase::HarvestPhase;
pub use session_state::SessionState;
