/// Harvest phase definitions for the top-level control loop
///
/// This module defines every state the harvest loop moves through for one page
/// and the transitions allowed between them.
use std::fmt;

/// Represents the current phase of the harvest loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HarvestPhase {
    // ===== Startup =====
    /// Loading the checkpoint and seeding the dedup store
    Resuming,

    // ===== Per-page States =====
    /// Loading the current page through the retry controller
    Fetching,

    /// Running the extractor over rendered content
    Extracting,

    /// Separating new records from already-seen ones
    Deduping,

    /// Appending records and persisting the checkpoint
    Committing,

    /// Delays, session recycling and long pauses between pages
    Pacing,

    // ===== Terminal States =====
    /// Feed exhausted or page limit reached
    Done,

    /// Stopped by an external signal or runtime limit
    Interrupted,

    /// Session could not be (re)opened or persistence failed
    Fatal,
}

impl HarvestPhase {
    /// Returns true if the loop has stopped in this phase
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Interrupted | Self::Fatal)
    }

    /// Returns true if this phase handles a single page
    pub fn is_per_page(&self) -> bool {
        matches!(
            self,
            Self::Fetching | Self::Extracting | Self::Deduping | Self::Committing | Self::Pacing
        )
    }

    /// Checks whether the loop may move from this phase to `next`
    ///
    /// Any live phase may be interrupted or fail fatally.
    pub fn can_transition_to(&self, next: HarvestPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Self::Interrupted | Self::Fatal) {
            return true;
        }

        match self {
            Self::Resuming => matches!(next, Self::Fetching | Self::Done),
            // a page that exhausted its retries is skipped straight to pacing
            Self::Fetching => matches!(next, Self::Extracting | Self::Pacing),
            // an empty page ends the feed
            Self::Extracting => matches!(next, Self::Deduping | Self::Done),
            Self::Deduping => matches!(next, Self::Committing),
            Self::Committing => matches!(next, Self::Pacing),
            Self::Pacing => matches!(next, Self::Fetching | Self::Done),
            Self::Done | Self::Interrupted | Self::Fatal => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resuming => "resuming",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Deduping => "deduping",
            Self::Committing => "committing",
            Self::Pacing => "pacing",
            Self::Done => "done",
            Self::Interrupted => "interrupted",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for HarvestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
