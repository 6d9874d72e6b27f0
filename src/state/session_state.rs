use std::time::{Duration, Instant};

/// Tracks how much of its budget a rendering session has used
///
/// The session itself never closes on its own; the harvest loop reads
/// `is_exhausted` and recycles it.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Pages handled since the session was opened
    pub pages_served: u32,

    /// Pages a session may handle before it is recycled (0 means unlimited)
    pub page_budget: u32,

    /// When the session was opened
    pub opened_at: Instant,

    /// Which launch profile produced the session
    pub profile: String,
}

impl SessionState {
    pub fn new(page_budget: u32, profile: impl Into<String>) -> Self {
        Self {
            pages_served: 0,
            page_budget,
            opened_at: Instant::now(),
            profile: profile.into(),
        }
    }

    /// Records that the session handled one logical page
    pub fn record_page(&mut self) {
        self.pages_served += 1;
    }

    /// Returns true once the session has served its whole budget
    pub fn is_exhausted(&self) -> bool {
        self.page_budget > 0 && self.pages_served >= self.page_budget
    }

    /// Pages left before a recycle is due, `None` when unlimited
    pub fn pages_remaining(&self) -> Option<u32> {
        (self.page_budget > 0).then(|| self.page_budget.saturating_sub(self.pages_served))
    }

    pub fn uptime(&self) -> Duration {
        self.opened_at.elapsed()
    }
}
