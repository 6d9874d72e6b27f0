//! Page fetching with retries
//!
//! This module turns a logical page number into rendered content:
//! - Builds the candidate URL for the configured addressing mode
//! - Retries failed loads with a linearly growing backoff
//! - In auto mode, tries the other addressing scheme when the marker is missing
//! - Reports the exact URL that produced the content

use crate::config::FetchConfig;
use crate::crawler::session::{PageSession, Renderer};
use crate::url::{UrlMode, UrlStrategy};
use std::time::Duration;

/// Result of one load attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The content marker was present
    Success {
        /// Rendered markup
        content: String,
        /// URL the content was read from, after redirects
        final_url: String,
    },

    /// The page loaded but the content marker never appeared
    NotFound {
        /// The URL that was tried
        url: String,
    },

    /// Navigation, timeout or renderer failure
    TransientError {
        /// Error description
        cause: String,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Final result of fetching one logical page
#[derive(Debug, Clone)]
pub struct PageFetch {
    pub page: u32,

    /// Outcome of the last attempt made
    pub outcome: FetchOutcome,

    /// Attempts used, alternate-scheme loads excluded
    pub attempts: u32,
}

/// Retry budget for a single page
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub not_found_backoff: Duration,
    pub transient_backoff: Duration,
    pub mode: UrlMode,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig, mode: UrlMode) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            not_found_backoff: Duration::from_millis(config.not_found_backoff_ms),
            transient_backoff: Duration::from_millis(config.transient_backoff_ms),
            mode,
        }
    }

    /// Delay before the attempt following `attempt`
    ///
    /// Grows linearly with the attempt number.
    pub fn backoff(&self, outcome: &FetchOutcome, attempt: u32) -> Duration {
        let step = match outcome {
            FetchOutcome::TransientError { .. } => self.transient_backoff,
            _ => self.not_found_backoff,
        };
        step * attempt
    }
}

/// Fetches one page of the feed
///
/// # Retry Logic
///
/// | Outcome of an attempt | Action |
/// |-----------------------|--------|
/// | Success | Return immediately |
/// | NotFound, auto mode | Try the other scheme once, then back off |
/// | NotFound | Back off `not_found_backoff * attempt` |
/// | TransientError | Back off `transient_backoff * attempt` |
///
/// No delay follows the final attempt.
///
/// # Arguments
///
/// * `session` - The open page session
/// * `strategy` - Candidate URL builder for the feed
/// * `page` - Logical page number
/// * `policy` - Attempt budget and backoff
///
/// # Returns
///
/// A PageFetch holding the successful outcome or the last failure
pub async fn fetch_page<R: Renderer>(
    session: &mut PageSession<R>,
    strategy: &UrlStrategy,
    page: u32,
    policy: &RetryPolicy,
) -> PageFetch {
    let url = strategy.candidate(page, policy.mode.primary_scheme());
    let mut last = FetchOutcome::NotFound { url: url.clone() };

    for attempt in 1..=policy.max_attempts {
        let outcome = session.load(&url).await;
        if outcome.is_success() {
            return PageFetch {
                page,
                outcome,
                attempts: attempt,
            };
        }

        if matches!(outcome, FetchOutcome::NotFound { .. }) && policy.mode.allows_fallback() {
            if let Some(alternate) = strategy.alternate(&url, page) {
                tracing::debug!("Page {}: marker missing, trying {}", page, alternate);
                let alt_outcome = session.load(&alternate).await;
                if alt_outcome.is_success() {
                    return PageFetch {
                        page,
                        outcome: alt_outcome,
                        attempts: attempt,
                    };
                }
            }
        }

        let backoff = policy.backoff(&outcome, attempt);
        last = outcome;

        if attempt < policy.max_attempts {
            tracing::debug!(
                "Page {}: attempt {}/{} failed ({:?}), retrying in {:?}",
                page,
                attempt,
                policy.max_attempts,
                last,
                backoff
            );
            tokio::time::sleep(backoff).await;
        }
    }

    PageFetch {
        page,
        outcome: last,
        attempts: policy.max_attempts,
    }
}
