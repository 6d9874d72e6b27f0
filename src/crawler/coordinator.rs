//! Harvest coordinator - the top-level page loop
//!
//! This module contains the loop that walks the feed one page at a time:
//! - Resuming from the checkpoint and seeding the dedup store
//! - Fetching each page through the retry policy
//! - Extracting, deduplicating and committing records
//! - Pacing, session recycling and long pauses
//! - Stopping on an empty page, the page limit, an interrupt or a fatal error
//!
//! Commit order for a page is fixed: records reach the sink first, then the
//! dedup store learns their fingerprints, then the checkpoint is saved.

use crate::config::Config;
use crate::crawler::fetcher::{fetch_page, FetchOutcome, PageFetch, RetryPolicy};
use crate::crawler::http_renderer::HttpLauncher;
use crate::crawler::parser::{CommentExtractor, SelectorExtractor};
use crate::crawler::scheduler::Pacer;
use crate::crawler::session::{PageSession, RendererLauncher, SessionFactory};
use crate::state::{DedupStore, HarvestPhase};
use crate::storage::{
    open_checkpoint_store, open_record_sink, CheckpointStore, CommentRecord, RecordSink,
};
use crate::url::UrlStrategy;
use crate::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a harvest run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestOutcome {
    /// A page with no comments marked the end of the feed
    Completed { last_page: u32 },

    /// The configured page limit was reached
    PageLimitReached { last_page: u32 },

    /// Stopped by a signal or the runtime limit
    Interrupted { last_page: u32 },
}

impl HarvestOutcome {
    /// Last page recorded in the checkpoint
    pub fn last_page(&self) -> u32 {
        match self {
            Self::Completed { last_page }
            | Self::PageLimitReached { last_page }
            | Self::Interrupted { last_page } => *last_page,
        }
    }
}

/// Running totals for one harvest run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub pages_committed: u32,
    pub pages_skipped: u32,
    pub records_written: u64,
    pub duplicates_dropped: u64,
    pub sessions_opened: u32,
}

/// Main harvest coordinator
pub struct Harvester<L: RendererLauncher> {
    config: Config,
    strategy: UrlStrategy,
    sessions: SessionFactory<L>,
    session: Option<PageSession<L::Renderer>>,
    extractor: Box<dyn CommentExtractor>,
    checkpoints: Box<dyn CheckpointStore>,
    sink: Box<dyn RecordSink>,
    dedup: DedupStore,
    retry: RetryPolicy,
    pacer: Pacer,
    phase: HarvestPhase,
    last_committed: u32,
    counters: RunCounters,
    cancel: CancellationToken,
}

impl Harvester<HttpLauncher> {
    /// Creates a harvester with the HTTP renderer and the configured stores
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Harvester)` - Ready to run
    /// * `Err(HarvestError)` - A selector did not compile
    pub fn from_config(config: Config) -> Result<Self> {
        let extractor = SelectorExtractor::new(&config.feed.content_marker, &config.extractor)?;
        let checkpoints = open_checkpoint_store(&config.output);
        let sink = open_record_sink(&config.output);
        Ok(Self::new(
            config,
            HttpLauncher,
            Box::new(extractor),
            Box::new(checkpoints),
            sink,
        ))
    }
}

impl<L: RendererLauncher> Harvester<L> {
    /// Creates a harvester from explicit parts
    pub fn new(
        config: Config,
        launcher: L,
        extractor: Box<dyn CommentExtractor>,
        checkpoints: Box<dyn CheckpointStore>,
        sink: Box<dyn RecordSink>,
    ) -> Self {
        Self {
            strategy: UrlStrategy::new(config.feed.base_url.clone()),
            sessions: SessionFactory::from_config(launcher, &config),
            retry: RetryPolicy::from_config(&config.fetch, config.feed.url_mode),
            pacer: Pacer::new(config.pacing.clone()),
            config,
            session: None,
            extractor,
            checkpoints,
            sink,
            dedup: DedupStore::new(),
            phase: HarvestPhase::Resuming,
            last_committed: 0,
            counters: RunCounters::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to stop the run from outside
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that interrupts this harvester when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn phase(&self) -> HarvestPhase {
        self.phase
    }

    /// Last page durably recorded in the checkpoint
    pub fn last_committed_page(&self) -> u32 {
        self.last_committed
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    /// Runs the harvest until the feed ends, the page limit is hit or the run
    /// is interrupted
    ///
    /// The renderer session is always closed before this returns.
    ///
    /// # Returns
    ///
    /// * `Ok(HarvestOutcome)` - The run stopped normally
    /// * `Err(HarvestError)` - A session could not be opened or a store failed
    pub async fn run(&mut self) -> Result<HarvestOutcome> {
        let result = self.harvest().await;

        if let Some(session) = self.session.take() {
            session.close().await;
        }

        match result {
            Ok(outcome) => {
                tracing::info!(
                    "Harvest finished ({:?}): {} pages committed, {} skipped, {} records written, {} duplicates dropped",
                    outcome,
                    self.counters.pages_committed,
                    self.counters.pages_skipped,
                    self.counters.records_written,
                    self.counters.duplicates_dropped
                );
                Ok(outcome)
            }
            Err(e) => {
                self.enter(HarvestPhase::Fatal);
                tracing::error!(
                    "Harvest stopped: {}. Last committed page: {}",
                    e,
                    self.last_committed
                );
                Err(e)
            }
        }
    }

    async fn harvest(&mut self) -> Result<HarvestOutcome> {
        self.phase = HarvestPhase::Resuming;
        let checkpoint = self.checkpoints.load()?;
        self.dedup = DedupStore::from_checkpoint(&checkpoint);
        self.last_committed = checkpoint.last_page;

        let max_pages = self.config.feed.max_pages;
        let mut page = checkpoint.resume_page();
        tracing::info!(
            "Resuming at page {} of at most {} ({} fingerprints known, url mode {})",
            page,
            max_pages,
            self.dedup.len(),
            self.config.feed.url_mode
        );

        if page > max_pages {
            self.enter(HarvestPhase::Done);
            return Ok(HarvestOutcome::PageLimitReached {
                last_page: self.last_committed,
            });
        }

        loop {
            if self.cancel.is_cancelled() {
                return Ok(self.interrupt());
            }

            self.enter(HarvestPhase::Fetching);
            let Some(fetch) = self.fetch(page).await? else {
                return Ok(self.interrupt());
            };

            let committed = match fetch.outcome {
                FetchOutcome::Success { content, final_url } => {
                    self.enter(HarvestPhase::Extracting);
                    let records = self.extractor.extract(&content, page, &final_url);
                    if records.is_empty() {
                        tracing::info!("Page {} has no comments; end of feed", page);
                        self.commit_checkpoint(page - 1)?;
                        self.enter(HarvestPhase::Done);
                        return Ok(HarvestOutcome::Completed {
                            last_page: self.last_committed,
                        });
                    }
                    self.commit_page(page, records)?;
                    true
                }
                failure => {
                    tracing::warn!(
                        "Page {} skipped after {} attempts: {:?}",
                        page,
                        fetch.attempts,
                        failure
                    );
                    self.counters.pages_skipped += 1;
                    self.commit_checkpoint(page - 1)?;
                    false
                }
            };

            self.enter(HarvestPhase::Pacing);
            if !self.pace(page, committed).await {
                return Ok(self.interrupt());
            }

            if page >= max_pages {
                tracing::info!("Reached page limit {}", max_pages);
                self.enter(HarvestPhase::Done);
                return Ok(HarvestOutcome::PageLimitReached {
                    last_page: self.last_committed,
                });
            }
            page += 1;
        }
    }

    /// Fetches `page`, opening a session first if none is live
    ///
    /// Returns `None` if the run was cancelled while fetching.
    async fn fetch(&mut self, page: u32) -> Result<Option<PageFetch>> {
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                let session = self.sessions.open().await?;
                self.counters.sessions_opened += 1;
                session
            }
        };
        let session = self.session.insert(session);

        let fetch = tokio::select! {
            fetch = fetch_page(session, &self.strategy, page, &self.retry) => fetch,
            _ = self.cancel.cancelled() => return Ok(None),
        };
        session.record_page();
        Ok(Some(fetch))
    }

    /// Dedups, appends and checkpoints one page of records
    fn commit_page(&mut self, page: u32, records: Vec<CommentRecord>) -> Result<()> {
        self.enter(HarvestPhase::Deduping);
        let found = records.len();
        let (fresh, duplicates) = self.dedup.partition_new(records);

        self.enter(HarvestPhase::Committing);
        self.sink.append(&fresh)?;
        self.dedup.extend(&fresh);
        self.commit_checkpoint(page)?;

        self.counters.pages_committed += 1;
        self.counters.records_written += fresh.len() as u64;
        self.counters.duplicates_dropped += duplicates as u64;

        tracing::info!(
            "Page {}: found {} | new {} | total unique {}",
            page,
            found,
            fresh.len(),
            self.dedup.len()
        );
        Ok(())
    }

    /// Saves the checkpoint at `page`; the cursor never moves backwards
    fn commit_checkpoint(&mut self, page: u32) -> Result<()> {
        let page = page.max(self.last_committed);
        self.checkpoints.save(page, &self.dedup.all())?;
        self.last_committed = page;
        Ok(())
    }

    /// Rests after `page`; returns false if cancelled while resting
    async fn pace(&mut self, page: u32, committed: bool) -> bool {
        let mut delay = if committed {
            self.pacer.page_delay()
        } else {
            self.pacer.failure_delay()
        };

        if self.session.as_ref().is_some_and(|s| s.is_exhausted()) {
            if let Some(session) = self.session.take() {
                tracing::info!("Recycling rendering session after page {}", page);
                session.close().await;
            }
            delay += self.pacer.recycle_delay();
        }

        if committed && self.pacer.long_pause_due(page) {
            let pause = self.pacer.long_pause();
            tracing::info!("Long pause for {:?} after page {}", pause, page);
            if !self.rest(pause).await {
                return false;
            }
        }

        self.rest(delay).await
    }

    /// Sleeps for `duration` unless cancelled first
    async fn rest(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    /// Stops the run, saving the last committed checkpoint once more
    fn interrupt(&mut self) -> HarvestOutcome {
        self.enter(HarvestPhase::Interrupted);
        tracing::warn!("Interrupted; last committed page is {}", self.last_committed);
        if let Err(e) = self.checkpoints.save(self.last_committed, &self.dedup.all()) {
            tracing::warn!("Final checkpoint save failed: {}", e);
        }
        HarvestOutcome::Interrupted {
            last_page: self.last_committed,
        }
    }

    fn enter(&mut self, next: HarvestPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid phase transition {} -> {}",
            self.phase,
            next
        );
        tracing::trace!("Phase {} -> {}", self.phase, next);
        self.phase = next;
    }
}

/// Runs a complete harvest with the HTTP renderer
///
/// Cancelling `cancel` interrupts the run at the next safe point.
pub async fn run_harvest(
    config: Config,
    cancel: CancellationToken,
) -> Result<HarvestOutcome> {
    let mut harvester = Harvester::from_config(config)?.with_cancellation(cancel);
    harvester.run().await
}
