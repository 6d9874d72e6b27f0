//! Scripted feed and renderer used by the harvest loop tests

use async_trait::async_trait;
use comment_harvest::config::Config;
use comment_harvest::crawler::{
    Harvester, LaunchProfile, RenderError, Renderer, RendererLauncher, SelectorExtractor,
};
use comment_harvest::storage::{
    Checkpoint, CheckpointStore, CommentRecord, CsvRecordSink, JsonCheckpointStore, RecordSink,
    StorageError, StorageResult,
};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const BASE: &str = "https://feed.test/equities/tesla-commentary";

/// What the fake site serves for one URL
#[derive(Clone)]
pub enum Response {
    Html(String),
    /// Navigation always fails
    Broken,
}

#[derive(Default)]
struct FeedState {
    pages: HashMap<String, Response>,
    visited: Vec<String>,
    launches: Vec<String>,
    closes: usize,
    cancel_on: Option<(String, CancellationToken)>,
}

/// A scripted site shared by every renderer launched against it
#[derive(Clone, Default)]
pub struct FakeFeed {
    state: Arc<Mutex<FeedState>>,
}

impl FakeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: impl Into<String>, response: Response) -> &Self {
        self.state.lock().unwrap().pages.insert(url.into(), response);
        self
    }

    /// Serves `bodies` as the comments of path-style page `page`
    pub fn comments(&self, page: u32, bodies: &[&str]) -> &Self {
        self.serve(path_url(page), Response::Html(comment_page(bodies)))
    }

    /// Serves an empty comment container at path-style page `page`
    pub fn end_at(&self, page: u32) -> &Self {
        self.serve(path_url(page), Response::Html(comment_page(&[])))
    }

    /// Cancels `token` as soon as `url` is requested
    pub fn cancel_on(&self, url: impl Into<String>, token: CancellationToken) {
        self.state.lock().unwrap().cancel_on = Some((url.into(), token));
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    pub fn launches(&self) -> Vec<String> {
        self.state.lock().unwrap().launches.clone()
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }

    fn navigate(&self, url: &str) -> Option<Response> {
        let mut state = self.state.lock().unwrap();
        state.visited.push(url.to_string());
        if let Some((target, token)) = &state.cancel_on {
            if target == url {
                token.cancel();
            }
        }
        state.pages.get(url).cloned()
    }
}

pub fn path_url(page: u32) -> String {
    if page <= 1 {
        BASE.to_string()
    } else {
        format!("{}/{}", BASE, page)
    }
}

pub fn query_url(page: u32) -> String {
    if page <= 1 {
        BASE.to_string()
    } else {
        format!("{}?page={}", BASE, page)
    }
}

/// A feed page holding one comment card per body
pub fn comment_page(bodies: &[&str]) -> String {
    let cards: Vec<String> = bodies
        .iter()
        .enumerate()
        .map(|(i, body)| {
            format!(
                r#"<article data-comment-id="{id}">
                     <a href="/members/{id}/profile">user{id}</a>
                     <span data-test="comment-date">Oct {day}, 2026</span>
                     <div class="break-words leading-5">{body}</div>
                     <button aria-label="Like {i}">{i}</button>
                   </article>"#,
                id = 1000 + i,
                day = 1 + i % 28,
            )
        })
        .collect();

    format!(
        r#"<html><body><main><div id="comments_new">{}</div></main></body></html>"#,
        cards.join("\n")
    )
}

/// Launcher that can be told to fail for some profiles
#[derive(Clone)]
pub struct FakeLauncher {
    feed: FakeFeed,
    failing_profiles: Vec<String>,
}

impl FakeLauncher {
    pub fn new(feed: &FakeFeed) -> Self {
        Self {
            feed: feed.clone(),
            failing_profiles: Vec::new(),
        }
    }

    pub fn failing(mut self, profile: &str) -> Self {
        self.failing_profiles.push(profile.to_string());
        self
    }
}

#[async_trait]
impl RendererLauncher for FakeLauncher {
    type Renderer = FakeRenderer;

    async fn launch(&self, profile: &LaunchProfile) -> Result<FakeRenderer, RenderError> {
        self.feed
            .state
            .lock()
            .unwrap()
            .launches
            .push(profile.label.clone());

        if self.failing_profiles.contains(&profile.label) {
            return Err(RenderError::Launch {
                profile: profile.label.clone(),
                message: "profile directory is locked".to_string(),
            });
        }
        Ok(FakeRenderer {
            feed: self.feed.clone(),
            current: None,
        })
    }
}

pub struct FakeRenderer {
    feed: FakeFeed,
    current: Option<(String, String)>,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.current = None;
        match self.feed.navigate(url) {
            Some(Response::Html(html)) => {
                self.current = Some((url.to_string(), html));
                Ok(())
            }
            Some(Response::Broken) => Err(RenderError::Timeout {
                url: url.to_string(),
            }),
            None => {
                // unknown URLs render a page without comments container
                self.current = Some((url.to_string(), "<html><body>404</body></html>".to_string()));
                Ok(())
            }
        }
    }

    async fn dismiss_interstitials(&mut self) -> bool {
        false
    }

    async fn wait_for_marker(&mut self, _: &str, _: Duration) -> Result<bool, RenderError> {
        Ok(self
            .current
            .as_ref()
            .is_some_and(|(_, html)| html.contains(r#"id="comments_new""#)))
    }

    async fn scroll_by(&mut self, _: u32) -> Result<(), RenderError> {
        Ok(())
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        self.current
            .as_ref()
            .map(|(_, html)| html.clone())
            .ok_or(RenderError::Closed)
    }

    fn current_url(&self) -> Option<String> {
        self.current.as_ref().map(|(url, _)| url.clone())
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.feed.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Test configuration with every delay set to zero
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::for_base_url(BASE);
    config.session.scroll_pause_min_ms = 0;
    config.session.scroll_pause_max_ms = 0;
    config.session.open_retries = 2;
    config.session.open_retry_min_ms = 0;
    config.session.open_retry_max_ms = 0;
    config.session.profile_dir = dir.join("profiles/primary");
    config.session.fallback_profile_dir = Some(dir.join("profiles/fallback"));
    config.fetch.not_found_backoff_ms = 0;
    config.fetch.transient_backoff_ms = 0;
    config.pacing.min_delay_ms = 0;
    config.pacing.max_delay_ms = 0;
    config.pacing.failure_extra_delay_ms = 0;
    config.pacing.recycle_extra_delay_ms = 0;
    config.pacing.long_pause_every_pages = 0;
    config.output.records_path = path_string(dir.join("comments.csv"));
    config.output.checkpoint_path = path_string(dir.join("progress.json"));
    config
}

fn path_string(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

pub fn harvester(config: Config, launcher: FakeLauncher) -> Harvester<FakeLauncher> {
    let checkpoints = JsonCheckpointStore::new(Path::new(&config.output.checkpoint_path));
    let sink = CsvRecordSink::new(Path::new(&config.output.records_path));
    harvester_with_stores(config, launcher, Box::new(checkpoints), Box::new(sink))
}

pub fn harvester_with_stores(
    config: Config,
    launcher: FakeLauncher,
    checkpoints: Box<dyn CheckpointStore>,
    sink: Box<dyn RecordSink>,
) -> Harvester<FakeLauncher> {
    let extractor =
        SelectorExtractor::new(&config.feed.content_marker, &config.extractor).unwrap();
    Harvester::new(config, launcher, Box::new(extractor), checkpoints, sink)
}

fn disk_full() -> StorageError {
    StorageError::Io(io::Error::new(io::ErrorKind::Other, "no space left on device"))
}

/// Record sink whose appends always fail
pub struct BrokenSink;

impl RecordSink for BrokenSink {
    fn append(&mut self, _: &[CommentRecord]) -> StorageResult<()> {
        Err(disk_full())
    }

    fn read_all(&self) -> StorageResult<Vec<CommentRecord>> {
        Ok(Vec::new())
    }
}

/// Checkpoint file that stops accepting saves after a number of successes
pub struct FlakyCheckpoints {
    inner: JsonCheckpointStore,
    saves_left: usize,
}

impl FlakyCheckpoints {
    pub fn new(config: &Config, saves_left: usize) -> Self {
        Self {
            inner: JsonCheckpointStore::new(Path::new(&config.output.checkpoint_path)),
            saves_left,
        }
    }
}

impl CheckpointStore for FlakyCheckpoints {
    fn load(&self) -> StorageResult<Checkpoint> {
        self.inner.load()
    }

    fn save(&mut self, last_page: u32, fingerprints: &HashSet<String>) -> StorageResult<()> {
        if self.saves_left == 0 {
            return Err(disk_full());
        }
        self.saves_left -= 1;
        self.inner.save(last_page, fingerprints)
    }
}

pub fn stored_records(config: &Config) -> Vec<CommentRecord> {
    CsvRecordSink::new(Path::new(&config.output.records_path))
        .read_all()
        .unwrap()
}

pub fn fingerprints(records: &[CommentRecord]) -> HashSet<String> {
    records.iter().map(|r| r.fingerprint.clone()).collect()
}
