//! Page session: one live renderer plus the load procedure
//!
//! The renderer is an opaque capability behind [`Renderer`]; a session wraps
//! one renderer instance and knows how to turn "load this URL" into a
//! [`FetchOutcome`]:
//! - navigate
//! - dismiss interstitials (best effort)
//! - wait for the content marker
//! - if it is missing, scroll a few times to trigger lazy loading and look again

use crate::config::Config;
use crate::crawler::fetcher::FetchOutcome;
use crate::crawler::scheduler::random_between;
use crate::state::SessionState;
use crate::HarvestError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a renderer
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to launch renderer with {profile} profile: {message}")]
    Launch { profile: String, message: String },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out loading {url}")]
    Timeout { url: String },

    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Renderer has no page loaded")]
    Closed,

    #[error("Profile IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A live rendering backend
///
/// Produces rendered markup for URLs. Implementations may drive a real browser
/// or fetch documents over plain HTTP.
#[async_trait]
pub trait Renderer: Send {
    /// Loads `url`, replacing the current page
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    /// Tries to close consent banners and signup overlays
    ///
    /// Returns true if something was dismissed. Never fails.
    async fn dismiss_interstitials(&mut self) -> bool;

    /// Waits up to `timeout` for an element matching `selector`
    async fn wait_for_marker(&mut self, selector: &str, timeout: Duration)
        -> Result<bool, RenderError>;

    /// Scrolls the viewport down by `pixels`
    async fn scroll_by(&mut self, pixels: u32) -> Result<(), RenderError>;

    /// Current rendered markup
    async fn content(&mut self) -> Result<String, RenderError>;

    /// URL of the current page after redirects
    fn current_url(&self) -> Option<String>;

    /// Shuts the renderer down and releases its profile
    async fn close(&mut self) -> Result<(), RenderError>;
}

/// Starts renderers from a launch profile
#[async_trait]
pub trait RendererLauncher: Send + Sync {
    type Renderer: Renderer;

    async fn launch(&self, profile: &LaunchProfile) -> Result<Self::Renderer, RenderError>;
}

/// Everything a renderer needs at startup
#[derive(Debug, Clone)]
pub struct LaunchProfile {
    /// "primary" or "fallback"
    pub label: String,

    /// Directory owned by the renderer while it runs
    pub profile_dir: PathBuf,

    pub page_load_timeout: Duration,

    pub user_agent: String,

    /// URL patterns the renderer should not load
    pub blocked_patterns: Vec<String>,
}

impl LaunchProfile {
    /// Builds the primary profile and, if configured, the fallback one
    pub fn from_config(config: &Config) -> (Self, Option<Self>) {
        let session = &config.session;
        let primary = Self {
            label: "primary".to_string(),
            profile_dir: session.profile_dir.clone(),
            page_load_timeout: session.page_load_timeout(),
            user_agent: config.user_agent.header_value(),
            blocked_patterns: session.blocked_resource_patterns(),
        };

        let fallback = session.fallback_profile_dir.as_ref().map(|dir| Self {
            label: "fallback".to_string(),
            profile_dir: dir.clone(),
            ..primary.clone()
        });

        (primary, fallback)
    }
}

/// Load-procedure tuning
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Selector that proves comments rendered
    pub content_marker: String,
    pub wait_timeout: Duration,
    pub recheck_timeout: Duration,
    pub scroll_rounds: u32,
    pub scroll_step_px: u32,
    pub scroll_pause_min: Duration,
    pub scroll_pause_max: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        let session = &config.session;
        Self {
            content_marker: config.feed.content_marker.clone(),
            wait_timeout: session.wait_timeout(),
            recheck_timeout: session.recheck_timeout(),
            scroll_rounds: session.scroll_rounds,
            scroll_step_px: session.scroll_step_px,
            scroll_pause_min: Duration::from_millis(session.scroll_pause_min_ms),
            scroll_pause_max: Duration::from_millis(session.scroll_pause_max_ms),
        }
    }
}

/// One open renderer owned by the harvest loop
pub struct PageSession<R: Renderer> {
    renderer: R,
    settings: SessionSettings,
    state: SessionState,
}

impl<R: Renderer> PageSession<R> {
    pub fn new(renderer: R, settings: SessionSettings, state: SessionState) -> Self {
        Self {
            renderer,
            settings,
            state,
        }
    }

    /// Loads `url` and reports whether the comment content showed up
    ///
    /// Returns `Success` only when the content marker was confirmed present.
    pub async fn load(&mut self, url: &str) -> FetchOutcome {
        if let Err(e) = self.renderer.navigate(url).await {
            return FetchOutcome::TransientError {
                cause: e.to_string(),
            };
        }
        self.renderer.dismiss_interstitials().await;

        let marker = self.settings.content_marker.clone();
        let mut found = match self
            .renderer
            .wait_for_marker(&marker, self.settings.wait_timeout)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                return FetchOutcome::TransientError {
                    cause: e.to_string(),
                }
            }
        };

        if !found {
            tracing::debug!("Content marker missing on {}, scrolling to trigger it", url);
            self.nudge(self.settings.scroll_rounds.max(1)).await;
            found = match self
                .renderer
                .wait_for_marker(&marker, self.settings.recheck_timeout)
                .await
            {
                Ok(found) => found,
                Err(e) => {
                    return FetchOutcome::TransientError {
                        cause: e.to_string(),
                    }
                }
            };
        }

        if !found {
            return FetchOutcome::NotFound {
                url: url.to_string(),
            };
        }

        // comments below the fold load lazily
        self.nudge(1).await;

        match self.renderer.content().await {
            Ok(content) => FetchOutcome::Success {
                content,
                final_url: self
                    .renderer
                    .current_url()
                    .unwrap_or_else(|| url.to_string()),
            },
            Err(e) => FetchOutcome::TransientError {
                cause: e.to_string(),
            },
        }
    }

    /// Scrolls `rounds` times, pausing and dismissing overlays after each
    async fn nudge(&mut self, rounds: u32) {
        for _ in 0..rounds {
            if let Err(e) = self.renderer.scroll_by(self.settings.scroll_step_px).await {
                tracing::debug!("Scroll failed: {}", e);
            }
            let pause = random_between(self.settings.scroll_pause_min, self.settings.scroll_pause_max);
            tokio::time::sleep(pause).await;
            self.renderer.dismiss_interstitials().await;
        }
    }

    /// Counts one logical page against the session budget
    pub fn record_page(&mut self) {
        self.state.record_page();
    }

    /// Returns true when the loop should recycle this session
    pub fn is_exhausted(&self) -> bool {
        self.state.is_exhausted()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Closes the renderer; failures are logged, not returned
    pub async fn close(mut self) {
        tracing::debug!(
            "Closing {} session after {} pages ({:?})",
            self.state.profile,
            self.state.pages_served,
            self.state.uptime()
        );
        if let Err(e) = self.renderer.close().await {
            tracing::warn!("Renderer did not close cleanly: {}", e);
        }
    }
}

/// Opens page sessions, retrying with backoff and a fallback profile
pub struct SessionFactory<L: RendererLauncher> {
    launcher: L,
    primary: LaunchProfile,
    fallback: Option<LaunchProfile>,
    settings: SessionSettings,
    open_retries: u32,
    retry_min: Duration,
    retry_max: Duration,
    page_budget: u32,
}

impl<L: RendererLauncher> SessionFactory<L> {
    pub fn from_config(launcher: L, config: &Config) -> Self {
        let (primary, fallback) = LaunchProfile::from_config(config);
        Self {
            launcher,
            primary,
            fallback,
            settings: SessionSettings::from_config(config),
            open_retries: config.session.open_retries.max(1),
            retry_min: Duration::from_millis(config.session.open_retry_min_ms),
            retry_max: Duration::from_millis(config.session.open_retry_max_ms),
            page_budget: config.session.recycle_every_pages,
        }
    }

    /// Opens a session
    ///
    /// Each attempt tries the primary profile, then the fallback one; attempts
    /// are separated by a short randomized backoff. Fails with
    /// [`HarvestError::SessionInit`] once every attempt is used up.
    pub async fn open(&self) -> crate::Result<PageSession<L::Renderer>> {
        let mut last_error = String::new();

        for attempt in 1..=self.open_retries {
            let profiles = std::iter::once(&self.primary).chain(self.fallback.as_ref());
            for profile in profiles {
                match self.launcher.launch(profile).await {
                    Ok(renderer) => {
                        tracing::info!(
                            "Rendering session opened with {} profile (attempt {})",
                            profile.label,
                            attempt
                        );
                        let state = SessionState::new(self.page_budget, profile.label.clone());
                        return Ok(PageSession::new(renderer, self.settings.clone(), state));
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Session open attempt {}/{} failed: {}",
                            attempt,
                            self.open_retries,
                            e
                        );
                        last_error = e.to_string();
                    }
                }
            }

            if attempt < self.open_retries {
                tokio::time::sleep(random_between(self.retry_min, self.retry_max)).await;
            }
        }

        Err(HarvestError::SessionInit {
            attempts: self.open_retries,
            message: last_error,
        })
    }
}
