use crate::url::UrlMode;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Comment-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

impl Config {
    /// Builds a configuration with defaults for everything but the feed address
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        Self {
            feed: FeedConfig {
                base_url: base_url.into(),
                url_mode: UrlMode::default(),
                max_pages: default_max_pages(),
                content_marker: default_content_marker(),
            },
            session: SessionConfig::default(),
            fetch: FetchConfig::default(),
            pacing: PacingConfig::default(),
            user_agent: UserAgentConfig::default(),
            output: OutputConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

/// Which feed to walk and how far
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeedConfig {
    /// Address of page 1 of the feed
    pub base_url: String,

    /// Page addressing scheme
    #[serde(default)]
    pub url_mode: UrlMode,

    /// Highest page number the loop will attempt
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// CSS selector whose presence proves the comments rendered
    #[serde(default = "default_content_marker")]
    pub content_marker: String,
}

fn default_max_pages() -> u32 {
    10_000
}

fn default_content_marker() -> String {
    "#comments_new".to_string()
}

/// Rendering session behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SessionConfig {
    /// How long to wait for the content marker after navigation (milliseconds)
    pub wait_timeout_ms: u64,

    /// Marker wait after the scroll nudges (milliseconds)
    pub recheck_timeout_ms: u64,

    /// Navigation timeout handed to the renderer (milliseconds)
    pub page_load_timeout_ms: u64,

    /// Incremental scrolls used to trigger lazy loading
    pub scroll_rounds: u32,

    /// Pixels per scroll
    pub scroll_step_px: u32,

    pub scroll_pause_min_ms: u64,
    pub scroll_pause_max_ms: u64,

    /// Close and reopen the session after this many pages (0 disables)
    pub recycle_every_pages: u32,

    /// Attempts to open a session before giving up
    pub open_retries: u32,

    pub open_retry_min_ms: u64,
    pub open_retry_max_ms: u64,

    /// Primary renderer profile directory
    pub profile_dir: PathBuf,

    /// Secondary profile used when the primary one cannot be opened
    pub fallback_profile_dir: Option<PathBuf>,

    /// Subresource blocking for renderers that load subresources
    ///
    /// The HTTP renderer fetches only the page document, so these toggles
    /// have no effect with it.
    pub block_images: bool,
    pub block_fonts: bool,
    pub block_css: bool,
    pub block_media: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 4_000,
            recheck_timeout_ms: 2_000,
            page_load_timeout_ms: 25_000,
            scroll_rounds: 2,
            scroll_step_px: 650,
            scroll_pause_min_ms: 120,
            scroll_pause_max_ms: 280,
            recycle_every_pages: 80,
            open_retries: 3,
            open_retry_min_ms: 1_200,
            open_retry_max_ms: 2_200,
            profile_dir: PathBuf::from("./profiles/primary"),
            fallback_profile_dir: Some(PathBuf::from("./profiles/fallback")),
            block_images: true,
            block_fonts: true,
            block_css: true,
            block_media: true,
        }
    }
}

impl SessionConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn recheck_timeout(&self) -> Duration {
        Duration::from_millis(self.recheck_timeout_ms)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load_timeout_ms)
    }

    /// URL patterns the renderer should refuse to load
    ///
    /// Only affects speed; records are unchanged whether or not these load.
    /// Ignored by the HTTP renderer, which never requests subresources.
    pub fn blocked_resource_patterns(&self) -> Vec<String> {
        let mut patterns = Vec::new();

        if self.block_images {
            patterns.extend(["*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.ico"]);
        }
        if self.block_fonts {
            patterns.extend(["*.woff", "*.woff2", "*.ttf", "*.otf"]);
        }
        if self.block_css {
            patterns.push("*.css");
        }
        if self.block_media {
            patterns.extend(["*.mp4", "*.webm", "*.m3u8"]);
        }

        // ad and tracker hosts are always blocked
        patterns.extend([
            "*doubleclick*",
            "*googlesyndication*",
            "*google-analytics*",
            "*facebook*",
            "*hotjar*",
            "*optimizely*",
        ]);

        patterns.into_iter().map(String::from).collect()
    }
}

/// Retry controller limits
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FetchConfig {
    /// Total attempts per page, including the first
    pub max_attempts: u32,

    /// Backoff unit after a page showed no content (multiplied by the attempt number)
    pub not_found_backoff_ms: u64,

    /// Backoff unit after a navigation error (multiplied by the attempt number)
    pub transient_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            not_found_backoff_ms: 600,
            transient_backoff_ms: 800,
        }
    }
}

/// Politeness delays between pages
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PacingConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,

    /// Added to the short delay after a page that could not be loaded
    pub failure_extra_delay_ms: u64,

    /// Added to the short delay after a session recycle
    pub recycle_extra_delay_ms: u64,

    /// Take a long pause every this many pages (0 disables)
    pub long_pause_every_pages: u32,

    pub long_pause_min_secs: u64,
    pub long_pause_max_secs: u64,

    /// Stop the run after this many seconds (0 means unbounded)
    pub max_runtime_secs: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 150,
            max_delay_ms: 550,
            failure_extra_delay_ms: 500,
            recycle_extra_delay_ms: 350,
            long_pause_every_pages: 150,
            long_pause_min_secs: 8,
            long_pause_max_secs: 18,
            max_runtime_secs: 0,
        }
    }
}

impl PacingConfig {
    pub fn max_runtime(&self) -> Option<Duration> {
        (self.max_runtime_secs > 0).then(|| Duration::from_secs(self.max_runtime_secs))
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserAgentConfig {
    /// Name of the harvester
    pub crawler_name: String,

    /// Version of the harvester
    pub crawler_version: String,

    /// URL with information about the harvester
    pub contact_url: String,

    /// Email address for harvester-related contact
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "comment-harvest".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Format: Name/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Record store format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Sqlite,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Path to the record store
    pub records_path: String,

    /// Path to the checkpoint file
    pub checkpoint_path: String,

    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            records_path: "comments.csv".to_string(),
            checkpoint_path: "progress.json".to_string(),
            format: OutputFormat::Csv,
        }
    }
}

/// Selectors used by the built-in comment extractor
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExtractorConfig {
    /// Element holding one comment's text
    pub comment_body: String,

    /// Author link inside a comment card
    pub author: String,

    /// Display timestamp inside a comment card
    pub timestamp: String,

    /// How many ancestors of a body element to search for its card
    pub card_search_depth: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            comment_body: "div.break-words.leading-5".to_string(),
            author: r#"a[href^="/members/"]"#.to_string(),
            timestamp: r#"span[data-test="comment-date"]"#.to_string(),
            card_search_depth: 7,
        }
    }
}
