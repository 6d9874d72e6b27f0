//! Crawler module: rendering sessions and the harvest loop
//!
//! This module contains the core harvesting logic, including:
//! - The renderer abstraction and page sessions
//! - Page fetching with retries and URL fallback
//! - Comment extraction
//! - Pacing between pages
//! - The top-level harvest loop

mod coordinator;
mod fetcher;
mod http_renderer;
mod parser;
mod scheduler;
mod session;

pub use coordinator::{run_harvest, HarvestOutcome, Harvester, RunCounters};
pub use fetcher::{fetch_page, FetchOutcome, PageFetch, RetryPolicy};
pub use http_renderer::{build_http_client, HttpLauncher, HttpRenderer, ProfileLock};
pub use parser::{CommentExtractor, SelectorExtractor};
pub use scheduler::{random_between, Pacer};
pub use session::{
    LaunchProfile, PageSession, RenderError, Renderer, RendererLauncher, SessionFactory,
    SessionSettings,
};
