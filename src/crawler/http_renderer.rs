//! Plain-HTTP renderer
//!
//! Fetches server-rendered pages with reqwest and answers marker queries with
//! scraper. There is nothing to scroll or dismiss in a static document, so
//! those operations are no-ops.
//!
//! Each renderer holds an exclusive lock file in its profile directory while it
//! is open. A profile held by a running process makes launch fail, which sends
//! the session factory to the fallback profile.

use crate::crawler::session::{LaunchProfile, RenderError, Renderer, RendererLauncher};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOCK_FILE: &str = ".harvest.lock";

/// Builds the HTTP client used by one renderer
///
/// # Arguments
///
/// * `profile` - Supplies the user agent and page-load timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(profile: &LaunchProfile) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(profile.user_agent.clone())
        .timeout(profile.page_load_timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Launches [`HttpRenderer`]s
#[derive(Debug, Clone, Default)]
pub struct HttpLauncher;

#[async_trait]
impl RendererLauncher for HttpLauncher {
    type Renderer = HttpRenderer;

    async fn launch(&self, profile: &LaunchProfile) -> Result<HttpRenderer, RenderError> {
        let launch_error = |message: String| RenderError::Launch {
            profile: profile.label.clone(),
            message,
        };

        let lock = ProfileLock::acquire(&profile.profile_dir)
            .map_err(|e| launch_error(format!("{}: {}", profile.profile_dir.display(), e)))?;
        let client = build_http_client(profile).map_err(|e| launch_error(e.to_string()))?;

        if !profile.blocked_patterns.is_empty() {
            tracing::debug!(
                "Ignoring {} resource blocking patterns; the HTTP renderer loads no subresources",
                profile.blocked_patterns.len()
            );
        }
        tracing::debug!("HTTP renderer ready in {}", profile.profile_dir.display());

        Ok(HttpRenderer {
            client,
            lock: Some(lock),
            current_url: None,
            body: None,
        })
    }
}

/// Renderer backed by plain HTTP GETs
pub struct HttpRenderer {
    client: Client,
    lock: Option<ProfileLock>,
    current_url: Option<String>,
    body: Option<String>,
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        if self.lock.is_none() {
            return Err(RenderError::Closed);
        }
        self.current_url = None;
        self.body = None;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                RenderError::Timeout {
                    url: url.to_string(),
                }
            } else {
                RenderError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        // other statuses still carry a document; the marker check decides
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| RenderError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        tracing::trace!("GET {} -> {} ({} bytes)", url, status.as_u16(), body.len());
        self.current_url = Some(final_url);
        self.body = Some(body);
        Ok(())
    }

    async fn dismiss_interstitials(&mut self) -> bool {
        false
    }

    async fn wait_for_marker(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<bool, RenderError> {
        match &self.body {
            Some(body) => document_contains(body, selector),
            None => Ok(false),
        }
    }

    async fn scroll_by(&mut self, _pixels: u32) -> Result<(), RenderError> {
        Ok(())
    }

    async fn content(&mut self) -> Result<String, RenderError> {
        self.body.clone().ok_or(RenderError::Closed)
    }

    fn current_url(&self) -> Option<String> {
        self.current_url.clone()
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.body = None;
        self.current_url = None;
        if let Some(lock) = self.lock.take() {
            lock.release()?;
        }
        Ok(())
    }
}

/// Returns true if `html` has an element matching `selector`
fn document_contains(html: &str, selector: &str) -> Result<bool, RenderError> {
    let selector =
        Selector::parse(selector).map_err(|e| RenderError::Selector(format!("{:?}", e)))?;
    let document = Html::parse_document(html);
    let found = document.select(&selector).next().is_some();
    Ok(found)
}

/// Exclusive claim on a profile directory
///
/// The lock file records the owning process id. A lock whose owner is still
/// running means the profile is in use; one left by a process that has exited
/// is stale and gets replaced.
#[derive(Debug)]
pub struct ProfileLock {
    path: PathBuf,
}

impl ProfileLock {
    pub fn acquire(profile_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(profile_dir)?;
        let path = profile_dir.join(LOCK_FILE);
        let pid = std::process::id();

        match fs::read_to_string(&path) {
            Ok(owner) => match owner.trim().parse::<u32>() {
                Ok(owner) if owner == pid || process_is_running(owner) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("profile is in use by process {}", owner),
                    ));
                }
                _ => {
                    tracing::warn!(
                        "Removing stale profile lock {} (owner {})",
                        path.display(),
                        owner.trim()
                    );
                    fs::remove_file(&path)?;
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        // create_new fails if another process claimed the file since the read
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(pid.to_string().as_bytes())?;
        Ok(Self { path })
    }

    pub fn release(mut self) -> io::Result<()> {
        let path = std::mem::take(&mut self.path);
        remove_if_owned(&path)
    }
}

impl Drop for ProfileLock {
    fn drop(&mut self) {
        if !self.path.as_os_str().is_empty() {
            let _ = remove_if_owned(&self.path);
        }
    }
}

/// Deletes the lock file only while it still names this process
fn remove_if_owned(path: &Path) -> io::Result<()> {
    let owner = match fs::read_to_string(path) {
        Ok(owner) => owner,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if owner.trim() != std::process::id().to_string() {
        tracing::warn!(
            "Profile lock {} now belongs to process {}; leaving it",
            path.display(),
            owner.trim()
        );
        return Ok(());
    }
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Returns true if a process with this id exists
#[cfg(unix)]
fn process_is_running(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // signal 0 only checks existence; EPERM means it exists under another user
    let result = unsafe { libc::kill(pid, 0) };
    result == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_is_running(_pid: u32) -> bool {
    // no portable liveness check; foreign locks are treated as stale
    false
}
