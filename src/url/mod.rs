//! URL handling module for Comment-Harvest
//!
//! Maps logical page numbers of the feed onto concrete URLs. Two addressing
//! schemes exist in the wild (`/N` path suffix and `page=N` query parameter);
//! `auto` mode starts with the path scheme and lets the retry controller fall
//! back to the other one.

mod pager;

use serde::Deserialize;
use std::fmt;

pub use pager::{page_from_url, path_page_url, query_page_url};

/// Configured addressing mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlMode {
    /// Always `base/N`
    Path,
    /// Always `base?page=N`
    Query,
    /// Path first, query as a fallback
    #[default]
    Auto,
}

impl UrlMode {
    /// Scheme used for the first attempt at a page
    pub fn primary_scheme(&self) -> AddressingScheme {
        match self {
            Self::Query => AddressingScheme::QueryStyle,
            Self::Path | Self::Auto => AddressingScheme::PathStyle,
        }
    }

    /// Returns true if a failed page may be retried under the other scheme
    pub fn allows_fallback(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl fmt::Display for UrlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Auto => "auto",
        };
        f.write_str(name)
    }
}

/// A concrete addressing scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingScheme {
    PathStyle,
    QueryStyle,
}

impl AddressingScheme {
    pub fn other(&self) -> Self {
        match self {
            Self::PathStyle => Self::QueryStyle,
            Self::QueryStyle => Self::PathStyle,
        }
    }
}

/// Builds candidate URLs for pages of one feed
#[derive(Debug, Clone)]
pub struct UrlStrategy {
    base_url: String,
}

impl UrlStrategy {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the URL of `page` under `scheme`
    ///
    /// # Examples
    ///
    /// ```
    /// use comment_harvest::url::{AddressingScheme, UrlStrategy};
    ///
    /// let strategy = UrlStrategy::new("https://example.com/commentary");
    /// assert_eq!(strategy.candidate(1, AddressingScheme::PathStyle), "https://example.com/commentary");
    /// assert_eq!(strategy.candidate(2, AddressingScheme::PathStyle), "https://example.com/commentary/2");
    /// assert_eq!(strategy.candidate(2, AddressingScheme::QueryStyle), "https://example.com/commentary?page=2");
    /// ```
    pub fn candidate(&self, page: u32, scheme: AddressingScheme) -> String {
        match scheme {
            AddressingScheme::PathStyle => path_page_url(&self.base_url, page),
            AddressingScheme::QueryStyle => query_page_url(&self.base_url, page),
        }
    }

    /// Returns the same page under the other scheme
    ///
    /// The scheme and page number are read back from `url`; `page` is used
    /// when the URL itself does not reveal them. Returns `None` when both
    /// schemes address the page identically (page 1).
    pub fn alternate(&self, url: &str, page: u32) -> Option<String> {
        let (scheme, page) = if url == self.candidate(page, AddressingScheme::PathStyle) {
            (AddressingScheme::PathStyle, page)
        } else if url == self.candidate(page, AddressingScheme::QueryStyle) {
            (AddressingScheme::QueryStyle, page)
        } else {
            page_from_url(url).unwrap_or((AddressingScheme::PathStyle, page))
        };

        let alternate = self.candidate(page, scheme.other());
        (alternate != url).then_some(alternate)
    }
}
