//! Comment extraction from rendered feed pages
//!
//! This module turns rendered markup into comment records:
//! - Finds every comment body inside the content container
//! - Walks up from each body to the card holding its metadata
//! - Reads author, timestamp, reaction counts and comment id from the card
//!
//! Extraction never fails as a whole; a field that cannot be found is left
//! empty and malformed markup yields fewer records.

use crate::config::ExtractorConfig;
use crate::storage::CommentRecord;
use crate::{ConfigError, ConfigResult};
use scraper::{ElementRef, Html, Selector};

/// Pulls comment records out of rendered page content
pub trait CommentExtractor: Send + Sync {
    /// Extracts the comments of `page`, in page order
    ///
    /// `source_url` is the URL the content was read from and is stamped on
    /// every record. An empty result means the page holds no comments.
    fn extract(&self, html: &str, page: u32, source_url: &str) -> Vec<CommentRecord>;
}

/// Extractor driven by CSS selectors
#[derive(Debug)]
pub struct SelectorExtractor {
    container: Selector,
    body: Selector,
    author: Selector,
    timestamp: Selector,
    labelled: Selector,
    button: Selector,
    span: Selector,
    comment_id: Selector,
    data_id: Selector,
    card_search_depth: u32,
}

impl SelectorExtractor {
    /// Compiles the configured selectors
    ///
    /// # Arguments
    ///
    /// * `content_marker` - Selector of the element wrapping all comments
    /// * `config` - Body, author and timestamp selectors
    ///
    /// # Returns
    ///
    /// * `Ok(SelectorExtractor)` - All selectors compiled
    /// * `Err(ConfigError::InvalidSelector)` - A selector did not parse
    pub fn new(content_marker: &str, config: &ExtractorConfig) -> ConfigResult<Self> {
        Ok(Self {
            container: compile(content_marker)?,
            body: compile(&config.comment_body)?,
            author: compile(&config.author)?,
            timestamp: compile(&config.timestamp)?,
            labelled: compile("[aria-label]")?,
            button: compile("button")?,
            span: compile("span")?,
            comment_id: compile("[data-comment-id]")?,
            data_id: compile("[data-id]")?,
            card_search_depth: config.card_search_depth.max(1),
        })
    }

    /// Walks up from a comment body to the element carrying its metadata
    ///
    /// Stops at the first ancestor that contains both an author link and a
    /// timestamp; otherwise returns the furthest ancestor searched.
    fn find_card<'a>(&self, body: ElementRef<'a>) -> ElementRef<'a> {
        let mut card = body;
        for _ in 0..self.card_search_depth {
            let Some(parent) = card.parent().and_then(ElementRef::wrap) else {
                break;
            };
            card = parent;
            if card.select(&self.author).next().is_some()
                && card.select(&self.timestamp).next().is_some()
            {
                break;
            }
        }
        card
    }

    fn first_text(&self, card: ElementRef<'_>, selector: &Selector) -> String {
        card.select(selector)
            .next()
            .map(element_text)
            .unwrap_or_default()
    }

    /// Recovers like and dislike counts from a card
    ///
    /// Tries accessibility labels first, then numbers on buttons, then
    /// purely numeric spans. Unknown counts stay `None`.
    fn reaction_counts(&self, card: ElementRef<'_>) -> (Option<u32>, Option<u32>) {
        let mut likes = None;
        let mut dislikes = None;

        for el in card.select(&self.labelled) {
            let label = el.value().attr("aria-label").unwrap_or("").to_lowercase();
            let Some(count) = numbers_in(&label).into_iter().next() else {
                continue;
            };
            // "dislike" contains "like", so it is checked first
            if label.contains("dislike") || label.contains("beğenme") {
                dislikes.get_or_insert(count);
            } else if label.contains("like") || label.contains("beğen") {
                likes.get_or_insert(count);
            }
        }

        if likes.is_none() || dislikes.is_none() {
            let numbers: Vec<u32> = card
                .select(&self.button)
                .flat_map(|button| numbers_in(&element_text(button)))
                .collect();
            fill_counts(&mut likes, &mut dislikes, &numbers);
        }

        if likes.is_none() || dislikes.is_none() {
            let numbers: Vec<u32> = card
                .select(&self.span)
                .filter_map(|span| {
                    let text = element_text(span);
                    let numeric = !text.is_empty() && text.chars().all(|c| c.is_ascii_digit());
                    numeric.then(|| text.parse().ok()).flatten()
                })
                .collect();
            fill_counts(&mut likes, &mut dislikes, &numbers);
        }

        (likes, dislikes)
    }

    /// Recovers the comment id from data attributes, else from the author link
    fn comment_id(&self, card: ElementRef<'_>) -> String {
        let from_attr = |attr: &str, selector: &Selector| {
            std::iter::once(card)
                .chain(card.select(selector))
                .filter_map(|el| el.value().attr(attr))
                .find(|value| !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()))
                .map(str::to_string)
        };

        from_attr("data-comment-id", &self.comment_id)
            .or_else(|| from_attr("data-id", &self.data_id))
            .or_else(|| {
                card.select(&self.author)
                    .next()
                    .and_then(|link| link.value().attr("href"))
                    .and_then(member_segment)
            })
            .unwrap_or_default()
    }
}

impl CommentExtractor for SelectorExtractor {
    fn extract(&self, html: &str, page: u32, source_url: &str) -> Vec<CommentRecord> {
        let document = Html::parse_document(html);
        let Some(container) = document.select(&self.container).next() else {
            tracing::debug!("Page {}: content container not found", page);
            return Vec::new();
        };

        let mut records = Vec::new();
        for (position, body) in container.select(&self.body).enumerate() {
            let text = element_text(body);
            if text.is_empty() {
                continue;
            }

            let card = self.find_card(body);
            let mut record = CommentRecord::new(page, position as u32 + 1, &text, source_url);
            record.author = self.first_text(card, &self.author);
            record.timestamp = self.first_text(card, &self.timestamp);
            (record.likes, record.dislikes) = self.reaction_counts(card);
            record.comment_id = self.comment_id(card);
            records.push(record);
        }

        tracing::trace!("Page {}: extracted {} comments", page, records.len());
        records
    }
}

fn compile(selector: &str) -> ConfigResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("{}: {:?}", selector, e)))
}

/// Visible text of an element with whitespace collapsed
fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every run of ASCII digits in `text`, in order
fn numbers_in(text: &str) -> Vec<u32> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .filter_map(|run| run.parse().ok())
        .collect()
}

fn fill_counts(likes: &mut Option<u32>, dislikes: &mut Option<u32>, numbers: &[u32]) {
    if likes.is_none() {
        *likes = numbers.first().copied();
    }
    if dislikes.is_none() {
        *dislikes = numbers.get(1).copied();
    }
}

/// Member identifier from a link like `/members/12345/profile`
fn member_segment(href: &str) -> Option<String> {
    let (_, rest) = href.rsplit_once("/members/")?;
    let segment = rest.split('/').next()?.trim();
    (!segment.is_empty()).then(|| segment.to_string())
}
