//! Page number <-> URL mapping for the two addressing schemes

use super::AddressingScheme;

/// Builds a path-style page URL: `base` for page 1, `base/N` otherwise
pub fn path_page_url(base_url: &str, page: u32) -> String {
    let base = base_url.trim_end_matches('/');
    if page <= 1 {
        return base.to_string();
    }
    format!("{}/{}", base, page)
}

/// Builds a query-style page URL: `base` for page 1, `base?page=N` otherwise
///
/// Joins with `&` when the base already carries a query string.
pub fn query_page_url(base_url: &str, page: u32) -> String {
    let base = base_url.trim_end_matches('/');
    if page <= 1 {
        return base.to_string();
    }
    let joiner = if base.contains('?') { '&' } else { '?' };
    format!("{}{}page={}", base, joiner, page)
}

/// Infers which scheme produced `url` and the page number it addresses
///
/// Returns `None` for URLs that carry no page number (the bare base address).
pub fn page_from_url(url: &str) -> Option<(AddressingScheme, u32)> {
    if let Some(page) = query_page_number(url) {
        return Some((AddressingScheme::QueryStyle, page));
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last_segment = path.rsplit('/').next()?;
    if last_segment.is_empty() || !last_segment.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    last_segment
        .parse()
        .ok()
        .map(|page| (AddressingScheme::PathStyle, page))
}

/// Finds the value of a `page=` query parameter
fn query_page_number(url: &str) -> Option<u32> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .filter_map(|pair| pair.strip_prefix("page="))
        .find_map(|value| value.parse().ok())
}
