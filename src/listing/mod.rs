// src/listing/mod.rs
// =============================================================================
// The adaptive directory-listing parser.
//
// Turns one HTML page into a list of Entry values, whatever server produced
// it. The steps:
// 1. Guess the server type from the Server header and page fingerprints
// 2. Try the specialised routine for each candidate, in priority order
// 3. If none found anything, try the generic strategies in order
// 4. Resolve, filter and de-duplicate the surviving links
//
// The parser never fails: malformed HTML just yields fewer (or zero) entries.
// =============================================================================

mod detect;
mod entry;
mod strategies;

use scraper::Html;
use std::collections::HashSet;
use tracing::debug;
use url::Url;

pub use entry::{extension_of, same_site, Entry};

use detect::detect;
use entry::{is_non_navigable, is_protocol_absolute, is_self_reference, Link};

/// File extensions that mark a link as downloadable when the structural
/// routines found nothing.
pub const COMMON_EXTENSIONS: [&str; 16] = [
    ".txt", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".zip", ".rar", ".tar", ".gz", ".mp3",
    ".mp4", ".avi", ".jpg", ".png", ".gif",
];

/// Parses a listing page into entries.
///
/// Parameters:
///   base: the URL the page was served from (relative hrefs resolve against it)
///   html: the page body
///   server_header: value of the HTTP Server header, if the response had one
pub fn parse(base: &Url, html: &str, server_header: Option<&str>) -> Vec<Entry> {
    let document = Html::parse_document(html);
    let candidates = detect(server_header, html);

    debug!(url = %base, servers = ?candidates, "detected server type");

    let specialised = candidates.iter().filter_map(|kind| strategies::for_server(*kind));
    let all = specialised.chain(strategies::GENERIC);

    for strategy in all {
        let entries = build_entries(base, strategy(&document));
        if !entries.is_empty() {
            return entries;
        }
    }

    Vec::new()
}

/// Scans every link for a common file extension and treats matches as files.
///
/// Used by the crawler when `parse` returns nothing.
pub fn sniff_file_links(base: &Url, html: &str) -> Vec<Entry> {
    let document = Html::parse_document(html);
    let links = strategies::links_with_extensions(&document, &COMMON_EXTENSIONS);

    build_entries(base, links)
        .into_iter()
        .map(|entry| Entry {
            is_directory: false,
            ..entry
        })
        .collect()
}

/// Counts the links a generic page scan would accept.
///
/// The listing probe uses this to judge whether a page looks like a listing.
pub fn count_listing_links(html: &str) -> usize {
    let document = Html::parse_document(html);
    strategies::GENERIC[0](&document).len()
}

// Resolves links and applies the rules every strategy shares:
// - parent/self/root/fragment references are dropped
// - mailto:, javascript:, tel: and data: links are dropped
// - absolute links to another site are dropped
// - the first occurrence of each absolute URL wins
fn build_entries(base: &Url, links: Vec<Link>) -> Vec<Entry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for link in links {
        if is_self_reference(&link.href) || is_non_navigable(&link.href) {
            continue;
        }

        let Some(entry) = Entry::from_href(base, &link.href, &link.text) else {
            continue;
        };

        if !matches!(entry.url.scheme(), "http" | "https") {
            continue;
        }
        if is_protocol_absolute(&entry.raw_href) && !same_site(&entry.url, base) {
            continue;
        }
        if !seen.insert(entry.url.clone()) {
            continue;
        }

        entries.push(entry);
    }

    entries
}
