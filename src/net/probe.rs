// src/net/probe.rs
// =============================================================================
// A quick look at the root page before crawling starts.
//
// The probe never stops a run. It only tells the user early that the URL
// they gave might not be a directory listing at all (a login page, a file,
// a single-page app), which would explain an empty crawl later.
// =============================================================================

use url::Url;

use super::http::HttpClient;
use crate::listing::count_listing_links;

// Phrases and markup that almost every auto-index page contains
const LISTING_INDICATORS: [&str; 7] = [
    "index of",
    "directory listing",
    "parent directory",
    "<pre>",
    "autoindex",
    "files in this folder",
    "folder listing",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeVerdict {
    /// Looks like a listing
    Listing,
    /// Served something that is not HTML or text
    NotHtml { content_type: String },
    /// No listing phrases and fewer than two usable links
    NoIndicators { links: usize },
    /// The root could not be fetched
    Unreachable { error: String },
}

pub async fn probe_listing(client: &HttpClient, root: &Url) -> ProbeVerdict {
    match client.get_page(root).await {
        Ok(page) => assess(page.content_type.as_deref(), &page.body),
        Err(e) => ProbeVerdict::Unreachable {
            error: e.to_string(),
        },
    }
}

/// Judges a fetched page. Split out so it can be tested without a server.
pub fn assess(content_type: Option<&str>, body: &str) -> ProbeVerdict {
    let content_type = content_type.unwrap_or("").to_ascii_lowercase();
    if !content_type.contains("html") && !content_type.contains("text") {
        return ProbeVerdict::NotHtml { content_type };
    }

    let lower = body.to_ascii_lowercase();
    if LISTING_INDICATORS.iter().any(|marker| lower.contains(marker)) {
        return ProbeVerdict::Listing;
    }

    // Two links is the least a directory with any content can have
    let links = count_listing_links(body);
    if links < 2 {
        ProbeVerdict::NoIndicators { links }
    } else {
        ProbeVerdict::Listing
    }
}
