// src/listing/entry.rs
// =============================================================================
// The normalized record every listing strategy produces.
//
// A directory listing can express the same link in many ways:
//   <a href="sub/">sub/</a>
//   <a href="/files/sub/">sub</a>
//   <a href="sub%2F">Sub directory</a>
// Whatever the server wrote, the crawler only ever sees an Entry with an
// absolute URL, a display name and a directory flag.
//
// This file also owns the href rules shared by all strategies:
// - which hrefs point back at the listing itself (parent, self, root)
// - which hrefs are not navigable at all (mailto:, javascript:, ...)
// - which hrefs leave the site
// =============================================================================

use std::borrow::Cow;
use url::Url;

/// One discovered link, resolved against the page it was found on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Absolute location of the file or directory
    pub url: Url,
    /// Display name with any trailing separator removed
    pub name: String,
    pub is_directory: bool,
    /// The href exactly as it appeared in the page (entities decoded)
    pub raw_href: String,
}

// A link pulled out of the page before it is resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub text: String,
}

impl Link {
    pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
        Link {
            href: href.into(),
            text: text.into().trim().to_string(),
        }
    }
}

// Hrefs that point back at the listing rather than into it
const SELF_REFERENCES: [&str; 6] = ["../", "..", "/", "./", ".", "#"];

// Schemes that never name a downloadable resource
const NON_NAVIGABLE: [&str; 4] = ["mailto:", "javascript:", "tel:", "data:"];

// Prefixes the generic strategies treat as "not part of this listing"
const EXTERNAL_PREFIXES: [&str; 6] = [
    "http://",
    "https://",
    "ftp://",
    "mailto:",
    "javascript:",
    "tel:",
];

impl Entry {
    /// Builds an entry from a raw href found on `base`.
    ///
    /// Returns None when the href cannot be resolved to an absolute URL.
    pub fn from_href(base: &Url, href: &str, name: &str) -> Option<Entry> {
        let href = decode_entities(href.trim()).into_owned();
        let url = base.join(&href).ok()?;

        let is_directory = href.ends_with('/') || name_marks_directory(name);

        let mut display = name.trim().trim_end_matches('/').to_string();
        if display.is_empty() {
            display = last_segment(&url);
        }

        Some(Entry {
            url,
            name: display,
            is_directory,
            raw_href: href,
        })
    }
}

// "sub/" as link text with no dot in its last segment reads as a directory
fn name_marks_directory(name: &str) -> bool {
    let name = name.trim();
    if !name.ends_with('/') {
        return false;
    }
    let stem = name.trim_end_matches('/');
    let last = stem.rsplit('/').next().unwrap_or(stem);
    !last.contains('.')
}

// Used when a link has no text (icon-only rows, for example)
fn last_segment(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("");

    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

/// Extension of an href: the suffix after the last dot of its final segment.
///
/// Query strings and fragments are ignored. Returns None when there is no dot.
pub fn extension_of(href: &str) -> Option<String> {
    let path = href
        .split(['?', '#'])
        .next()
        .unwrap_or(href)
        .trim_end_matches('/');
    let file = path.rsplit('/').next().unwrap_or(path);

    match file.rfind('.') {
        Some(index) if index + 1 < file.len() => Some(file[index + 1..].to_ascii_lowercase()),
        _ => None,
    }
}

/// True for hrefs that refer to the listing itself: parent, self, root,
/// fragment-only or query-only (column sort links).
pub fn is_self_reference(href: &str) -> bool {
    let href = href.trim();
    href.is_empty()
        || SELF_REFERENCES.contains(&href)
        || href.starts_with('#')
        || href.starts_with('?')
}

/// True for mailto:, javascript:, tel: and data: links.
pub fn is_non_navigable(href: &str) -> bool {
    let lower = href.trim().to_ascii_lowercase();
    NON_NAVIGABLE.iter().any(|scheme| lower.starts_with(scheme))
}

/// True when the href names its own scheme or host ("https://x/", "//x/").
pub fn is_protocol_absolute(href: &str) -> bool {
    let href = href.trim();
    href.starts_with("//") || Url::parse(href).is_ok()
}

/// Check used by the generic strategies and extension sniffing.
///
/// Stricter than the per-server routines: any absolute link is rejected
/// outright, since an unclassified page is more likely to carry navigation.
pub fn is_valid_href(href: &str) -> bool {
    if is_self_reference(href) {
        return false;
    }
    let lower = href.trim().to_ascii_lowercase();
    !EXTERNAL_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

/// Two URLs are on the same site when scheme, host and port all agree.
pub fn same_site(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Decodes the HTML entities that show up in listing hrefs.
///
/// The HTML parser already decodes attributes once; listings generated by
/// scripts sometimes escape twice, so this runs a second pass.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        match tail.find(';').and_then(|end| decode_one(&tail[1..end]).map(|c| (c, end))) {
            Some((decoded, end)) => {
                out.push(decoded);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);

    Cow::Owned(out)
}

fn decode_one(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let digits = entity.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}
