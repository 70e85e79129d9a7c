// src/listing/strategies.rs
// =============================================================================
// Link extraction routines, one per server family plus the generic ones.
//
// Each routine only pulls (href, text) pairs out of the document. Resolving,
// filtering and de-duplicating happen in one place (listing/mod.rs) so every
// routine is judged by the same rules.
//
// Rust concepts:
// - fn pointers: the routines are plain `fn(&Html) -> Vec<Link>` so they can
//   live in a lookup table keyed by ServerType
// - OnceLock: CSS selectors and regexes are compiled once per process
// =============================================================================

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

use super::detect::ServerType;
use super::entry::{is_self_reference, is_valid_href, Link};

/// A link extraction routine.
pub type Strategy = fn(&Html) -> Vec<Link>;

struct Selectors {
    link: Selector,
    table: Selector,
    row: Selector,
    pre: Selector,
    list_item_link: Selector,
    table_link: Selector,
    pre_link: Selector,
    list_link: Selector,
}

// The selectors are string constants; parsing them can only fail on a typo,
// which every test in this module would catch
fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        let parse = |css: &str| Selector::parse(css).expect("constant CSS selector");
        Selectors {
            link: parse("a[href]"),
            table: parse("table"),
            row: parse("tr"),
            pre: parse("pre"),
            list_item_link: parse("li a[href]"),
            table_link: parse("table a[href]"),
            pre_link: parse("pre a[href]"),
            list_link: parse("ul a[href], ol a[href]"),
        }
    })
}

// "01/02/2024" or "1/2/2024" as printed by IIS
fn date_pattern() -> &'static Regex {
    static DATE: OnceLock<Regex> = OnceLock::new();
    DATE.get_or_init(|| Regex::new(r"\d{1,2}/\d{1,2}/\d{4}").expect("constant regex"))
}

/// The specialised routine for a server family, if there is one.
pub fn for_server(kind: ServerType) -> Option<Strategy> {
    match kind {
        ServerType::Apache => Some(apache),
        ServerType::Nginx => Some(nginx),
        ServerType::Iis => Some(iis),
        ServerType::PythonSimple => Some(python_simple),
        ServerType::Unknown => None,
    }
}

/// Generic strategies in the order they are tried.
pub const GENERIC: [Strategy; 4] = [all_links, table_links, pre_links, list_links];

fn to_link(element: ElementRef<'_>) -> Option<Link> {
    let href = element.value().attr("href")?;
    Some(Link::new(href, element.text().collect::<String>()))
}

// Links from a listing, without the parent/self entries every listing has
fn listing_links<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> Vec<Link> {
    elements
        .filter_map(to_link)
        .filter(|link| !is_self_reference(&link.href))
        .collect()
}

// Page links that do not obviously leave the site
fn local_links(document: &Html) -> Vec<Link> {
    listing_links(document.select(&selectors().link))
        .into_iter()
        .filter(|link| {
            let href = link.href.to_ascii_lowercase();
            !href.starts_with("http") && !href.starts_with("mailto")
        })
        .collect()
}

fn first_pre_links(document: &Html) -> Vec<Link> {
    let s = selectors();
    match document.select(&s.pre).next() {
        Some(pre) => listing_links(pre.select(&s.link)),
        None => Vec::new(),
    }
}

/// Apache: one link per table row (header row skipped), else the <pre> block.
pub fn apache(document: &Html) -> Vec<Link> {
    let s = selectors();

    if document.select(&s.table).next().is_some() {
        let rows: Vec<ElementRef<'_>> = document.select(&s.row).skip(1).collect();
        if !rows.is_empty() {
            return listing_links(rows.into_iter().filter_map(|row| row.select(&s.link).next()));
        }
    }

    first_pre_links(document)
}

/// nginx: links inside the <pre> block, else every local link.
pub fn nginx(document: &Html) -> Vec<Link> {
    let links = first_pre_links(document);
    if !links.is_empty() {
        return links;
    }
    local_links(document)
}

/// IIS: dated or <DIR> lines of the <pre> block, name = last token.
pub fn iis(document: &Html) -> Vec<Link> {
    let Some(pre) = document.select(&selectors().pre).next() else {
        return Vec::new();
    };

    pre_lines(pre)
        .iter()
        .filter_map(|line| {
            let is_dir = line.to_ascii_uppercase().contains("<DIR>");
            if !is_dir && !date_pattern().is_match(line) {
                return None;
            }

            let name = line.split_whitespace().last()?;
            if name == "." || name == ".." || name.eq_ignore_ascii_case("<dir>") {
                return None;
            }

            let href = if is_dir {
                format!("{}/", name.trim_end_matches('/'))
            } else {
                name.to_string()
            };
            Some(Link::new(href, name))
        })
        .collect()
}

// Text of a <pre> block split into lines. IIS separates lines with <br>
// rather than newlines, so both count as line breaks.
fn pre_lines(pre: ElementRef<'_>) -> Vec<String> {
    let mut lines = vec![String::new()];

    for node in pre.descendants() {
        match node.value() {
            Node::Text(text) => {
                let mut parts = text.split('\n');
                if let (Some(first), Some(current)) = (parts.next(), lines.last_mut()) {
                    current.push_str(first);
                }
                for part in parts {
                    lines.push(part.to_string());
                }
            }
            Node::Element(element) if element.name() == "br" => lines.push(String::new()),
            _ => {}
        }
    }

    lines
}

/// Python http.server: links inside list items, else every local link.
pub fn python_simple(document: &Html) -> Vec<Link> {
    let links = listing_links(document.select(&selectors().list_item_link));
    if !links.is_empty() {
        return links;
    }
    local_links(document)
}

fn generic(document: &Html, selector: &Selector) -> Vec<Link> {
    document
        .select(selector)
        .filter_map(to_link)
        .filter(|link| is_valid_href(&link.href))
        .collect()
}

fn all_links(document: &Html) -> Vec<Link> {
    generic(document, &selectors().link)
}

fn table_links(document: &Html) -> Vec<Link> {
    generic(document, &selectors().table_link)
}

fn pre_links(document: &Html) -> Vec<Link> {
    generic(document, &selectors().pre_link)
}

fn list_links(document: &Html) -> Vec<Link> {
    generic(document, &selectors().list_link)
}

/// Every link whose href mentions a common file extension.
///
/// Last resort for pages no structural routine could make sense of.
pub fn links_with_extensions(document: &Html, extensions: &[&str]) -> Vec<Link> {
    document
        .select(&selectors().link)
        .filter_map(to_link)
        .filter(|link| {
            let href = link.href.to_ascii_lowercase();
            extensions.iter().any(|ext| href.contains(ext)) && is_valid_href(&link.href)
        })
        .collect()
}
