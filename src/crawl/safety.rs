// src/crawl/safety.rs
// =============================================================================
// Decides which discovered entries the crawler may act on.
//
// Rules (every one must pass):
// 1. No ".." path segment: nothing may climb out of the output directory
// 2. Absolute hrefs must stay on the crawl's site (scheme, host and port)
//    and under the root path. The same test applies to where a listing
//    request ends up after redirects
// 3. If an extension allow-list is set, a file's extension must be on it
// 4. Files that look dynamic (.php, .asp, .jsp, .cgi, a query string or a
//    literal '&') are skipped unless they also carry a static document
//    extension, so the crawler does not trigger server-side scripts
//
// Rules 3 and 4 only apply to files: directory hrefs have no extension.
// A rejection is not an error; the entry is just left out.
// =============================================================================

use std::collections::HashSet;
use std::fmt;
use url::Url;

use crate::listing::{extension_of, same_site, Entry};

const DYNAMIC_MARKERS: [&str; 6] = ["?", "&", ".php", ".asp", ".jsp", ".cgi"];
const STATIC_DOCUMENTS: [&str; 4] = [".pdf", ".doc", ".txt", ".zip"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ParentTraversal,
    OffSite,
    DisallowedExtension,
    DynamicContent,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::ParentTraversal => "parent path segment",
            Rejection::OffSite => "outside the crawl root",
            Rejection::DisallowedExtension => "extension not allowed",
            Rejection::DynamicContent => "looks like dynamic content",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone)]
pub struct SafetyFilter {
    root: Url,
    allowed_extensions: Option<HashSet<String>>,
}

impl SafetyFilter {
    /// An empty `allowed_extensions` list means every extension is allowed.
    pub fn new(root: Url, allowed_extensions: &[String]) -> Self {
        let allowed: HashSet<String> = allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        SafetyFilter {
            root,
            allowed_extensions: (!allowed.is_empty()).then_some(allowed),
        }
    }

    /// Rules 1-3 applied to a bare href. Hrefs ending in '/' count as directories.
    #[cfg(test)]
    pub fn is_safe(&self, raw_href: &str) -> bool {
        self.check_href(raw_href, raw_href.ends_with('/')).is_ok()
    }

    /// Whether `url` lies inside the crawl root.
    pub fn contains(&self, url: &Url) -> bool {
        same_site(url, &self.root) && url.path().starts_with(self.root.path())
    }

    /// All rules applied to an entry.
    pub fn check(&self, entry: &Entry) -> Result<(), Rejection> {
        self.check_href(&entry.raw_href, entry.is_directory)?;

        if !entry.is_directory && looks_dynamic(&entry.url) {
            return Err(Rejection::DynamicContent);
        }
        Ok(())
    }

    fn check_href(&self, raw_href: &str, is_directory: bool) -> Result<(), Rejection> {
        if has_parent_segment(raw_href) {
            return Err(Rejection::ParentTraversal);
        }

        if is_absolute(raw_href) {
            let inside = self
                .root
                .join(raw_href)
                .is_ok_and(|url| self.contains(&url));
            if !inside {
                return Err(Rejection::OffSite);
            }
        }

        if let (Some(allowed), false) = (&self.allowed_extensions, is_directory) {
            let permitted = extension_of(raw_href).is_some_and(|ext| allowed.contains(&ext));
            if !permitted {
                return Err(Rejection::DisallowedExtension);
            }
        }

        Ok(())
    }
}

fn has_parent_segment(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    let decoded = urlencoding::decode(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string());

    decoded.split(['/', '\\']).any(|segment| segment == "..")
}

// "/x", "//host/x" and "scheme://host/x" all name their own location
fn is_absolute(href: &str) -> bool {
    href.starts_with('/') || Url::parse(href).is_ok()
}

fn looks_dynamic(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();

    let dynamic = url.query().is_some() || DYNAMIC_MARKERS.iter().any(|m| path.contains(m));
    dynamic && !STATIC_DOCUMENTS.iter().any(|ext| path.contains(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Url {
        Url::parse("http://files.example.com/pub/").unwrap()
    }

    fn entry(href: &str) -> Entry {
        Entry::from_href(&root(), href, href).unwrap()
    }

    #[test]
    fn test_parent_segments_rejected() {
        let filter = SafetyFilter::new(root(), &[]);
        assert!(!filter.is_safe("../etc/passwd"));
        assert!(!filter.is_safe("a/../../b.txt"));
        assert!(!filter.is_safe("a/%2e%2e/b.txt"));
        assert!(filter.is_safe("notes..txt"));
    }

    #[test]
    fn test_absolute_hrefs_must_stay_under_root() {
        let filter = SafetyFilter::new(root(), &[]);
        assert!(filter.is_safe("/pub/sub/"));
        assert!(filter.is_safe("http://files.example.com/pub/a.txt"));
        assert!(!filter.is_safe("/private/a.txt"));
        assert!(!filter.is_safe("http://evil.example.net/pub/a.txt"));
        assert!(!filter.is_safe("//evil.example.net/pub/a.txt"));
        // Another scheme or port is another site
        assert!(!filter.is_safe("https://files.example.com/pub/a.txt"));
        assert!(!filter.is_safe("http://files.example.com:8080/pub/a.txt"));
        // An explicit default port is the same site
        assert!(filter.is_safe("http://files.example.com:80/pub/a.txt"));
    }

    #[test]
    fn test_contains_checks_site_and_root_path() {
        let filter = SafetyFilter::new(root(), &[]);
        let url = |s: &str| Url::parse(s).unwrap();
        assert!(filter.contains(&url("http://files.example.com/pub/")));
        assert!(filter.contains(&url("http://files.example.com/pub/deep/er/")));
        assert!(!filter.contains(&url("http://files.example.com/")));
        assert!(!filter.contains(&url("http://files.example.com/public/")));
        assert!(!filter.contains(&url("http://files.example.com:81/pub/")));
        assert!(!filter.contains(&url("http://mirror.example.com/pub/")));
    }

    #[test]
    fn test_extension_allow_list() {
        let filter = SafetyFilter::new(root(), &["pdf".to_string(), ".TXT".to_string()]);
        assert_eq!(filter.check(&entry("image.png")), Err(Rejection::DisallowedExtension));
        assert_eq!(filter.check(&entry("report.PDF")), Ok(()));
        assert_eq!(filter.check(&entry("readme.txt")), Ok(()));
        assert_eq!(filter.check(&entry("README")), Err(Rejection::DisallowedExtension));
        // Directories are still crawled
        assert_eq!(filter.check(&entry("sub/")), Ok(()));
    }

    #[test]
    fn test_only_pdf_allowed_excludes_png() {
        let filter = SafetyFilter::new(root(), &["pdf".to_string()]);
        assert!(!filter.is_safe("image.png"));
        assert!(filter.is_safe("image.pdf"));
    }

    #[test]
    fn test_dynamic_content_skipped() {
        let filter = SafetyFilter::new(root(), &[]);
        assert_eq!(filter.check(&entry("index.php")), Err(Rejection::DynamicContent));
        assert_eq!(filter.check(&entry("view.asp")), Err(Rejection::DynamicContent));
        assert_eq!(filter.check(&entry("list?page=2")), Err(Rejection::DynamicContent));
        assert_eq!(filter.check(&entry("run.cgi")), Err(Rejection::DynamicContent));
    }

    #[test]
    fn test_dynamic_with_static_extension_allowed() {
        let filter = SafetyFilter::new(root(), &[]);
        assert_eq!(filter.check(&entry("guide.pdf?v=2")), Ok(()));
        assert_eq!(filter.check(&entry("a&b.txt")), Ok(()));
        assert_eq!(filter.check(&entry("data.tar.gz")), Ok(()));
    }

    #[test]
    fn test_empty_allow_list_entries_ignored() {
        let filter = SafetyFilter::new(root(), &[" ".to_string(), String::new()]);
        assert!(filter.is_safe("anything.bin"));
    }
}
