// src/listing/detect.rs
// =============================================================================
// Guesses which web server generated a directory listing.
//
// Every server formats its auto-index differently:
// - Apache: "Index of /path" with a <table> (or <pre> with FancyIndexing off)
// - nginx: "Index of /path" with links inside a single <pre>
// - IIS: a <pre> of lines like "01/02/2024  10:00 AM  <dir> name"
// - Python http.server: "Directory listing for /path" with a <ul>
//
// We look at the Server header first, then at fingerprints in the page
// content. The result is only a hint: the parser still falls back to
// generic strategies when the specialised one finds nothing.
// =============================================================================

use std::fmt;

/// The server families we have a dedicated extraction routine for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerType {
    Apache,
    Nginx,
    Iis,
    PythonSimple,
    Unknown,
}

impl ServerType {
    /// Order in which candidates are tried, regardless of how they were found.
    pub const PRIORITY: [ServerType; 4] = [
        ServerType::Apache,
        ServerType::Nginx,
        ServerType::Iis,
        ServerType::PythonSimple,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ServerType::Apache => "apache",
            ServerType::Nginx => "nginx",
            ServerType::Iis => "iis",
            ServerType::PythonSimple => "python-simple-server",
            ServerType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Server header: first matching keyword wins
fn from_server_header(header: &str) -> Option<ServerType> {
    let header = header.to_ascii_lowercase();

    if header.contains("apache") {
        Some(ServerType::Apache)
    } else if header.contains("nginx") {
        Some(ServerType::Nginx)
    } else if header.contains("iis") || header.contains("microsoft") {
        Some(ServerType::Iis)
    } else if header.contains("python") {
        Some(ServerType::PythonSimple)
    } else {
        None
    }
}

// Page content: first matching fingerprint wins
fn from_content(content: &str) -> Option<ServerType> {
    let content = content.to_ascii_lowercase();

    if content.contains("index of") && content.contains("apache") {
        Some(ServerType::Apache)
    } else if content.contains("directory listing for") {
        Some(ServerType::PythonSimple)
    } else if content.contains("<h1>index of") || content.contains("autoindex") {
        Some(ServerType::Nginx)
    } else if content.contains("<title>[to parent directory]</title>")
        || content.contains("&lt;dir&gt;")
    {
        Some(ServerType::Iis)
    } else {
        None
    }
}

/// Returns the candidate server types for a page, in priority order.
///
/// Never empty: `[Unknown]` when no fingerprint matched.
pub fn detect(server_header: Option<&str>, content: &str) -> Vec<ServerType> {
    let found: Vec<ServerType> = server_header
        .and_then(from_server_header)
        .into_iter()
        .chain(from_content(content))
        .collect();

    let candidates: Vec<ServerType> = ServerType::PRIORITY
        .iter()
        .copied()
        .filter(|kind| found.contains(kind))
        .collect();

    if candidates.is_empty() {
        vec![ServerType::Unknown]
    } else {
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_detection() {
        assert_eq!(detect(Some("Apache/2.4.41 (Ubuntu)"), ""), vec![ServerType::Apache]);
        assert_eq!(detect(Some("nginx/1.18.0"), ""), vec![ServerType::Nginx]);
        assert_eq!(detect(Some("Microsoft-IIS/10.0"), ""), vec![ServerType::Iis]);
        assert_eq!(detect(Some("SimpleHTTP/0.6 Python/3.11.4"), ""), vec![ServerType::PythonSimple]);
    }

    #[test]
    fn test_content_detection() {
        let apache = "<title>Index of /pub</title><address>Apache Server</address>";
        assert_eq!(detect(None, apache), vec![ServerType::Apache]);

        let python = "<title>Directory listing for /</title>";
        assert_eq!(detect(None, python), vec![ServerType::PythonSimple]);

        let nginx = "<html><body><h1>Index of /pub/</h1><pre></pre>";
        assert_eq!(detect(None, nginx), vec![ServerType::Nginx]);

        let iis = "<title>[To Parent Directory]</title>";
        assert_eq!(detect(None, iis), vec![ServerType::Iis]);

        let iis_dir = "<pre> 1/02/2024 10:00 AM &lt;dir&gt; <a href=\"x/\">x</a></pre>";
        assert_eq!(detect(None, iis_dir), vec![ServerType::Iis]);
    }

    #[test]
    fn test_unknown_when_nothing_matches() {
        assert_eq!(detect(None, "<p>hello</p>"), vec![ServerType::Unknown]);
        assert_eq!(detect(Some("lighttpd/1.4"), "<p>hello</p>"), vec![ServerType::Unknown]);
    }

    #[test]
    fn test_candidates_deduplicated_and_in_priority_order() {
        // Header says nginx, content says apache: apache is still tried first
        let content = "<h1>Index of /</h1> Apache";
        assert_eq!(
            detect(Some("nginx"), content),
            vec![ServerType::Apache, ServerType::Nginx]
        );

        let both_apache = "Index of / Apache";
        assert_eq!(detect(Some("Apache"), both_apache), vec![ServerType::Apache]);
    }
}
