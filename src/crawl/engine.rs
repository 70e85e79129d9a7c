// src/crawl/engine.rs
// =============================================================================
// The crawl engine: walks the listing tree and feeds the download queue.
//
// How it works:
// 1. Start with the root URL on a stack at depth 0
// 2. Pop a URL; skip it if it is too deep or already visited
// 3. Mark it visited, fetch it and parse the listing
// 4. For every entry that passes the safety filter (after the polite delay):
//    - directories go onto the stack at depth + 1
//    - files go into the download queue
// 5. Repeat until the stack is empty or the run is cancelled
//
// Depth-first, but with an explicit stack instead of recursion, so a deep
// tree costs heap memory rather than call-stack frames. Subdirectories are
// pushed in reverse so they are visited in page order.
//
// Failures (network, HTTP status, unparseable pages) are counted and the
// crawl moves on. Only cancellation stops it early.
// =============================================================================

use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::safety::SafetyFilter;
use crate::download::{PushError, QueueProducer};
use crate::listing::{self, Entry};
use crate::net::HttpClient;
use crate::state::{RunControl, SharedState};

/// URLs already handed to the crawler during this run.
///
/// `insert` is the check and the insert in one step; it is the only way a
/// URL gets in, so each URL is crawled at most once.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: HashSet<String>,
    order: Vec<String>,
}

impl VisitedSet {
    /// Returns true if the URL was not visited before.
    pub fn insert(&mut self, url: &Url) -> bool {
        let key = url.as_str().to_string();
        if self.urls.insert(key.clone()) {
            self.order.push(key);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Visited URLs in the order they were first seen
    pub fn into_vec(self) -> Vec<String> {
        self.order
    }
}

#[derive(Debug, Clone)]
struct Frame {
    url: Url,
    depth: usize,
}

/// Result of a finished (or cancelled) crawl.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub visited: VisitedSet,
    pub cancelled: bool,
}

#[derive(Debug)]
pub struct CrawlEngine {
    client: HttpClient,
    filter: SafetyFilter,
    max_depth: usize,
    delay: Duration,
    state: SharedState,
    control: RunControl,
    visited: VisitedSet,
}

impl CrawlEngine {
    pub fn new(
        client: HttpClient,
        filter: SafetyFilter,
        max_depth: usize,
        delay: Duration,
        state: SharedState,
        control: RunControl,
    ) -> Self {
        CrawlEngine {
            client,
            filter,
            max_depth,
            delay,
            state,
            control,
            visited: VisitedSet::default(),
        }
    }

    /// Crawls from `root`, pushing every accepted file into `queue`.
    ///
    /// The queue producer is dropped on return, which tells the workers
    /// that no more files are coming.
    pub async fn run(mut self, root: Url, queue: QueueProducer) -> CrawlOutcome {
        let mut stack = vec![Frame {
            url: root,
            depth: 0,
        }];
        let mut cancelled = false;

        'crawl: while let Some(frame) = stack.pop() {
            if self.control.is_cancelled() {
                cancelled = true;
                break;
            }

            if frame.depth > self.max_depth {
                debug!(url = %frame.url, depth = frame.depth, "max depth reached");
                continue;
            }
            if !self.visited.insert(&frame.url) {
                continue;
            }

            let Some(entries) = self.discover(&frame).await else {
                continue;
            };

            let mut subdirectories = Vec::new();
            for entry in entries {
                if self.control.is_cancelled() {
                    cancelled = true;
                    break 'crawl;
                }

                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }

                if let Err(reason) = self.filter.check(&entry) {
                    debug!(url = %entry.url, %reason, "entry rejected");
                    continue;
                }

                if entry.is_directory {
                    subdirectories.push(Frame {
                        url: entry.url,
                        depth: frame.depth + 1,
                    });
                    continue;
                }

                match self.enqueue(&queue, entry).await {
                    Ok(()) => {}
                    Err(PushError::Cancelled) => {
                        cancelled = true;
                        break 'crawl;
                    }
                    Err(PushError::Closed) => {
                        warn!("download queue closed, stopping discovery");
                        break 'crawl;
                    }
                }
            }

            stack.extend(subdirectories.into_iter().rev());
        }

        info!(
            visited = self.visited.len(),
            files = self.state.snapshot().total_files_found,
            cancelled,
            "discovery finished"
        );

        CrawlOutcome {
            visited: self.visited,
            cancelled,
        }
    }

    // Fetches and parses one listing. None when the page could not be used.
    async fn discover(&mut self, frame: &Frame) -> Option<Vec<Entry>> {
        info!(url = %frame.url, depth = frame.depth, "crawling");

        let page = match self.client.get_page(&frame.url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %frame.url, error = %e, "failed to fetch listing");
                self.state.record_error();
                return None;
            }
        };

        // Links on a page resolve against where it was served from, so a
        // redirect out of the root would lead the crawl out with it
        if !self.filter.contains(&page.url) {
            warn!(from = %frame.url, to = %page.url, "redirected outside the crawl root, skipped");
            return None;
        }

        // A redirect can land on a listing that was already crawled
        if page.url != frame.url && !self.visited.insert(&page.url) {
            debug!(from = %frame.url, to = %page.url, "redirected to a visited listing");
            return None;
        }

        let mut entries = listing::parse(&page.url, &page.body, page.server.as_deref());
        if entries.is_empty() {
            debug!(
                url = %page.url,
                content_type = page.content_type.as_deref().unwrap_or("unknown"),
                bytes = page.body.len(),
                "no listing entries, trying extension detection"
            );
            entries = listing::sniff_file_links(&page.url, &page.body);

            if entries.is_empty() {
                info!(url = %page.url, "no downloadable content detected");
                return None;
            }
            info!(url = %page.url, files = entries.len(), "found files by extension");
        }

        self.state.add_discovered(entries.len());
        Some(entries)
    }

    async fn enqueue(&self, queue: &QueueProducer, entry: Entry) -> Result<(), PushError> {
        debug!(url = %entry.url, "queued for download");
        queue.push(entry, &self.control).await?;
        self.state.file_queued();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{download_queue, Pop, QueueConsumer};
    use crate::net::{HttpSettings, RetryPolicy};
    use crate::state::RunState;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(&HttpSettings {
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_retries: 0,
                backoff: Duration::ZERO,
            },
            ..HttpSettings::default()
        })
        .unwrap()
    }

    async fn listing(server: &MockServer, at: &str, links: &[&str]) {
        let body: String = links
            .iter()
            .map(|href| format!("<li><a href=\"{href}\">{href}</a></li>"))
            .collect();
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "text/html")
                    .set_body_string(format!(
                        "<title>Directory listing for {at}</title><ul>{body}</ul>"
                    )),
            )
            .mount(server)
            .await;
    }

    fn root(server: &MockServer) -> Url {
        Url::parse(&format!("{}/pub/", server.uri())).unwrap()
    }

    async fn crawl(
        server: &MockServer,
        max_depth: usize,
        extensions: &[String],
    ) -> (CrawlOutcome, Vec<String>, SharedState) {
        let state = RunState::new();
        let control = RunControl::new();
        let (producer, consumer) = download_queue(64, Duration::from_millis(10));
        let engine = CrawlEngine::new(
            client(),
            SafetyFilter::new(root(server), extensions),
            max_depth,
            Duration::ZERO,
            state.clone(),
            control,
        );

        let outcome = engine.run(root(server), producer).await;
        let queued = drain(&consumer).await;
        (outcome, queued, state)
    }

    async fn drain(consumer: &QueueConsumer) -> Vec<String> {
        let mut paths = Vec::new();
        while let Pop::Item(entry) = consumer.pop().await {
            paths.push(entry.url.path().to_string());
        }
        paths
    }

    #[tokio::test]
    async fn test_files_queued_and_directories_followed() {
        let server = MockServer::start().await;
        listing(&server, "/pub/", &["a.txt", "sub/"]).await;
        listing(&server, "/pub/sub/", &["b.txt"]).await;

        let (outcome, queued, state) = crawl(&server, 10, &[]).await;

        assert_eq!(queued, vec!["/pub/a.txt", "/pub/sub/b.txt"]);
        assert_eq!(outcome.visited.len(), 2);
        assert!(!outcome.cancelled);
        assert_eq!(state.snapshot().total_files_found, 2);
        assert_eq!(state.snapshot().urls_discovered, 3);
    }

    #[tokio::test]
    async fn test_directory_linked_twice_crawled_once() {
        let server = MockServer::start().await;
        listing(&server, "/pub/", &["a/", "b/"]).await;
        listing(&server, "/pub/a/", &["/pub/shared/"]).await;
        listing(&server, "/pub/b/", &["/pub/shared/"]).await;
        Mock::given(method("GET"))
            .and(path("/pub/shared/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<ul><li><a href=\"x.bin\">x.bin</a></li></ul>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (outcome, queued, _) = crawl(&server, 10, &[]).await;

        assert_eq!(queued, vec!["/pub/shared/x.bin"]);
        let visited = outcome.visited.into_vec();
        let shared = format!("{}/pub/shared/", server.uri());
        assert_eq!(visited.iter().filter(|u| **u == shared).count(), 1);
    }

    #[tokio::test]
    async fn test_depth_boundary() {
        let server = MockServer::start().await;
        listing(&server, "/pub/", &["one/"]).await;
        listing(&server, "/pub/one/", &["two/", "f1.txt"]).await;
        listing(&server, "/pub/one/two/", &["f2.txt"]).await;

        // Directory at exactly max_depth is crawled, one level deeper is not
        let (outcome, queued, _) = crawl(&server, 1, &[]).await;
        assert_eq!(queued, vec!["/pub/one/f1.txt"]);
        assert_eq!(outcome.visited.len(), 2);

        let (outcome, queued, _) = crawl(&server, 2, &[]).await;
        assert_eq!(queued, vec!["/pub/one/f1.txt", "/pub/one/two/f2.txt"]);
        assert_eq!(outcome.visited.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_subdirectory_does_not_stop_crawl() {
        let server = MockServer::start().await;
        listing(&server, "/pub/", &["broken/", "ok/"]).await;
        Mock::given(method("GET"))
            .and(path("/pub/broken/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        listing(&server, "/pub/ok/", &["fine.txt"]).await;

        let (_, queued, state) = crawl(&server, 10, &[]).await;

        assert_eq!(queued, vec!["/pub/ok/fine.txt"]);
        assert_eq!(state.snapshot().errors, 1);
    }

    #[tokio::test]
    async fn test_extension_filter_applies_before_queue() {
        let server = MockServer::start().await;
        listing(&server, "/pub/", &["image.png", "doc.pdf", "more/"]).await;
        listing(&server, "/pub/more/", &["other.pdf"]).await;

        let (_, queued, state) = crawl(&server, 10, &["pdf".to_string()]).await;

        assert_eq!(queued, vec!["/pub/doc.pdf", "/pub/more/other.pdf"]);
        assert_eq!(state.snapshot().total_files_found, 2);
    }

    #[tokio::test]
    async fn test_redirect_out_of_root_is_not_followed() {
        let server = MockServer::start().await;
        let elsewhere = MockServer::start().await;
        listing(&server, "/pub/", &["moved/", "a.txt"]).await;
        Mock::given(method("GET"))
            .and(path("/pub/moved/"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/elsewhere/", elsewhere.uri())),
            )
            .mount(&server)
            .await;
        listing(&elsewhere, "/elsewhere/", &["secret.bin", "deeper/"]).await;
        Mock::given(method("GET"))
            .and(path("/elsewhere/deeper/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&elsewhere)
            .await;

        let (outcome, queued, state) = crawl(&server, 10, &[]).await;

        assert_eq!(queued, vec!["/pub/a.txt"]);
        assert_eq!(state.snapshot().errors, 0);
        let visited = outcome.visited.into_vec();
        assert!(visited.iter().all(|u| !u.contains("/elsewhere/")));
    }

    #[tokio::test]
    async fn test_redirect_inside_root_is_followed() {
        let server = MockServer::start().await;
        listing(&server, "/pub/", &["old/"]).await;
        Mock::given(method("GET"))
            .and(path("/pub/old/"))
            .respond_with(
                ResponseTemplate::new(301)
                    .insert_header("Location", format!("{}/pub/new/", server.uri())),
            )
            .mount(&server)
            .await;
        listing(&server, "/pub/new/", &["c.txt"]).await;

        let (outcome, queued, _) = crawl(&server, 10, &[]).await;

        assert_eq!(queued, vec!["/pub/new/c.txt"]);
        assert_eq!(outcome.visited.len(), 3);
    }

    #[tokio::test]
    async fn test_page_with_only_absolute_links_yields_nothing() {
        let server = MockServer::start().await;
        // Absolute hrefs are rejected by every strategy, extension sniffing included
        let body = format!(
            "<div><a href=\"{0}/pub/file.zip\">zip</a><a href=\"{0}/pub/about\">about</a></div>",
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/pub/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let (outcome, queued, state) = crawl(&server, 10, &[]).await;
        assert!(queued.is_empty());
        assert_eq!(outcome.visited.len(), 1);
        assert_eq!(state.snapshot().urls_discovered, 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let server = MockServer::start().await;
        listing(&server, "/pub/", &["a.txt"]).await;

        let state = RunState::new();
        let control = RunControl::new();
        control.cancel();
        let (producer, _consumer) = download_queue(8, Duration::from_millis(10));
        let engine = CrawlEngine::new(
            client(),
            SafetyFilter::new(root(&server), &[]),
            10,
            Duration::ZERO,
            state,
            control,
        );

        let outcome = engine.run(root(&server), producer).await;
        assert!(outcome.cancelled);
        assert_eq!(outcome.visited.len(), 0);
    }

    #[test]
    fn test_visited_set_insert_once() {
        let mut visited = VisitedSet::default();
        let url = Url::parse("http://h.example.com/a/").unwrap();
        assert!(visited.insert(&url));
        assert!(!visited.insert(&url));
        assert_eq!(visited.into_vec(), vec!["http://h.example.com/a/".to_string()]);
    }
}
