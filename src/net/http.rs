// src/net/http.rs
// =============================================================================
// The HTTP client every other module talks through.
//
// Key functionality:
// - One shared reqwest::Client (connection pooling, redirects, TLS options)
// - Browser-like default headers and a configurable User-Agent
// - Per-request timeouts (downloads get twice the page timeout)
// - A retry policy for 429/500/502/503/504 and for connect/timeout failures,
//   with exponential backoff between attempts
// - Non-2xx responses become errors, so callers only see usable responses
// =============================================================================

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_RANGE, RANGE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Status codes that are worth another attempt
pub const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                                      (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("timeout fetching {url}")]
    Timeout { url: String },

    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn from_reqwest(url: &Url, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                source: error,
            }
        }
    }

    pub fn body(url: &Url, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Body {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

/// How many times to retry and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Wait before the first retry; doubled for every retry after that
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }

    fn should_retry(&self, attempt: &Attempt) -> bool {
        match attempt {
            Attempt::Done(response) => RETRY_STATUSES.contains(&response.status().as_u16()),
            Attempt::Failed(error) => error.is_timeout() || error.is_connect(),
            Attempt::TimedOut => true,
        }
    }
}

// One try of a request, before the retry policy looks at it
#[derive(Debug)]
enum Attempt {
    Done(Response),
    Failed(reqwest::Error),
    TimedOut,
}

impl From<Result<Response, reqwest::Error>> for Attempt {
    fn from(result: Result<Response, reqwest::Error>) -> Self {
        match result {
            Ok(response) => Attempt::Done(response),
            Err(error) => Attempt::Failed(error),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout: Duration,
    pub verify_tls: bool,
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            verify_tls: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// A fetched HTML page.
#[derive(Debug, Clone)]
pub struct Page {
    /// Final URL after redirects; relative links resolve against this
    pub url: Url,
    pub server: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

/// What a HEAD (or one-byte GET) tells us about a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    pub size: Option<u64>,
    pub content_type: Option<String>,
    pub last_modified: Option<String>,
}

/// Cheap to clone: reqwest::Client is reference counted internally.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    timeout: Duration,
    retry: RetryPolicy,
    user_agent: String,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));

        let inner = Client::builder()
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .danger_accept_invalid_certs(!settings.verify_tls)
            .connect_timeout(settings.timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(HttpClient {
            inner,
            timeout: settings.timeout,
            retry: settings.retry,
            user_agent: settings.user_agent.clone(),
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Longest a file download may go without receiving a byte.
    pub fn read_timeout(&self) -> Duration {
        self.timeout
    }

    /// HEAD request; the response carries status and headers only.
    pub async fn head(&self, url: &Url) -> Result<Response, FetchError> {
        self.send(url, None, || self.inner.head(url.clone()).timeout(self.timeout))
            .await
    }

    /// GET a page and read the whole body as text.
    pub async fn get_page(&self, url: &Url) -> Result<Page, FetchError> {
        let response = self
            .send(url, None, || self.inner.get(url.clone()).timeout(self.timeout))
            .await?;

        let final_url = response.url().clone();
        let server = header_string(&response, reqwest::header::SERVER);
        let content_type = header_string(&response, reqwest::header::CONTENT_TYPE);
        let body = response.text().await.map_err(|e| FetchError::body(url, e))?;

        Ok(Page {
            url: final_url,
            server,
            content_type,
            body,
        })
    }

    /// GET a file for streaming. The caller reads the body chunk by chunk.
    ///
    /// Only the wait for the response headers is bounded here. A large body
    /// may take any amount of time; the caller bounds each read with
    /// [`HttpClient::read_timeout`].
    pub async fn get_file(&self, url: &Url) -> Result<Response, FetchError> {
        let headers_within = self.timeout.saturating_mul(2);
        self.send(url, Some(headers_within), || self.inner.get(url.clone()))
            .await
    }

    /// Size and type of a file without downloading it.
    ///
    /// Tries HEAD first, then a one-byte ranged GET for servers that refuse
    /// HEAD. Returns None when neither works.
    pub async fn file_info(&self, url: &Url) -> Option<FileInfo> {
        if let Ok(response) = self.head(url).await {
            if response.status() == StatusCode::OK {
                return Some(FileInfo {
                    size: response.content_length(),
                    content_type: header_string(&response, reqwest::header::CONTENT_TYPE),
                    last_modified: header_string(&response, reqwest::header::LAST_MODIFIED),
                });
            }
        }

        let response = self
            .send(url, None, || {
                self.inner
                    .get(url.clone())
                    .header(RANGE, "bytes=0-0")
                    .timeout(self.timeout)
            })
            .await
            .ok()?;

        let size = if response.status() == StatusCode::PARTIAL_CONTENT {
            header_string(&response, CONTENT_RANGE).and_then(|range| total_from_content_range(&range))
        } else {
            response.content_length()
        };

        Some(FileInfo {
            size,
            content_type: header_string(&response, reqwest::header::CONTENT_TYPE),
            last_modified: header_string(&response, reqwest::header::LAST_MODIFIED),
        })
    }

    // Sends the request built by `build`, retrying per the policy.
    // `headers_within` bounds each try up to the response headers only.
    // Only 2xx responses are returned as Ok.
    async fn send(
        &self,
        url: &Url,
        headers_within: Option<Duration>,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response, FetchError> {
        let mut tries = 0;

        loop {
            let attempt = match headers_within {
                Some(limit) => match tokio::time::timeout(limit, build().send()).await {
                    Ok(result) => Attempt::from(result),
                    Err(_) => Attempt::TimedOut,
                },
                None => Attempt::from(build().send().await),
            };

            if tries < self.retry.max_retries && self.retry.should_retry(&attempt) {
                tries += 1;
                let wait = self.retry.delay_for(tries);
                debug!(url = %url, attempt = tries, wait_ms = wait.as_millis() as u64, "retrying request");
                tokio::time::sleep(wait).await;
                continue;
            }

            let response = match attempt {
                Attempt::Done(response) => response,
                Attempt::Failed(error) => return Err(FetchError::from_reqwest(url, error)),
                Attempt::TimedOut => {
                    return Err(FetchError::Timeout {
                        url: url.to_string(),
                    })
                }
            };
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            return Ok(response);
        }
    }
}

fn header_string(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

// "bytes 0-0/12345" -> 12345
fn total_from_content_range(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}
