// src/net/mod.rs
// =============================================================================
// Everything that talks to the target server directly.
//
// Submodules:
// - http: the shared client (timeouts, retries, TLS, headers)
// - robots: the robots.txt yes/no gate
// - probe: a pre-flight look at the root page
// =============================================================================

mod http;
mod probe;
mod robots;

pub use http::{FetchError, HttpClient, HttpSettings, RetryPolicy, DEFAULT_USER_AGENT};
pub use probe::{probe_listing, ProbeVerdict};
pub use robots::is_crawl_allowed;
