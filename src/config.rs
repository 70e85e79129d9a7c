// src/config.rs
// =============================================================================
// Validated run configuration.
//
// The CLI hands us raw strings and numbers; everything downstream gets a
// RunConfig that has already been checked:
// - the root URL parses and is http or https
// - the root URL ends in '/' when it names a directory
// - at least one worker
// - delay and timeout are usable durations
// - the extension allow-list is normalised ("PDF, .txt" -> ["pdf", "txt"])
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::cli::Cli;
use crate::net::{HttpSettings, RetryPolicy, DEFAULT_USER_AGENT};

pub const QUEUE_CAPACITY: usize = 1000;
pub const QUEUE_WAIT: Duration = Duration::from_secs(1);
pub const STATUS_INTERVAL: Duration = Duration::from_secs(5);
/// Concurrent size lookups during a dry run
pub const DRY_RUN_LOOKUPS: usize = 10;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme '{0}' (only http and https are supported)")]
    UnsupportedScheme(String),

    #[error("worker count must be at least 1")]
    InvalidWorkers,

    #[error("invalid {name}: {value} (must be a finite, non-negative number)")]
    InvalidDuration { name: &'static str, value: String },

    #[error("robots.txt disallows crawling {0}")]
    RobotsDisallowed(String),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub base_url: Url,
    pub output_dir: PathBuf,
    pub max_depth: usize,
    pub workers: usize,
    pub delay: Duration,
    pub verify_tls: bool,
    pub user_agent: String,
    pub timeout: Duration,
    pub allowed_extensions: Vec<String>,
    pub ignore_robots: bool,
    pub dry_run: bool,
    pub json: bool,
    pub retry: RetryPolicy,
    pub queue_capacity: usize,
    pub queue_wait: Duration,
    pub status_interval: Duration,
}

impl RunConfig {
    /// Builds a config with defaults for everything but the root URL.
    pub fn new(base_url: &str) -> Result<Self, StartupError> {
        Ok(RunConfig {
            base_url: parse_root(base_url)?,
            output_dir: PathBuf::from("downloads"),
            max_depth: 10,
            workers: 5,
            delay: Duration::from_secs(1),
            verify_tls: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            allowed_extensions: Vec::new(),
            ignore_robots: false,
            dry_run: false,
            json: false,
            retry: RetryPolicy::default(),
            queue_capacity: QUEUE_CAPACITY,
            queue_wait: QUEUE_WAIT,
            status_interval: STATUS_INTERVAL,
        })
    }

    pub fn from_cli(cli: &Cli) -> Result<Self, StartupError> {
        if cli.workers == 0 {
            return Err(StartupError::InvalidWorkers);
        }
        // Rejects negative, NaN, infinite and too-large values alike
        let delay =
            Duration::try_from_secs_f64(cli.delay).map_err(|_| StartupError::InvalidDuration {
                name: "delay",
                value: cli.delay.to_string(),
            })?;
        if cli.timeout == 0 {
            return Err(StartupError::InvalidDuration {
                name: "timeout",
                value: cli.timeout.to_string(),
            });
        }

        let defaults = RunConfig::new(&cli.url)?;
        Ok(RunConfig {
            output_dir: PathBuf::from(&cli.output),
            max_depth: cli.max_depth,
            workers: cli.workers,
            delay,
            verify_tls: !cli.no_verify_ssl,
            user_agent: cli
                .user_agent
                .clone()
                .filter(|ua| !ua.trim().is_empty())
                .unwrap_or(defaults.user_agent.clone()),
            timeout: Duration::from_secs(cli.timeout),
            allowed_extensions: cli.extensions.as_deref().map(parse_extensions).unwrap_or_default(),
            ignore_robots: cli.ignore_robots,
            dry_run: cli.dry_run,
            json: cli.json,
            ..defaults
        })
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            user_agent: self.user_agent.clone(),
            timeout: self.timeout,
            verify_tls: self.verify_tls,
            retry: self.retry,
        }
    }
}

/// "PDF, .txt,,zip" -> ["pdf", "txt", "zip"]
pub fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn parse_root(raw: &str) -> Result<Url, StartupError> {
    let url = Url::parse(raw.trim()).map_err(|source| StartupError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;

    match url.scheme() {
        "http" | "https" => Ok(normalize_root(url)),
        other => Err(StartupError::UnsupportedScheme(other.to_string())),
    }
}

/// Adds the trailing '/' a directory URL needs for relative hrefs to
/// resolve inside it. A last segment with a '.' is taken to be a file.
pub fn normalize_root(mut url: Url) -> Url {
    let path = url.path();
    let last = path.rsplit('/').next().unwrap_or("");
    if !path.ends_with('/') && !last.contains('.') {
        let with_slash = format!("{path}/");
        url.set_path(&with_slash);
    }
    url
}
