// src/state/stats.rs
// =============================================================================
// Run statistics and result logs, shared by the crawler and the workers.
//
// Everything that more than one task mutates lives behind ONE mutex:
// - the counters (files found, downloaded, bytes, errors, ...)
// - the download log (one record per file written)
// - the failure log (one record per file that could not be fetched)
//
// Critical sections are tiny (a few additions or a Vec push) and never
// contain an .await, so a std::sync::Mutex is the right tool here.
// =============================================================================

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use url::Url;

/// Counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub urls_discovered: u64,
    pub files_downloaded: u64,
    /// Files already present on disk (also counted in files_downloaded)
    pub files_skipped: u64,
    pub bytes_downloaded: u64,
    pub errors: u64,
    pub total_files_found: u64,
    /// Bytes per second over the last status interval
    #[serde(rename = "download_speed")]
    pub current_speed: f64,
}

/// A file that was written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub url: String,
    pub local_path: String,
    pub size: u64,
    pub timestamp: DateTime<Local>,
}

/// A file that could not be downloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,
    pub error: String,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug)]
struct Ledger {
    stats: RunStatistics,
    downloaded: Vec<DownloadRecord>,
    failed: Vec<FailureRecord>,
    // (when, bytes_downloaded at that moment) for the speed calculation
    last_sample: (Instant, u64),
}

/// Lock-guarded state for one run. Create one per run and share it via Arc.
#[derive(Debug)]
pub struct RunState {
    started_at: DateTime<Local>,
    started: Instant,
    ledger: Mutex<Ledger>,
}

pub type SharedState = Arc<RunState>;

impl RunState {
    pub fn new() -> SharedState {
        let now = Instant::now();
        Arc::new(RunState {
            started_at: Local::now(),
            started: now,
            ledger: Mutex::new(Ledger {
                stats: RunStatistics::default(),
                downloaded: Vec::new(),
                failed: Vec::new(),
                last_sample: (now, 0),
            }),
        })
    }

    // A panic in another task must not take the statistics down with it:
    // the counters are still consistent, each update is a single step
    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn add_discovered(&self, count: usize) {
        self.ledger().stats.urls_discovered += count as u64;
    }

    pub fn file_queued(&self) {
        self.ledger().stats.total_files_found += 1;
    }

    /// A crawl-side failure (page fetch). Downloads use `record_failure`.
    pub fn record_error(&self) {
        self.ledger().stats.errors += 1;
    }

    pub fn record_download(&self, url: &Url, local_path: &Path, size: u64) {
        let mut ledger = self.ledger();
        ledger.stats.files_downloaded += 1;
        ledger.stats.bytes_downloaded += size;
        ledger.downloaded.push(DownloadRecord {
            url: url.to_string(),
            local_path: local_path.display().to_string(),
            size,
            timestamp: Local::now(),
        });
    }

    pub fn record_skip(&self) {
        let mut ledger = self.ledger();
        ledger.stats.files_downloaded += 1;
        ledger.stats.files_skipped += 1;
    }

    pub fn record_failure(&self, url: &Url, error: impl ToString) {
        let mut ledger = self.ledger();
        ledger.stats.errors += 1;
        ledger.failed.push(FailureRecord {
            url: url.to_string(),
            error: error.to_string(),
            timestamp: Local::now(),
        });
    }

    /// Recomputes `current_speed` from the bytes written since the last call.
    pub fn update_speed(&self) -> f64 {
        let mut ledger = self.ledger();
        let (then, bytes_then) = ledger.last_sample;
        let elapsed = then.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let bytes_now = ledger.stats.bytes_downloaded;
            ledger.stats.current_speed = bytes_now.saturating_sub(bytes_then) as f64 / elapsed;
            ledger.last_sample = (Instant::now(), bytes_now);
        }
        ledger.stats.current_speed
    }

    pub fn snapshot(&self) -> RunStatistics {
        self.ledger().stats.clone()
    }

    pub fn downloaded(&self) -> Vec<DownloadRecord> {
        self.ledger().downloaded.clone()
    }

    pub fn failed(&self) -> Vec<FailureRecord> {
        self.ledger().failed.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn url(path: &str) -> Url {
        Url::parse("http://files.example.com/").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_download_and_skip_both_count_as_downloaded() {
        let state = RunState::new();
        state.record_download(&url("a.txt"), &PathBuf::from("out/a.txt"), 10);
        state.record_skip();

        let stats = state.snapshot();
        assert_eq!(stats.files_downloaded, 2);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.bytes_downloaded, 10);
        assert_eq!(state.downloaded().len(), 1);
        assert_eq!(state.downloaded()[0].local_path, "out/a.txt");
    }

    #[test]
    fn test_failure_is_logged_and_counted() {
        let state = RunState::new();
        state.record_failure(&url("b.txt"), "HTTP 404");
        state.record_error();

        assert_eq!(state.snapshot().errors, 2);
        let failed = state.failed();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error, "HTTP 404");
        assert_eq!(failed[0].url, "http://files.example.com/b.txt");
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let state = RunState::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let state = Arc::clone(&state);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        state.file_queued();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(state.snapshot().total_files_found, 8000);
    }

    #[test]
    fn test_speed_tracks_new_bytes() {
        let state = RunState::new();
        std::thread::sleep(Duration::from_millis(20));
        state.record_download(&url("c.bin"), &PathBuf::from("c.bin"), 4096);

        let speed = state.update_speed();
        assert!(speed > 0.0);
        assert_eq!(state.snapshot().current_speed, speed);
    }

    #[test]
    fn test_statistics_json_uses_download_speed_key() {
        let json = serde_json::to_value(RunStatistics::default()).unwrap();
        assert!(json.get("download_speed").is_some());
        assert!(json.get("current_speed").is_none());
    }
}
