// src/state/progress.rs
// =============================================================================
// The progress file written at the end of every run (normal or cancelled).
//
// Layout of <output_dir>/download_progress.json:
// {
//   "base_url": "...",
//   "statistics": { "start_time", "end_time", "duration", counters... },
//   "downloaded_files": [ { url, local_path, size, timestamp } ],
//   "failed_downloads": [ { url, error, timestamp } ],
//   "visited_urls": [ "..." ]
// }
// =============================================================================

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::stats::{DownloadRecord, FailureRecord, RunState, RunStatistics};

pub const PROGRESS_FILE: &str = "download_progress.json";

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("failed to write progress file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode progress document: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Aggregated statistics block with timing information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsBlock {
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    /// "H:MM:SS"
    pub duration: String,
    pub duration_seconds: f64,
    #[serde(flatten)]
    pub counters: RunStatistics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressDocument {
    pub base_url: String,
    pub statistics: StatisticsBlock,
    pub downloaded_files: Vec<DownloadRecord>,
    pub failed_downloads: Vec<FailureRecord>,
    pub visited_urls: Vec<String>,
}

impl ProgressDocument {
    /// Captures the run state as of now.
    pub fn capture(base_url: &str, state: &RunState, visited_urls: Vec<String>) -> Self {
        let elapsed = state.elapsed();

        ProgressDocument {
            base_url: base_url.to_string(),
            statistics: StatisticsBlock {
                start_time: state.started_at(),
                end_time: Local::now(),
                duration: format_duration(elapsed),
                duration_seconds: elapsed.as_secs_f64(),
                counters: state.snapshot(),
            },
            downloaded_files: state.downloaded(),
            failed_downloads: state.failed(),
            visited_urls,
        }
    }

    /// Writes the document into `output_dir` and returns the file path.
    pub fn write(&self, output_dir: &Path) -> Result<PathBuf, ProgressError> {
        let path = output_dir.join(PROGRESS_FILE);
        let json = serde_json::to_string_pretty(self)?;

        std::fs::create_dir_all(output_dir).map_err(|source| ProgressError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| ProgressError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }
}

/// Formats a duration as "H:MM:SS".
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}
