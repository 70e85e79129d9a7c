// src/state/status.rs
// =============================================================================
// Periodic one-line status while a run is in progress.
//
// Every interval the reporter:
// 1. Samples the byte counter to refresh the current download speed
// 2. Logs files done/found, bytes, speed, errors and the queue length
//
// It stops on its own once the run is cancelled; otherwise the runner
// aborts it after the last worker has finished.
// =============================================================================

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use super::{RunControl, SharedState};
use crate::download::QueueGauge;

/// Logs progress every `interval` and keeps `current_speed` up to date.
///
/// The task runs until the run is cancelled or the handle is aborted.
pub fn spawn_status_reporter(
    state: SharedState,
    control: RunControl,
    queue: QueueGauge,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        while control.is_active() {
            ticker.tick().await;

            let speed = state.update_speed();
            let stats = state.snapshot();
            info!(
                files = %format!("{}/{}", stats.files_downloaded, stats.total_files_found),
                size = %format_bytes(stats.bytes_downloaded as f64),
                speed = %format!("{}/s", format_bytes(speed)),
                errors = stats.errors,
                queue = queue.len(),
                "status"
            );
        }
    })
}

/// Human-readable byte count: "512.0 B", "1.5 KB", ... "2.0 TB".
pub fn format_bytes(bytes: f64) -> String {
    let mut size = bytes;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.1} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1} TB")
}
