// src/state/mod.rs
// =============================================================================
// State that lives for exactly one run.
//
// - stats: counters and result logs behind a single lock
// - progress: the JSON progress document written at the end of a run
// - status: periodic status line while downloads are in flight
// - RunControl: the run-wide "active" flag used for cancellation
// =============================================================================

mod progress;
mod stats;
mod status;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use progress::{ProgressDocument, ProgressError};
pub use stats::{RunState, SharedState};
pub use status::{format_bytes, spawn_status_reporter};

/// Run-wide active flag. Cloning shares the same flag.
///
/// Once cancelled it stays cancelled: the crawler stops descending and
/// every worker exits after the item it is currently downloading.
#[derive(Debug, Clone)]
pub struct RunControl {
    active: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        RunControl {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        !self.is_active()
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let control = RunControl::new();
        let worker_view = control.clone();
        assert!(worker_view.is_active());

        control.cancel();
        assert!(worker_view.is_cancelled());
    }
}
