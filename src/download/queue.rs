// src/download/queue.rs
// =============================================================================
// The hand-off between discovery and download.
//
// One producer (the crawler) and N consumers (the workers) share a bounded
// tokio mpsc channel:
// - push waits while the queue is full, re-checking the run's active flag so
//   a cancelled run never leaves the crawler stuck on a full queue
// - pop waits at most `wait` for an item so workers can notice cancellation
// - dropping the producer closes the queue; consumers see Closed once the
//   remaining items have been taken
//
// Rust concepts:
// - Arc<Mutex<Receiver>>: mpsc receivers are single-owner, the mutex lets
//   several workers take turns receiving
// - AtomicUsize: a lock-free gauge for the status line
// =============================================================================

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::{mpsc, Mutex};

use crate::listing::Entry;
use crate::state::RunControl;

/// Creates a queue holding at most `capacity` pending entries.
///
/// `wait` bounds how long a single push or pop blocks before re-checking
/// the run state.
pub fn download_queue(capacity: usize, wait: Duration) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pending = QueueGauge::default();

    let producer = QueueProducer {
        tx,
        wait,
        pending: pending.clone(),
    };
    let consumer = QueueConsumer {
        rx: Arc::new(Mutex::new(rx)),
        wait,
        pending,
    };
    (producer, consumer)
}

/// Number of entries waiting in the queue.
#[derive(Debug, Clone, Default)]
pub struct QueueGauge(Arc<AtomicUsize>);

impl QueueGauge {
    pub fn len(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushError {
    /// The run was cancelled while waiting for room
    Cancelled,
    /// Every consumer is gone
    Closed,
}

#[derive(Debug)]
pub struct QueueProducer {
    tx: mpsc::Sender<Entry>,
    wait: Duration,
    pending: QueueGauge,
}

impl QueueProducer {
    pub async fn push(&self, entry: Entry, control: &RunControl) -> Result<(), PushError> {
        let mut entry = entry;
        // Count before sending so a fast consumer never drives the gauge below zero
        self.pending.0.fetch_add(1, Ordering::SeqCst);

        loop {
            if control.is_cancelled() {
                self.pending.0.fetch_sub(1, Ordering::SeqCst);
                return Err(PushError::Cancelled);
            }

            match self.tx.send_timeout(entry, self.wait).await {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => entry = returned,
                Err(SendTimeoutError::Closed(_)) => {
                    self.pending.0.fetch_sub(1, Ordering::SeqCst);
                    return Err(PushError::Closed);
                }
            }
        }
    }
}

/// Result of a single pop attempt.
#[derive(Debug)]
pub enum Pop {
    Item(Entry),
    /// Nothing arrived within the wait; the producer is still running
    Empty,
    /// The producer is done and the queue is drained
    Closed,
}

#[derive(Debug, Clone)]
pub struct QueueConsumer {
    rx: Arc<Mutex<mpsc::Receiver<Entry>>>,
    wait: Duration,
    pending: QueueGauge,
}

impl QueueConsumer {
    pub async fn pop(&self) -> Pop {
        let mut rx = self.rx.lock().await;

        match tokio::time::timeout(self.wait, rx.recv()).await {
            Ok(Some(entry)) => {
                self.pending.0.fetch_sub(1, Ordering::SeqCst);
                Pop::Item(entry)
            }
            Ok(None) => Pop::Closed,
            Err(_) => Pop::Empty,
        }
    }

    pub fn gauge(&self) -> QueueGauge {
        self.pending.clone()
    }
}
