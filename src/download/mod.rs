// src/download/mod.rs
// =============================================================================
// Download side of the pipeline.
//
// Submodules:
// - queue: bounded hand-off between the crawler and the workers
// - paths: URL -> local file path mapping
// - worker: the pool of tasks that fetch files and write them to disk
// =============================================================================

mod paths;
mod queue;
mod worker;

pub use paths::local_path;
pub use queue::{download_queue, Pop, PushError, QueueConsumer, QueueGauge, QueueProducer};
pub use worker::{join_all, WorkerPool};
