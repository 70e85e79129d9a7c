// src/download/worker.rs
// =============================================================================
// The download worker pool.
//
// A fixed number of tokio tasks drain the download queue. For each entry a
// worker:
// 1. Maps the URL onto a path under the output directory
// 2. Skips the fetch if that file already exists (re-runs are idempotent)
// 3. Otherwise streams the body into "<file>.part" and renames it into place
// 4. Records the result (download or failure) in the shared run state
//
// A failed file never stops the pool. Workers exit when the queue is closed
// and drained, or right after their current item once the run is cancelled.
// =============================================================================

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use super::paths::{local_path, partial_path};
use super::queue::{Pop, QueueConsumer};
use crate::listing::Entry;
use crate::net::{FetchError, HttpClient};
use crate::state::{RunControl, SharedState};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("IO error writing to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        DownloadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Downloaded {
    /// Written to disk; size in bytes
    Fetched(u64),
    /// Already on disk, nothing fetched
    Skipped,
}

/// Shared by every worker task in the pool
#[derive(Debug)]
struct WorkerContext {
    client: HttpClient,
    output_dir: PathBuf,
    state: SharedState,
    control: RunControl,
}

#[derive(Debug)]
pub struct WorkerPool {
    context: Arc<WorkerContext>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(
        client: HttpClient,
        output_dir: PathBuf,
        state: SharedState,
        control: RunControl,
        workers: usize,
    ) -> Self {
        WorkerPool {
            context: Arc::new(WorkerContext {
                client,
                output_dir,
                state,
                control,
            }),
            workers: workers.max(1),
        }
    }

    /// Starts the workers. Await `join_all` on the returned set to wait for them.
    pub fn spawn(self, queue: QueueConsumer) -> JoinSet<()> {
        let mut set = JoinSet::new();
        for id in 0..self.workers {
            let context = Arc::clone(&self.context);
            let queue = queue.clone();
            set.spawn(async move { worker_loop(id, context, queue).await });
        }
        set
    }
}

/// Waits for every task in the set, logging any that panicked.
pub async fn join_all(mut set: JoinSet<()>) {
    while let Some(result) = set.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "download worker ended abnormally");
        }
    }
}

async fn worker_loop(id: usize, context: Arc<WorkerContext>, queue: QueueConsumer) {
    debug!(worker = id, "worker started");

    loop {
        if context.control.is_cancelled() {
            debug!(worker = id, "worker stopping: run cancelled");
            break;
        }

        match queue.pop().await {
            Pop::Item(entry) => process(&context, &entry).await,
            Pop::Empty => continue,
            Pop::Closed => break,
        }
    }

    debug!(worker = id, "worker finished");
}

async fn process(context: &WorkerContext, entry: &Entry) {
    let path = local_path(&context.output_dir, &entry.url);

    match download_file(&context.client, &entry.url, &path).await {
        Ok(Downloaded::Fetched(size)) => {
            info!(url = %entry.url, path = %path.display(), size, "downloaded");
            context.state.record_download(&entry.url, &path, size);
        }
        Ok(Downloaded::Skipped) => {
            debug!(path = %path.display(), "already on disk, skipped");
            context.state.record_skip();
        }
        Err(e) => {
            warn!(url = %entry.url, error = %e, "download failed");
            context.state.record_failure(&entry.url, &e);
        }
    }
}

/// Downloads `url` to `path` unless the file is already there.
pub async fn download_file(
    client: &HttpClient,
    url: &Url,
    path: &Path,
) -> Result<Downloaded, DownloadError> {
    if tokio::fs::metadata(path).await.is_ok() {
        return Ok(Downloaded::Skipped);
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::io(parent, e))?;
    }

    let partial = partial_path(path);
    match stream_to(client, url, &partial).await {
        Ok(size) => {
            tokio::fs::rename(&partial, path)
                .await
                .map_err(|e| DownloadError::io(path, e))?;
            Ok(Downloaded::Fetched(size))
        }
        Err(e) => {
            // Nothing useful in a half-written file; it may not exist at all
            let _ = tokio::fs::remove_file(&partial).await;
            Err(e)
        }
    }
}

async fn stream_to(client: &HttpClient, url: &Url, path: &Path) -> Result<u64, DownloadError> {
    let response = client.get_file(url).await?;

    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    // A slow body is fine as long as bytes keep arriving
    let read_timeout = client.read_timeout();
    let mut written = 0u64;
    let mut body = response.bytes_stream();
    loop {
        let next = tokio::time::timeout(read_timeout, body.next())
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
            })?;
        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(|e| FetchError::body(url, e))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        written += chunk.len() as u64;
    }

    file.flush().await.map_err(|e| DownloadError::io(path, e))?;
    Ok(written)
}
