// src/runner.rs
// =============================================================================
// One complete run, from the root listing to the progress file.
//
// What happens here:
// 1. Create the run state and the bounded download queue
// 2. Start the status reporter and the consumer side of the queue:
//    - a normal run starts the worker pool
//    - a dry run starts a collector that only records what would be fetched
// 3. Crawl; the crawler closes the queue when it is done
// 4. Wait for the consumers, stop the reporter
// 5. Write the progress document (also after a cancelled run)
//
// Startup checks (robots.txt, probe) and printing belong to main.rs.
// =============================================================================

use futures::StreamExt;
use std::path::PathBuf;
use tracing::{info, warn};
use url::Url;

use crate::config::{RunConfig, DRY_RUN_LOOKUPS};
use crate::crawl::{CrawlEngine, SafetyFilter};
use crate::download::{download_queue, join_all, local_path, Pop, QueueConsumer, WorkerPool};
use crate::listing::Entry;
use crate::net::HttpClient;
use crate::state::{spawn_status_reporter, ProgressDocument, ProgressError, RunControl, RunState};

/// A file a dry run would have downloaded.
#[derive(Debug, Clone)]
pub struct PlannedFile {
    pub url: Url,
    pub local_path: PathBuf,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

#[derive(Debug)]
pub struct RunReport {
    pub progress: ProgressDocument,
    pub progress_path: PathBuf,
    pub cancelled: bool,
    /// Only filled in by a dry run
    pub planned: Vec<PlannedFile>,
}

pub async fn execute(
    config: &RunConfig,
    client: &HttpClient,
    control: &RunControl,
) -> Result<RunReport, ProgressError> {
    let state = RunState::new();
    let (producer, consumer) = download_queue(config.queue_capacity, config.queue_wait);

    let reporter = spawn_status_reporter(
        state.clone(),
        control.clone(),
        consumer.gauge(),
        config.status_interval,
    );

    let engine = CrawlEngine::new(
        client.clone(),
        SafetyFilter::new(config.base_url.clone(), &config.allowed_extensions),
        config.max_depth,
        config.delay,
        state.clone(),
        control.clone(),
    );

    info!(
        url = %config.base_url,
        output = %config.output_dir.display(),
        workers = config.workers,
        max_depth = config.max_depth,
        dry_run = config.dry_run,
        "starting run"
    );

    let (outcome, planned) = if config.dry_run {
        let collector = tokio::spawn(collect(consumer));
        let outcome = engine.run(config.base_url.clone(), producer).await;

        let entries = collector.await.unwrap_or_else(|e| {
            warn!(error = %e, "dry-run collector ended abnormally");
            Vec::new()
        });
        (outcome, plan(client, config, entries).await)
    } else {
        let workers = WorkerPool::new(
            client.clone(),
            config.output_dir.clone(),
            state.clone(),
            control.clone(),
            config.workers,
        )
        .spawn(consumer);

        let outcome = engine.run(config.base_url.clone(), producer).await;
        join_all(workers).await;
        (outcome, Vec::new())
    };

    reporter.abort();

    let cancelled = outcome.cancelled || control.is_cancelled();
    let progress = ProgressDocument::capture(
        config.base_url.as_str(),
        &state,
        outcome.visited.into_vec(),
    );
    let progress_path = progress.write(&config.output_dir)?;
    info!(path = %progress_path.display(), "progress saved");

    Ok(RunReport {
        progress,
        progress_path,
        cancelled,
        planned,
    })
}

// Drains the queue without downloading anything
async fn collect(queue: QueueConsumer) -> Vec<Entry> {
    let mut entries = Vec::new();
    loop {
        match queue.pop().await {
            Pop::Item(entry) => entries.push(entry),
            Pop::Empty => continue,
            Pop::Closed => break,
        }
    }
    entries
}

// Looks up sizes a few at a time; output keeps discovery order
async fn plan(client: &HttpClient, config: &RunConfig, entries: Vec<Entry>) -> Vec<PlannedFile> {
    futures::stream::iter(entries)
        .map(|entry| async move {
            let info = client.file_info(&entry.url).await.unwrap_or_default();
            PlannedFile {
                local_path: local_path(&config.output_dir, &entry.url),
                url: entry.url,
                size: info.size,
                content_type: info.content_type,
            }
        })
        .buffered(DRY_RUN_LOOKUPS)
        .collect()
        .await
}
