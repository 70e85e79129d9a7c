// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments and validate them into a RunConfig
// 2. Set up logging
// 3. Pre-flight: probe the root page, check robots.txt
// 4. Run the crawl + download pipeline (Ctrl-C or SIGTERM stops it gracefully)
// 5. Print the statistics and exit with the proper code
//    (0 = done, 1 = interrupted or refused by robots.txt, 2 = error)
// =============================================================================

mod cli; // src/cli.rs - command-line parsing
mod config; // src/config.rs - validated run configuration
mod crawl; // src/crawl/ - tree traversal and safety filtering
mod download; // src/download/ - queue, path mapping and worker pool
mod listing; // src/listing/ - directory-listing parser
mod net; // src/net/ - HTTP client, robots.txt, root probe
mod runner; // src/runner.rs - one complete run
mod state; // src/state/ - counters, progress file, status line

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::{RunConfig, StartupError};
use net::{is_crawl_allowed, probe_listing, HttpClient, ProbeVerdict};
use runner::RunReport;
use state::{format_bytes, RunControl};

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            // {:#} prints the whole context chain on one line
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// Returns:
//   Ok(0) = run finished
//   Ok(1) = interrupted, or the user declined to override robots.txt
//   Err = fatal error (exit code 2)
async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = RunConfig::from_cli(&cli)?;
    debug!(?config, "configuration");

    if !config.json {
        print_banner();
    }

    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!("failed to create output directory {}", config.output_dir.display())
    })?;

    let client = HttpClient::new(&config.http_settings()).context("failed to set up HTTP client")?;
    if !config.verify_tls {
        warn!("TLS certificate verification is disabled");
    }

    info!(url = %config.base_url, "probing directory structure");
    match probe_listing(&client, &config.base_url).await {
        ProbeVerdict::Listing => {}
        ProbeVerdict::NotHtml { content_type } => {
            warn!(%content_type, "content type may not be a directory listing, continuing anyway");
        }
        ProbeVerdict::NoIndicators { links } => {
            warn!(links, "URL may not be a directory listing, continuing anyway");
        }
        ProbeVerdict::Unreachable { error } => {
            warn!(%error, "could not probe the root URL, continuing anyway");
        }
    }

    if config.ignore_robots {
        warn!("ignoring robots.txt restrictions");
    } else if !is_crawl_allowed(&client, &config.base_url, client.user_agent()).await {
        let refusal = StartupError::RobotsDisallowed(config.base_url.to_string());
        warn!("{refusal}");
        if !confirm_override().await {
            eprintln!("Aborted: {refusal}");
            return Ok(1);
        }
    }

    let control = RunControl::new();
    let on_stop = control.clone();
    tokio::spawn(async move {
        stop_requested().await;
        warn!("interrupted, stopping after in-flight downloads");
        on_stop.cancel();
    });

    let report = runner::execute(&config, &client, &control)
        .await
        .context("failed to save progress")?;

    if config.json {
        let json = serde_json::to_string_pretty(&report.progress.statistics)?;
        println!("{}", json);
    } else {
        if config.dry_run {
            print_planned(&report);
        }
        print_statistics(&config, &report);
    }

    if report.cancelled {
        Ok(1)
    } else {
        Ok(0)
    }
}

// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
// A signal that cannot be listened for never fires.
async fn stop_requested() {
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}

// Default level is info (debug with --verbose); RUST_LOG overrides both.
// Logs go to stderr so --json output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_banner() {
    println!("{}", "=".repeat(60));
    println!("⚠️  AUTHORIZED USE ONLY");
    println!("{}", "=".repeat(60));
    println!("This tool downloads files from web directories recursively.");
    println!("Only use it on systems you own or have permission to test.");
    println!("Respect robots.txt and server resources.");
    println!("{}", "=".repeat(60));
    println!();
}

// Asks on the terminal whether to crawl anyway. No terminal means no.
async fn confirm_override() -> bool {
    let answer = tokio::task::spawn_blocking(|| {
        if !io::stdin().is_terminal() {
            return false;
        }

        print!("robots.txt disallows crawling. Continue? (y/N) ");
        if io::stdout().flush().is_err() {
            return false;
        }

        let mut line = String::new();
        io::stdin().read_line(&mut line).is_ok() && line.trim().eq_ignore_ascii_case("y")
    })
    .await;

    answer.unwrap_or(false)
}

fn print_planned(report: &RunReport) {
    println!("\n📋 Files that would be downloaded ({}):", report.planned.len());
    for file in &report.planned {
        let size = file
            .size
            .map(|bytes| format_bytes(bytes as f64))
            .unwrap_or_else(|| "unknown size".to_string());
        let kind = file.content_type.as_deref().unwrap_or("unknown type");
        println!("   {} ({}, {}) -> {}", file.url, size, kind, file.local_path.display());
    }
}

fn print_statistics(config: &RunConfig, report: &RunReport) {
    let block = &report.progress.statistics;
    let stats = &block.counters;
    let avg_speed = stats.bytes_downloaded as f64 / block.duration_seconds.max(1.0);

    println!("\n{}", "=".repeat(70));
    println!("📊 DOWNLOAD STATISTICS");
    println!("{}", "=".repeat(70));
    println!("🌐 Base URL: {}", config.base_url);
    println!("📁 Output Directory: {}", config.output_dir.display());
    println!("⏱️  Duration: {}", block.duration);
    println!("🔍 URLs Discovered: {}", stats.urls_discovered);
    println!("📄 Total Files Found: {}", stats.total_files_found);
    println!("✅ Files Downloaded: {}", stats.files_downloaded);
    println!("⏭️  Already Present: {}", stats.files_skipped);
    println!("💾 Total Size Downloaded: {}", format_bytes(stats.bytes_downloaded as f64));
    println!("⚡ Average Speed: {}/s", format_bytes(avg_speed));
    println!("❌ Errors: {}", stats.errors);
    println!(
        "📈 Success Rate: {:.1}%",
        stats.files_downloaded as f64 / stats.total_files_found.max(1) as f64 * 100.0
    );

    let fetched = stats.files_downloaded - stats.files_skipped;
    if fetched > 0 {
        let avg_size = stats.bytes_downloaded as f64 / fetched as f64;
        println!("📏 Average File Size: {}", format_bytes(avg_size));
    }

    let top = top_file_types(
        report
            .progress
            .downloaded_files
            .iter()
            .map(|record| Path::new(&record.local_path)),
    );
    if !top.is_empty() {
        println!("\n📋 Top File Types:");
        for (ext, count) in top {
            println!("   {}: {} files", ext, count);
        }
    }

    if report.cancelled {
        println!("\n⚠️  Run was interrupted; progress saved to {}", report.progress_path.display());
    }
    println!("{}", "=".repeat(70));
}

// Five most common extensions, most frequent first (ties by name)
fn top_file_types<'a>(paths: impl Iterator<Item = &'a Path>) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for path in paths {
        let ext = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_else(|| "no extension".to_string());
        *counts.entry(ext).or_default() += 1;
    }

    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(5);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_file_types() {
        let paths = [
            "a/x.PDF", "a/y.pdf", "b/z.txt", "README", "c.zip", "d.iso", "e.gz", "f.txt", "g.pdf",
        ];
        let top = top_file_types(paths.iter().map(Path::new));

        assert_eq!(top.len(), 5);
        assert_eq!(top[0], (".pdf".to_string(), 3));
        assert_eq!(top[1], (".txt".to_string(), 2));
        // Remaining single counts in name order
        assert_eq!(top[2], (".gz".to_string(), 1));
        assert_eq!(top[3], (".iso".to_string(), 1));
        assert_eq!(top[4], (".zip".to_string(), 1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sigterm_requests_stop() {
        use std::time::Duration;
        use tokio::signal::unix::{signal, SignalKind};

        // Once a listener exists SIGTERM no longer ends the test process
        let _listener = signal(SignalKind::terminate()).unwrap();
        let stop = tokio::spawn(stop_requested());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!stop.is_finished());

        let sent = std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(sent.success());

        tokio::time::timeout(Duration::from_secs(5), stop)
            .await
            .unwrap()
            .unwrap();
    }
}
