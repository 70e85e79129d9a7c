// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// There are no subcommands: one invocation mirrors one listing tree.
// The raw values parsed here are validated into a RunConfig (see config.rs)
// before anything touches the network.
// =============================================================================

use clap::Parser;

// This struct represents our entire CLI application
//
// #[derive(Parser)] tells clap to generate the parsing code
// Doc comments on the fields become the --help text
#[derive(Parser, Debug, Clone)]
#[command(
    name = "openlist",
    version,
    about = "Recursively download the files behind an open directory listing",
    long_about = "openlist walks an HTTP directory listing (Apache, nginx, IIS, Python http.server \
                  or anything that looks like one), follows its subdirectories and downloads every \
                  file into a local tree that mirrors the remote paths."
)]
pub struct Cli {
    /// Root URL of the directory listing (http or https)
    ///
    /// Example: openlist https://mirror.example.com/pub/
    pub url: String,

    /// Directory the files are written into
    #[arg(short = 'o', long = "output", default_value = "downloads")]
    pub output: String,

    /// How many directory levels below the root are crawled
    ///
    /// Depth 0 = only the root listing
    #[arg(short = 'd', long, default_value_t = 10)]
    pub max_depth: usize,

    /// Number of concurrent download workers
    #[arg(short = 'w', long, default_value_t = 5)]
    pub workers: usize,

    /// Seconds to wait before handling each listing entry
    #[arg(long, default_value_t = 1.0)]
    pub delay: f64,

    /// Crawl and list files without downloading them
    #[arg(long)]
    pub dry_run: bool,

    /// Accept invalid TLS certificates
    #[arg(long = "no-verify-ssl")]
    pub no_verify_ssl: bool,

    /// User-Agent header sent with every request
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Request timeout in seconds (file downloads get twice this)
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Only download these extensions, comma separated (e.g. "pdf,txt,zip")
    #[arg(long)]
    pub extensions: Option<String>,

    /// Do not consult robots.txt before crawling
    #[arg(long)]
    pub ignore_robots: bool,

    /// Print the final statistics as JSON
    #[arg(long)]
    pub json: bool,

    /// Debug-level logging (RUST_LOG still wins when set)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["openlist", "http://h.example.com/"]).unwrap();
        assert_eq!(cli.output, "downloads");
        assert_eq!(cli.max_depth, 10);
        assert_eq!(cli.workers, 5);
        assert_eq!(cli.delay, 1.0);
        assert_eq!(cli.timeout, 30);
        assert!(!cli.dry_run && !cli.no_verify_ssl && !cli.ignore_robots);
        assert!(cli.extensions.is_none());
    }

    #[test]
    fn test_short_and_long_flags() {
        let cli = Cli::try_parse_from([
            "openlist",
            "https://h.example.com/pub/",
            "-o",
            "mirror",
            "-d",
            "3",
            "-w",
            "8",
            "--delay",
            "0.25",
            "--extensions",
            "pdf,txt",
            "--no-verify-ssl",
            "--dry-run",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.output, "mirror");
        assert_eq!(cli.max_depth, 3);
        assert_eq!(cli.workers, 8);
        assert_eq!(cli.delay, 0.25);
        assert_eq!(cli.extensions.as_deref(), Some("pdf,txt"));
        assert!(cli.no_verify_ssl && cli.dry_run && cli.verbose);
    }

    #[test]
    fn test_url_is_required() {
        assert!(Cli::try_parse_from(["openlist"]).is_err());
    }
}
