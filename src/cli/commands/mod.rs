//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod bars;
mod crawl;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

pub use crawl::CrawlArgs;

#[derive(Parser)]
#[command(name = "bravscrape")]
#[command(about = "Crawl the BRAV lawyer registry into CSV")]
#[command(version)]
pub struct Cli {
    /// Config file path (default: ./bravscrape.toml when present)
    #[arg(short, long, global = true, env = "BRAVSCRAPE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl jurisdictions and append their records to a CSV file
    Crawl(CrawlArgs),

    /// List the jurisdictions offered by the search form
    Bars,
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())
        .await
        .map_err(anyhow::Error::msg)?;
    if let Some(path) = &config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }

    match cli.command {
        Commands::Crawl(args) => {
            args.apply(&mut config);
            crawl::cmd_crawl(&config).await
        }
        Commands::Bars => bars::cmd_bars(&config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crawl_flags() {
        let cli = Cli::try_parse_from([
            "bravscrape",
            "-v",
            "crawl",
            "--out",
            "out.csv",
            "--rows",
            "100",
            "--sleep",
            "0.5",
            "--bars",
            "Berlin, Hamburg",
            "--no-details",
        ])
        .unwrap();
        assert!(cli.verbose);

        let Commands::Crawl(args) = cli.command else {
            panic!("expected crawl");
        };
        let mut config = Config::default();
        args.apply(&mut config);
        assert_eq!(config.crawl.output, PathBuf::from("out.csv"));
        assert_eq!(config.crawl.page_size, 100);
        assert_eq!(config.crawl.delay_ms, 500);
        assert_eq!(config.crawl.jurisdictions, vec!["Berlin", "Hamburg"]);
        assert!(!config.crawl.fetch_details);
        // Untouched flags keep config values
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_parse_bars() {
        let cli = Cli::try_parse_from(["bravscrape", "bars", "--config", "x.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Bars));
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }
}
