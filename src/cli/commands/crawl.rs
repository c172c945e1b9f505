//! Crawl command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::Args;
use console::style;
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cli::helpers::{format_elapsed, session_client, spinner};
use crate::config::Config;
use crate::error::JurisdictionError;
use crate::models::SearchContext;
use crate::scrapers::http_client::resolve_proxies;
use crate::scrapers::{CrawlOptions, Crawler, JurisdictionSummary, RecordBudget};
use crate::sink::CsvSink;

/// Number of labels shown when a jurisdiction filter matches nothing.
const EXAMPLE_LABELS: usize = 10;

/// Flags of the `crawl` command. Each one overrides the config value when given.
#[derive(Args, Debug, Default)]
pub struct CrawlArgs {
    /// Output CSV path (appended to; header written when new)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Rows per page request (the server may clamp)
    #[arg(long)]
    rows: Option<u64>,

    /// Base pause between requests, in seconds
    #[arg(long)]
    sleep: Option<f64>,

    /// Upper bound of the random extra pause, in seconds
    #[arg(long)]
    jitter: Option<f64>,

    /// HTTP timeout, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Comma-separated jurisdiction labels, exactly as offered. Empty = all
    #[arg(long, env = "BRAVSCRAPE_BARS")]
    bars: Option<String>,

    /// Stop after N records in total (0 = no limit)
    #[arg(long)]
    max_records: Option<usize>,

    /// Write raw requests and responses here
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Skip the per-record detail fetch
    #[arg(long)]
    no_details: bool,

    /// Jurisdictions crawled in parallel
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Proxy URL (repeatable)
    #[arg(long = "proxy")]
    proxies: Vec<String>,

    /// Fixed User-Agent header
    #[arg(long)]
    user_agent: Option<String>,
}

impl CrawlArgs {
    pub fn apply(&self, config: &mut Config) {
        let crawl = &mut config.crawl;
        if let Some(out) = &self.out {
            crawl.output = out.clone();
        }
        if let Some(rows) = self.rows {
            crawl.page_size = rows;
        }
        if let Some(sleep) = self.sleep {
            crawl.delay_ms = seconds_to_ms(sleep);
        }
        if let Some(jitter) = self.jitter {
            crawl.jitter_ms = seconds_to_ms(jitter);
        }
        if let Some(bars) = &self.bars {
            crawl.jurisdictions = bars
                .split(',')
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty())
                .collect();
        }
        if let Some(max) = self.max_records {
            crawl.max_records = max;
        }
        if let Some(dir) = &self.debug_dir {
            crawl.debug_dir = Some(dir.clone());
        }
        if self.no_details {
            crawl.fetch_details = false;
        }
        if let Some(n) = self.concurrency {
            crawl.concurrency = n;
        }

        let http = &mut config.http;
        if let Some(timeout) = self.timeout {
            http.timeout_secs = timeout;
        }
        if !self.proxies.is_empty() {
            http.proxies = self.proxies.clone();
        }
        if let Some(ua) = &self.user_agent {
            http.user_agent = Some(ua.clone());
        }
    }
}

fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

/// Resolve the requested labels against the offered ones.
/// An empty request selects everything; unknown labels are dropped with a warning.
pub fn select_jurisdictions(search: &SearchContext, wanted: &[String]) -> anyhow::Result<Vec<String>> {
    let offered: Vec<String> = search.labels().map(str::to_string).collect();
    if wanted.is_empty() {
        return Ok(offered);
    }

    let mut selected = Vec::new();
    for label in wanted {
        if search.jurisdiction(label).is_some() {
            if !selected.contains(label) {
                selected.push(label.clone());
            }
        } else {
            warn!("Unknown jurisdiction {:?}, skipping", label);
        }
    }

    if selected.is_empty() {
        let examples: Vec<&str> = offered.iter().take(EXAMPLE_LABELS).map(String::as_str).collect();
        anyhow::bail!(
            "No valid jurisdictions selected. Use exact dropdown labels. Examples: {} ...",
            examples.join(", ")
        );
    }
    Ok(selected)
}

/// Crawl the selected jurisdictions into the output CSV.
pub async fn cmd_crawl(config: &Config) -> anyhow::Result<()> {
    let started = Utc::now();
    info!("Crawl started at {}", started.to_rfc3339());

    let proxies = resolve_proxies(&config.http).await;
    let options = CrawlOptions::from(&config.crawl);

    let pb = spinner("Loading search page...");
    let discovery = Crawler::new(
        Arc::new(session_client(config, &proxies, "discover")?),
        config.target.clone(),
        options.clone(),
    );
    let search = match discovery.discover().await {
        Ok(search) => search,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e.into());
        }
    };
    let labels = match select_jurisdictions(&search, &config.crawl.jurisdictions) {
        Ok(labels) => labels,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };

    let sink = Arc::new(Mutex::new(CsvSink::open(&config.crawl.output)?));
    let budget = Arc::new(RecordBudget::new(config.crawl.max_records));
    let concurrency = config.crawl.concurrency.max(1);
    info!(
        "Crawling {} jurisdictions ({} at a time) into {}",
        labels.len(),
        concurrency,
        config.crawl.output.display()
    );
    pb.set_message(format!("Crawling {} jurisdictions...", labels.len()));

    let results: Vec<(String, Result<JurisdictionSummary, anyhow::Error>)> = stream::iter(labels)
        .map(|label| {
            let sink = Arc::clone(&sink);
            let budget = Arc::clone(&budget);
            let proxies = proxies.clone();
            let options = options.clone();
            let pb = pb.clone();
            async move {
                if budget.is_exhausted() {
                    let summary = JurisdictionSummary {
                        jurisdiction: label.clone(),
                        skipped: Some("record limit reached".to_string()),
                        ..Default::default()
                    };
                    return (label, Ok(summary));
                }
                let result = crawl_one(config, &proxies, options, budget.clone(), &label, &sink).await;
                pb.set_message(format!("{} records written", budget.used()));
                (label, result)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;
    pb.finish_and_clear();

    print_summary(&results);

    let written = sink.lock().await.written();
    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    println!(
        "{} Wrote {} records to {} in {}",
        style("✓").green(),
        written,
        config.crawl.output.display(),
        format_elapsed(Utc::now() - started)
    );

    if failed > 0 {
        anyhow::bail!("{} of {} jurisdictions failed", failed, results.len());
    }
    Ok(())
}

async fn crawl_one(
    config: &Config,
    proxies: &[String],
    options: CrawlOptions,
    budget: Arc<RecordBudget>,
    label: &str,
    sink: &Mutex<CsvSink>,
) -> anyhow::Result<JurisdictionSummary> {
    let client = session_client(config, proxies, label)?;
    let mut crawler = Crawler::new(Arc::new(client), config.target.clone(), options).with_budget(budget);
    crawler
        .crawl_jurisdiction(label, sink)
        .await
        .map_err(|e: JurisdictionError| {
            warn!("{}", e);
            e.into()
        })
}

fn print_summary(results: &[(String, anyhow::Result<JurisdictionSummary>)]) {
    for (label, result) in results {
        match result {
            Ok(summary) => match &summary.skipped {
                Some(reason) => println!("{} {}: skipped ({})", style("!").yellow(), label, reason),
                None => {
                    let mut line = format!(
                        "{} {}: {} of {} records in {} pages",
                        style("✓").green(),
                        label,
                        summary.records,
                        summary.total,
                        summary.pages
                    );
                    if summary.recoveries > 0 {
                        line.push_str(&format!(", {} session refreshes", summary.recoveries));
                    }
                    if summary.short_pages > 0 {
                        line.push_str(&format!(", {} short pages", summary.short_pages));
                    }
                    if summary.detail_failures > 0 {
                        line.push_str(&format!(", {} detail failures", summary.detail_failures));
                    }
                    println!("{}", line);
                }
            },
            Err(e) => println!("{} {}: {}", style("✗").red(), label, e),
        }
    }
}
