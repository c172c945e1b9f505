//! Jurisdiction listing.

use std::sync::Arc;

use console::style;

use crate::cli::helpers::{session_client, spinner};
use crate::config::Config;
use crate::scrapers::http_client::resolve_proxies;
use crate::scrapers::{CrawlOptions, Crawler};

/// Print every jurisdiction the search form offers.
pub async fn cmd_bars(config: &Config) -> anyhow::Result<()> {
    let proxies = resolve_proxies(&config.http).await;
    let client = session_client(config, &proxies, "bars")?;
    let crawler = Crawler::new(
        Arc::new(client),
        config.target.clone(),
        CrawlOptions::from(&config.crawl),
    );

    let pb = spinner("Loading search page...");
    let search = crawler.discover().await;
    pb.finish_and_clear();
    let search = search?;

    println!("\n{}", style("Jurisdictions").bold());
    println!("{}", "-".repeat(60));
    println!("{:<8} Label", "Value");
    println!("{}", "-".repeat(60));
    for jurisdiction in &search.jurisdictions {
        println!("{:<8} {}", jurisdiction.value, jurisdiction.label);
    }
    println!(
        "\n{} {} jurisdictions (faces namespace: {})",
        style("✓").green(),
        search.jurisdictions.len(),
        search.prefix
    );
    Ok(())
}
