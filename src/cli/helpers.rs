//! Shared helper functions for CLI commands.

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Config;
use crate::scrapers::{DebugCapture, HttpClient};

/// Build the HTTP session for one crawler. `tag` prefixes debug capture files.
pub fn session_client(config: &Config, proxies: &[String], tag: &str) -> anyhow::Result<HttpClient> {
    let mut client = HttpClient::new(&config.http, proxies.to_vec())?;
    if let Some(dir) = &config.crawl.debug_dir {
        client = client.with_capture(DebugCapture::new(dir, tag)?);
    }
    Ok(client)
}

/// Spinner with a message, ticking on its own.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb
}

/// Human-readable elapsed time, e.g. `1h 02m 03s`.
pub fn format_elapsed(elapsed: chrono::Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}
