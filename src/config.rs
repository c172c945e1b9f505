//! Configuration management for bravscrape.
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML or
//! JSON config file, environment variables, and command-line flags.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "bravscrape.toml";

/// Protocol identifiers and endpoints of the target application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Scheme and host, also sent as `Origin`.
    pub base_url: String,
    /// Path of the AJAX endpoint (also the `Referer`).
    pub ajax_path: String,
    /// Candidate paths for the full search page, tried in order.
    pub search_paths: Vec<String>,
    pub search_form_id: String,
    pub result_form_id: String,
    /// Update target rendered by the search button.
    pub result_region: String,
    /// Update target rendered by a card's detail link.
    pub detail_region: String,
    /// Name suffix of the jurisdiction `<select>`.
    pub jurisdiction_field_suffix: String,
    /// Name suffix of the language selector.
    pub language_field_suffix: String,
    /// Language submitted with every search.
    pub language: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: "https://bravsearch.bea-brak.de".to_string(),
            ajax_path: "/bravsearch/index.xhtml".to_string(),
            search_paths: vec![
                "/".to_string(),
                "/bravsearch/".to_string(),
                "/bravsearch/index.brak".to_string(),
                "/bravsearch/index.xhtml".to_string(),
            ],
            search_form_id: "searchForm".to_string(),
            result_form_id: "resultForm".to_string(),
            result_region: "mainPageContent".to_string(),
            detail_region: "resultDetailForm".to_string(),
            jurisdiction_field_suffix: "ddRAKammer_input".to_string(),
            language_field_suffix: "ddLanguage_input".to_string(),
            language: "en".to_string(),
        }
    }
}

impl TargetConfig {
    /// Scheme and host without a trailing slash.
    pub fn origin(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn ajax_url(&self) -> String {
        format!("{}{}", self.origin(), self.ajax_path)
    }

    pub fn search_urls(&self) -> Vec<String> {
        self.search_paths
            .iter()
            .map(|p| format!("{}{}", self.origin(), p))
            .collect()
    }
}

/// Crawl behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// CSV file records are appended to.
    pub output: PathBuf,
    /// Rows requested per page (the server may clamp).
    pub page_size: u64,
    /// Base pause between page and detail fetches.
    pub delay_ms: u64,
    /// Upper bound of the random extra pause.
    pub jitter_ms: u64,
    /// Exact jurisdiction labels to crawl. Empty = all.
    pub jurisdictions: Vec<String>,
    /// Stop after this many records in total. 0 = no limit.
    pub max_records: usize,
    /// Write every raw request and response here.
    pub debug_dir: Option<PathBuf>,
    /// Fetch the detail view of every record.
    pub fetch_details: bool,
    /// Jurisdictions crawled in parallel, each with its own session.
    pub concurrency: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("lawyers.csv"),
            page_size: 800,
            delay_ms: 250,
            jitter_ms: 150,
            jurisdictions: Vec::new(),
            max_records: 0,
            debug_dir: None,
            fetch_details: true,
            concurrency: 1,
        }
    }
}

impl CrawlConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn jitter(&self) -> Duration {
        Duration::from_millis(self.jitter_ms)
    }
}

/// HTTP client behaviour: retries, identity rotation and proxies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Attempts per request before a transport error is surfaced.
    pub max_attempts: u32,
    /// First retry delay; doubled on every further attempt.
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Rotate the outbound header set every N requests. 0 disables rotation.
    pub rotate_every: u64,
    /// Rotate the proxy every `rotate_every * proxy_rotate_multiplier` requests.
    pub proxy_rotate_multiplier: u64,
    /// Fixed user agent. When set, header rotation only varies the language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Static proxy URLs (http, https or socks5).
    pub proxies: Vec<String>,
    /// API key for the Webshare proxy list. Usually supplied via environment.
    #[serde(default, skip_serializing)]
    pub webshare_api_key: Option<String>,
    pub webshare_url: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
            backoff_base_ms: 400,
            backoff_max_ms: 10_000,
            rotate_every: 20,
            proxy_rotate_multiplier: 3,
            user_agent: None,
            proxies: Vec::new(),
            webshare_api_key: None,
            webshare_url: "https://proxy.webshare.io".to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub crawl: CrawlConfig,
    pub http: HttpConfig,
    /// File this config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load from an explicit path, or `bravscrape.toml` in the working
    /// directory if it exists, or defaults. Environment overrides are applied.
    pub async fn load(path: Option<&Path>) -> Result<Self, String> {
        let config = match path {
            Some(path) => Self::load_from_path(path).await?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if tokio::fs::try_exists(default_path).await.unwrap_or(false) {
                    Self::load_from_path(default_path).await?
                } else {
                    Self::default()
                }
            }
        };
        Ok(config.with_env_overrides())
    }

    /// Load configuration from a specific file path.
    /// TOML for `.toml` files, JSON otherwise.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        let mut config: Config = match ext {
            "json" => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
            _ => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Apply environment variable overrides.
    pub fn with_env_overrides(mut self) -> Self {
        // BRAVSCRAPE_BASE_URL - point at a mirror or test server
        if let Some(url) = non_empty_var("BRAVSCRAPE_BASE_URL") {
            self.target.base_url = url;
        }

        // BRAVSCRAPE_PROXIES - comma-separated proxy URLs
        if let Some(proxies) = non_empty_var("BRAVSCRAPE_PROXIES") {
            self.http.proxies = proxies
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }

        if let Some(ua) = non_empty_var("BRAVSCRAPE_USER_AGENT") {
            self.http.user_agent = Some(ua);
        }

        if let Some(key) = non_empty_var("WEBSHARE_API_KEY") {
            self.http.webshare_api_key = Some(key);
        }

        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_urls() {
        let target = TargetConfig {
            base_url: "https://example.org/".to_string(),
            ..Default::default()
        };
        assert_eq!(target.ajax_url(), "https://example.org/bravsearch/index.xhtml");
        assert_eq!(target.search_urls()[0], "https://example.org/");
        assert_eq!(target.search_urls().len(), 4);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [crawl]
            page_size = 100
            jurisdictions = ["Berlin"]

            [http]
            rotate_every = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.crawl.page_size, 100);
        assert_eq!(config.crawl.jurisdictions, vec!["Berlin".to_string()]);
        assert_eq!(config.crawl.delay_ms, 250);
        assert!(config.crawl.fetch_details);
        assert_eq!(config.http.rotate_every, 5);
        assert_eq!(config.http.max_attempts, 3);
        assert_eq!(config.target.search_form_id, "searchForm");
    }

    #[tokio::test]
    async fn test_load_from_json_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bravscrape.json");
        std::fs::write(&path, r#"{"crawl": {"max_records": 10}}"#).unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.crawl.max_records, 10);
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[crawl\npage_size = ").unwrap();

        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(err.contains("Failed to parse TOML config"));
    }
}
