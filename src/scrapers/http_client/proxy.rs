//! Proxy pool and the Webshare proxy-list source.

use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};
use url::Url;

use crate::config::HttpConfig;
use crate::error::TransportError;

const WEBSHARE_LIST_PATH: &str = "/api/v2/proxy/list/?mode=direct&page=1&page_size=100";
const WEBSHARE_TIMEOUT: Duration = Duration::from_secs(30);

/// Proxies cycled through on rotation. Requests start on a direct connection.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    proxies: Vec<String>,
    current: Option<usize>,
}

impl ProxyPool {
    pub fn new(proxies: Vec<String>) -> Self {
        Self {
            proxies,
            current: None,
        }
    }

    /// Proxy in use, `None` for a direct connection.
    pub fn current(&self) -> Option<&str> {
        self.current.map(|i| self.proxies[i].as_str())
    }

    /// Move to the next proxy. Returns false when there is nothing to rotate to.
    pub fn advance(&mut self) -> bool {
        if self.proxies.is_empty() {
            return false;
        }
        self.current = Some(self.current.map_or(0, |i| (i + 1) % self.proxies.len()));
        true
    }
}

/// Proxy URL with its password removed, for logs and errors.
pub fn redact_proxy(proxy: &str) -> String {
    match Url::parse(proxy) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => "<unparseable proxy url>".to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct WebshareList {
    #[serde(default)]
    results: Vec<WebshareProxy>,
}

#[derive(Debug, Deserialize)]
struct WebshareProxy {
    username: String,
    password: String,
    proxy_address: String,
    port: u16,
}

impl WebshareProxy {
    fn url(&self) -> String {
        format!(
            "http://{}:{}@{}:{}",
            self.username, self.password, self.proxy_address, self.port
        )
    }
}

/// Fetch the account's proxy list from the Webshare API.
pub async fn fetch_webshare_proxies(
    base_url: &str,
    api_key: &str,
) -> Result<Vec<String>, TransportError> {
    let client = reqwest::Client::builder()
        .timeout(WEBSHARE_TIMEOUT)
        .build()
        .map_err(TransportError::Build)?;
    let url = format!("{}{}", base_url.trim_end_matches('/'), WEBSHARE_LIST_PATH);

    let response = client
        .get(&url)
        .header("Authorization", format!("Token {}", api_key))
        .send()
        .await
        .map_err(|e| TransportError::ProxySource(e.to_string()))?;
    if !response.status().is_success() {
        return Err(TransportError::ProxySource(format!(
            "HTTP {}",
            response.status()
        )));
    }

    let list: WebshareList = response
        .json()
        .await
        .map_err(|e| TransportError::ProxySource(e.to_string()))?;
    Ok(list.results.iter().map(WebshareProxy::url).collect())
}

/// Static proxies from config, or the Webshare list when an API key is set.
/// A failing proxy source leaves the crawl on a direct connection.
pub async fn resolve_proxies(config: &HttpConfig) -> Vec<String> {
    if !config.proxies.is_empty() {
        info!("Using {} configured proxies", config.proxies.len());
        return config.proxies.clone();
    }

    let Some(api_key) = config.webshare_api_key.as_deref() else {
        return Vec::new();
    };

    match fetch_webshare_proxies(&config.webshare_url, api_key).await {
        Ok(proxies) if !proxies.is_empty() => {
            info!("Loaded {} proxies from Webshare API", proxies.len());
            proxies
        }
        Ok(_) => {
            warn!("No proxies returned from Webshare API, using direct connection");
            Vec::new()
        }
        Err(e) => {
            warn!("{}, using direct connection", e);
            Vec::new()
        }
    }
}
