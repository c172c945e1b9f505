//! HTTP client with cookie persistence, retries and identity rotation.

mod capture;
mod proxy;
mod user_agent;

pub use capture::DebugCapture;
pub use proxy::{fetch_webshare_proxies, redact_proxy, resolve_proxies, ProxyPool};
pub use user_agent::{HeaderProfile, IdentityRotation, Rotation, DEFAULT_PROFILE, ROTATION_PROFILES};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::rate_limiter::{jittered, RateLimiter};
use crate::config::HttpConfig;
use crate::error::TransportError;

/// Extra request headers, applied over the identity headers.
pub type Headers<'a> = &'a [(&'static str, String)];

/// The HTTP operations the protocol layer needs.
///
/// Implementations retry transient failures themselves and return the body of
/// a successful response.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, headers: Headers<'_>) -> Result<String, TransportError>;

    async fn post_form(
        &self,
        url: &str,
        headers: Headers<'_>,
        body: String,
    ) -> Result<String, TransportError>;
}

struct ClientState {
    client: Client,
    identity: IdentityRotation,
    proxies: ProxyPool,
}

/// reqwest-backed [`HttpTransport`].
///
/// Every non-2xx status and connection error is retried with backoff until
/// `max_attempts` is spent. One instance is one browser-like session: a single cookie jar that survives
/// proxy rotation, a request counter driving identity rotation, and an
/// adaptive rate limiter.
pub struct HttpClient {
    jar: Arc<Jar>,
    config: HttpConfig,
    state: Mutex<ClientState>,
    rate_limiter: RateLimiter,
    capture: Option<DebugCapture>,
}

impl HttpClient {
    /// Build a client. Every proxy is validated up front.
    pub fn new(config: &HttpConfig, proxies: Vec<String>) -> Result<Self, TransportError> {
        for proxy in &proxies {
            reqwest::Proxy::all(proxy).map_err(|source| TransportError::InvalidProxy {
                url: redact_proxy(proxy),
                source,
            })?;
        }

        let jar = Arc::new(Jar::default());
        let client = build_client(&jar, config.timeout(), None)?;

        Ok(Self {
            jar,
            config: config.clone(),
            state: Mutex::new(ClientState {
                client,
                identity: IdentityRotation::new(
                    config.rotate_every,
                    config.proxy_rotate_multiplier,
                    config.user_agent.clone(),
                ),
                proxies: ProxyPool::new(proxies),
            }),
            rate_limiter: RateLimiter::new(),
            capture: None,
        })
    }

    /// Write every request body and response to a debug directory.
    pub fn with_capture(mut self, capture: DebugCapture) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Requests issued so far.
    pub async fn request_count(&self) -> u64 {
        self.state.lock().await.identity.request_count()
    }

    /// Count the request, rotate identity and proxy when due, and hand out the
    /// client and identity headers to use.
    async fn prepare(&self) -> Result<(Client, Vec<(&'static str, String)>), TransportError> {
        let mut state = self.state.lock().await;
        let rotation = state.identity.tick();
        let count = state.identity.request_count();

        if rotation.headers {
            debug!("Rotating to new User-Agent (request #{})", count);
        }
        if rotation.proxy && state.proxies.advance() {
            let proxy = state.proxies.current().map(|p| p.to_string());
            state.client = build_client(&self.jar, self.config.timeout(), proxy.as_deref())?;
            if let Some(proxy) = proxy {
                debug!("Rotating to proxy {} (request #{})", redact_proxy(&proxy), count);
            }
        }

        Ok((state.client.clone(), state.identity.headers()))
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        headers: Headers<'_>,
        body: Option<String>,
    ) -> Result<String, TransportError> {
        let method_name = if method == Method::POST { "POST" } else { "GET" };
        let (client, identity) = self.prepare().await?;
        let header_map = merge_headers(&identity, headers);

        if let (Some(capture), Some(body)) = (&self.capture, &body) {
            capture.save(&format!("{}_request", method_name), "txt", body).await;
        }

        let attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let domain = self.rate_limiter.acquire(url).await;

            let mut request = client
                .request(method.clone(), url)
                .headers(header_map.clone());
            if let Some(body) = &body {
                request = request.body(body.clone());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if let Some(domain) = &domain {
                        self.report_status(domain, status).await;
                    }

                    match response.text().await {
                        Ok(text) => {
                            if let Some(capture) = &self.capture {
                                let name = if status.is_success() {
                                    format!("{}_response", method_name)
                                } else {
                                    format!("{}_response_{}", method_name, status.as_u16())
                                };
                                capture.save(&name, response_ext(&text), &text).await;
                            }
                            if status.is_success() {
                                return Ok(text);
                            }
                            last_error = format!("HTTP {}", status);
                        }
                        Err(e) if status.is_success() => last_error = e.to_string(),
                        Err(_) => last_error = format!("HTTP {}", status),
                    }
                }
                Err(e) => last_error = e.to_string(),
            }

            if attempt < attempts {
                let wait = backoff_delay(
                    attempt,
                    Duration::from_millis(self.config.backoff_base_ms),
                    Duration::from_millis(self.config.backoff_max_ms),
                );
                let wait = jittered(wait, Duration::from_millis(self.config.backoff_base_ms / 2));
                warn!(
                    "{} {} attempt {}/{} failed ({}), retrying in {:?}",
                    method_name, url, attempt, attempts, last_error, wait
                );
                tokio::time::sleep(wait).await;
            }
        }

        Err(TransportError::Exhausted {
            method: method_name,
            url: url.to_string(),
            attempts,
            last: last_error,
        })
    }

    async fn report_status(&self, domain: &str, status: StatusCode) {
        let code = status.as_u16();
        if RateLimiter::is_definite_rate_limit(code) {
            self.rate_limiter.report_rate_limit(domain, code).await;
        } else if status.is_server_error() {
            self.rate_limiter.report_server_error(domain).await;
        } else if status.is_success() {
            self.rate_limiter.report_success(domain).await;
        }
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    async fn get(&self, url: &str, headers: Headers<'_>) -> Result<String, TransportError> {
        self.send(Method::GET, url, headers, None).await
    }

    async fn post_form(
        &self,
        url: &str,
        headers: Headers<'_>,
        body: String,
    ) -> Result<String, TransportError> {
        self.send(Method::POST, url, headers, Some(body)).await
    }
}

fn build_client(jar: &Arc<Jar>, timeout: Duration, proxy: Option<&str>) -> Result<Client, TransportError> {
    let mut builder = Client::builder()
        .cookie_provider(Arc::clone(jar))
        .timeout(timeout)
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        let proxy_config = reqwest::Proxy::all(proxy).map_err(|source| TransportError::InvalidProxy {
            url: redact_proxy(proxy),
            source,
        })?;
        builder = builder.proxy(proxy_config);
    }

    builder.build().map_err(TransportError::Build)
}

/// Identity headers overlaid with request headers; later names win.
fn merge_headers(identity: &[(&'static str, String)], extra: &[(&'static str, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in identity.iter().chain(extra) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => debug!("Skipping invalid header {}", name),
        }
    }
    map
}

/// `base * 2^(attempt-1)`, capped at `max`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(max)
}

fn response_ext(body: &str) -> &'static str {
    if crate::jsf::is_partial_response(body) {
        "xml"
    } else {
        "html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let base = Duration::from_millis(400);
        let max = Duration::from_secs(1);
        assert_eq!(backoff_delay(1, base, max), Duration::from_millis(400));
        assert_eq!(backoff_delay(2, base, max), Duration::from_millis(800));
        assert_eq!(backoff_delay(3, base, max), max);
        assert_eq!(backoff_delay(40, base, max), max);
    }

    #[test]
    fn test_request_headers_override_identity() {
        let identity = vec![
            ("User-Agent", "UA".to_string()),
            ("Accept-Language", "en".to_string()),
        ];
        let extra = vec![("Accept-Language", "de".to_string())];
        let map = merge_headers(&identity, &extra);
        assert_eq!(map.get("accept-language").unwrap(), "de");
        assert_eq!(map.get("user-agent").unwrap(), "UA");
        assert_eq!(map.get_all("accept-language").iter().count(), 1);
    }

    #[test]
    fn test_invalid_proxy_is_rejected() {
        let result = HttpClient::new(&HttpConfig::default(), vec!["::not a proxy::".to_string()]);
        assert!(matches!(result, Err(TransportError::InvalidProxy { .. })));
    }
}
