//! HTTP plumbing and the crawl engine built on it.

pub mod crawler;
pub mod http_client;
pub mod rate_limiter;

pub use crawler::{CrawlOptions, CrawlState, Crawler, JurisdictionSummary, RecordBudget};
pub use http_client::{DebugCapture, HttpClient, HttpTransport};
pub use rate_limiter::RateLimiter;
