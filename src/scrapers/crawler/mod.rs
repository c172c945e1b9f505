//! Search → paginate → detail-fetch crawl of one jurisdiction at a time.
//!
//! A crawler owns one session. The server keeps the paging state per view,
//! so every exchange has to be awaited before the next one is built.

mod session;
mod state;

pub use session::{page_fields, SearchResult, Session};
pub use state::CrawlState;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::rate_limiter::pause;
use crate::config::{CrawlConfig, TargetConfig};
use crate::error::{DataError, JurisdictionError, ProtocolError, ScrapeError};
use crate::jsf::{extract_records, extract_total_count};
use crate::models::{ResultContext, ResultRecord, SearchContext, ViewState};
use crate::scrapers::HttpTransport;
use crate::sink::RecordSink;

/// Knobs of a crawl that do not concern the protocol itself.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub page_size: u64,
    pub delay: Duration,
    pub jitter: Duration,
    pub fetch_details: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        CrawlOptions::from(&CrawlConfig::default())
    }
}

impl From<&CrawlConfig> for CrawlOptions {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            page_size: config.page_size.max(1),
            delay: config.delay(),
            jitter: config.jitter(),
            fetch_details: config.fetch_details,
        }
    }
}

/// Record cap shared by all crawlers of a run. A limit of 0 means unlimited.
#[derive(Debug, Default)]
pub struct RecordBudget {
    limit: usize,
    used: AtomicUsize,
}

impl RecordBudget {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    /// Claim up to `wanted` records; returns how many were granted.
    pub fn take(&self, wanted: usize) -> usize {
        if self.limit == 0 {
            self.used.fetch_add(wanted, Ordering::Relaxed);
            return wanted;
        }
        let mut granted = 0;
        let _ = self
            .used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                granted = wanted.min(self.limit.saturating_sub(used));
                Some(used + granted)
            });
        granted
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit > 0 && self.used.load(Ordering::Acquire) >= self.limit
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }
}

/// Outcome of one jurisdiction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JurisdictionSummary {
    pub jurisdiction: String,
    /// Total announced by the server (last search wins).
    pub total: u64,
    pub records: usize,
    pub pages: usize,
    /// Offsets requested, in order.
    pub offsets: Vec<u64>,
    pub empty_pages: usize,
    /// Non-final pages with fewer records than requested (rows clamped by the server).
    pub short_pages: usize,
    pub detail_failures: usize,
    /// Fresh searches issued after the session expired.
    pub recoveries: usize,
    /// Set when the jurisdiction was skipped instead of crawled.
    pub skipped: Option<String>,
}

/// Drives one session through the crawl lifecycle.
pub struct Crawler<T: HttpTransport + ?Sized> {
    session: Session<T>,
    options: CrawlOptions,
    budget: Arc<RecordBudget>,
    state: CrawlState,
}

impl<T: HttpTransport + ?Sized> Crawler<T> {
    pub fn new(http: Arc<T>, target: TargetConfig, options: CrawlOptions) -> Self {
        Self {
            session: Session::new(http, target),
            options,
            budget: Arc::new(RecordBudget::unlimited()),
            state: CrawlState::Idle,
        }
    }

    pub fn with_budget(mut self, budget: Arc<RecordBudget>) -> Self {
        self.budget = budget;
        self
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    /// Load the search page, e.g. to list the jurisdictions on offer.
    pub async fn discover(&self) -> Result<SearchContext, ScrapeError> {
        self.session.load_search_page().await
    }

    fn enter(&mut self, to: CrawlState) {
        if self.state.transition(to) {
            debug!("crawl state -> {}", to);
        } else {
            warn!("Unexpected crawl state change {} -> {}", self.state, to);
            self.state = to;
        }
    }

    /// Load a fresh search page and submit a search for `label`.
    async fn start_search(&mut self, label: &str) -> Result<SearchResult, ScrapeError> {
        let search = self.session.load_search_page().await?;
        self.enter(CrawlState::HasSearchContext);

        let jurisdiction = search
            .jurisdiction(label)
            .ok_or_else(|| ProtocolError::UnknownJurisdiction(label.to_string()))?;
        let result = self.session.search(&search, jurisdiction).await?;
        self.enter(CrawlState::HasResultContext);
        Ok(result)
    }

    /// Crawl every page of one jurisdiction into `sink`.
    pub async fn crawl_jurisdiction<S: RecordSink + ?Sized>(
        &mut self,
        label: &str,
        sink: &Mutex<S>,
    ) -> Result<JurisdictionSummary, JurisdictionError> {
        self.state = CrawlState::Idle;
        let mut summary = JurisdictionSummary {
            jurisdiction: label.to_string(),
            ..Default::default()
        };
        let abort = |offset: u64, view_state: Option<&ViewState>, source: ScrapeError| JurisdictionError {
            jurisdiction: label.to_string(),
            offset,
            view_state_prefix: view_state.map(|v| v.prefix().to_string()).unwrap_or_default(),
            source,
        };

        info!("=== {} ===", label);
        let first = self
            .start_search(label)
            .await
            .map_err(|e| abort(0, None, e))?;
        let mut context = first.context;

        summary.total = match extract_total_count(&first.fragment) {
            Ok(total) => total,
            Err(e) => {
                let err = DataError::Count(e);
                warn!("Skipping {}: {}", label, err);
                summary.skipped = Some(err.to_string());
                self.enter(CrawlState::Exhausted);
                return Ok(summary);
            }
        };
        info!("Total entries for {}: {}", label, summary.total);

        let page_size = self.options.page_size;
        let mut offset = 0u64;

        while offset < summary.total {
            if self.budget.is_exhausted() {
                info!("Record limit reached, stopping {} at offset {}", label, offset);
                break;
            }
            self.enter(CrawlState::Paginating);
            summary.offsets.push(offset);

            let page = match self.session.fetch_page(&mut context, offset, page_size).await {
                Ok(page) => page,
                Err(e) if e.is_session_expired() => {
                    warn!("{}: view expired at offset {}, refreshing search session", label, offset);
                    self.enter(CrawlState::SessionExpired);
                    summary.recoveries += 1;

                    let fresh = self
                        .start_search(label)
                        .await
                        .map_err(|e| abort(offset, Some(&context.view_state), e))?;
                    context = fresh.context;
                    if let Ok(total) = extract_total_count(&fresh.fragment) {
                        if total != summary.total {
                            info!("{}: total changed from {} to {}", label, summary.total, total);
                            summary.total = total;
                        }
                    }
                    self.enter(CrawlState::Paginating);

                    self.session
                        .fetch_page(&mut context, offset, page_size)
                        .await
                        .map_err(|e| abort(offset, Some(&context.view_state), e))?
                }
                Err(e) => return Err(abort(offset, Some(&context.view_state), e)),
            };

            let mut records = extract_records(&page, label);
            let parsed = records.len() as u64;
            if parsed > 0 && parsed < page_size && offset + page_size < summary.total {
                summary.short_pages += 1;
                warn!(
                    "{}: page at offset {} returned {} of {} requested records; the server may clamp rows, records {}..{} are not covered",
                    label,
                    offset,
                    parsed,
                    page_size,
                    offset + parsed,
                    offset + page_size
                );
            }
            if records.is_empty() {
                summary.empty_pages += 1;
                warn!("{}: {}", label, DataError::EmptyPage { offset });
            } else {
                let granted = self.budget.take(records.len());
                records.truncate(granted);

                if self.options.fetch_details {
                    summary.detail_failures += self.attach_details(&mut context, &mut records, offset).await;
                }

                sink.lock()
                    .await
                    .write_records(&records)
                    .map_err(|e| abort(offset, Some(&context.view_state), e.into()))?;
                summary.records += records.len();
                summary.pages += 1;
                info!(
                    "{}: wrote {} records (offset {}), {} so far",
                    label,
                    records.len(),
                    offset,
                    summary.records
                );
            }

            offset += page_size;
            if offset < summary.total && !self.budget.is_exhausted() {
                pause(self.options.delay, self.options.jitter).await;
            }
        }

        self.enter(CrawlState::Exhausted);
        Ok(summary)
    }

    /// Fetch and merge details for every record with a detail link.
    /// Returns the number of failed fetches; failures keep the summary fields.
    async fn attach_details(
        &self,
        context: &mut ResultContext,
        records: &mut [ResultRecord],
        offset: u64,
    ) -> usize {
        let mut failures = 0;
        for record in records.iter_mut() {
            let Some(link_id) = record.detail_link_id.clone() else {
                continue;
            };
            match self.session.fetch_details(context, &link_id).await {
                Ok(details) => record.merge_details(details),
                Err(e) => {
                    failures += 1;
                    warn!(
                        "Failed to fetch details for {} ({} offset {}): {}",
                        record.name, record.jurisdiction, offset, e
                    );
                }
            }
            pause(self.options.delay, self.options.jitter).await;
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_truncates_to_remaining() {
        let budget = RecordBudget::new(10);
        assert_eq!(budget.take(8), 8);
        assert!(!budget.is_exhausted());
        assert_eq!(budget.take(8), 2);
        assert!(budget.is_exhausted());
        assert_eq!(budget.take(1), 0);
        assert_eq!(budget.used(), 10);
    }

    #[test]
    fn test_unlimited_budget() {
        let budget = RecordBudget::unlimited();
        assert_eq!(budget.take(1_000_000), 1_000_000);
        assert!(!budget.is_exhausted());
    }

    #[test]
    fn test_options_from_config() {
        let config = CrawlConfig {
            page_size: 0,
            fetch_details: false,
            ..Default::default()
        };
        let options = CrawlOptions::from(&config);
        assert_eq!(options.page_size, 1);
        assert!(!options.fetch_details);
        assert_eq!(options.delay, Duration::from_millis(250));
    }
}
