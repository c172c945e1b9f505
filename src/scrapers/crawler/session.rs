//! Protocol steps of a crawl: search page load, search, page and detail fetches.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::TargetConfig;
use crate::error::{ProtocolError, ScrapeError};
use crate::jsf::{
    classify, extract_details, extract_result_context, extract_search_context, AjaxTransport,
    Classified, Exchange,
};
use crate::models::{Jurisdiction, ResultContext, SearchContext};
use crate::scrapers::HttpTransport;

const SEARCH_EVENT: &str = "click";
const PAGE_EVENT: &str = "page";
const CACHE_BUSTER_MAX: u32 = 10_000_000;

/// A submitted search: paging identifiers plus the first rendered fragment.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub context: ResultContext,
    pub fragment: String,
}

/// Protocol steps bound to one HTTP session.
pub struct Session<T: HttpTransport + ?Sized> {
    ajax: AjaxTransport<T>,
    target: TargetConfig,
}

impl<T: HttpTransport + ?Sized> Session<T> {
    pub fn new(http: Arc<T>, target: TargetConfig) -> Self {
        Self {
            ajax: AjaxTransport::new(http, &target),
            target,
        }
    }

    /// Fetch a full search page and extract its [`SearchContext`].
    ///
    /// Candidate URLs are tried in order, each with a cache buster. A candidate
    /// is accepted when it is a full document containing the search form and
    /// a view state.
    pub async fn load_search_page(&self) -> Result<SearchContext, ScrapeError> {
        let headers = [
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            ),
            ("Referer", self.target.ajax_url()),
        ];
        let form_marker = format!("id=\"{}\"", self.target.search_form_id);
        let mut last = String::from("no candidate URLs configured");

        for url in self.target.search_urls() {
            let candidate = with_cache_buster(&url);
            debug!("GET candidate search URL: {}", candidate);

            let body = match self.ajax.http().get(&candidate, &headers).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Search page candidate {} failed: {}", url, e);
                    last = e.to_string();
                    continue;
                }
            };

            let html = match classify(&body) {
                Ok(Classified::Full(html)) => html,
                Ok(Classified::Partial(_)) => {
                    last = format!("Got partial-response XML from GET {}", url);
                    continue;
                }
                Err(e) => {
                    last = format!("Undecodable response from GET {}: {}", url, e);
                    continue;
                }
            };

            if !html.contains(&form_marker) {
                last = format!("No {} in GET {}", self.target.search_form_id, url);
                continue;
            }
            if let Err(e) = crate::jsf::extract_view_state(&html) {
                last = format!("ViewState missing in GET {}: {}", url, e);
                continue;
            }

            return Ok(extract_search_context(&html, &self.target)?);
        }

        Err(ProtocolError::SearchPageUnavailable { last }.into())
    }

    /// Submit a search for one jurisdiction.
    pub async fn search(
        &self,
        search: &SearchContext,
        jurisdiction: &Jurisdiction,
    ) -> Result<SearchResult, ScrapeError> {
        let mut exchange = Exchange::new(search.prefix, &search.form_id, &search.submit_id)
            .execute(&search.form_id)
            .render(&self.target.result_region)
            .event(SEARCH_EVENT)
            .extra(&search.jurisdiction_field, &jurisdiction.value);
        if let Some(language_field) = &search.language_field {
            exchange = exchange.extra(language_field, &self.target.language);
        }

        let outcome = self.ajax.exchange(&exchange, &search.view_state).await?;
        let fragment = outcome
            .updates
            .non_empty(&self.target.result_region)
            .ok_or_else(|| ProtocolError::MissingUpdate {
                target: self.target.result_region.clone(),
                keys: outcome.updates.keys_joined(),
            })?
            .to_string();

        let context =
            extract_result_context(&fragment, outcome.view_state, search.prefix, &self.target)?;
        Ok(SearchResult { context, fragment })
    }

    /// Fetch the page starting at `offset`. The context's view state is
    /// advanced after each of the two exchanges.
    pub async fn fetch_page(
        &self,
        context: &mut ResultContext,
        offset: u64,
        rows: u64,
    ) -> Result<String, ScrapeError> {
        let paging = page_fields(&context.grid_id, offset, rows);

        let select = Exchange::new(context.prefix, &context.form_id, &context.grid_id)
            .execute(&context.grid_id)
            .event(PAGE_EVENT)
            .extras(paging.clone());
        let outcome = self.ajax.exchange(&select, &context.view_state).await?;
        context.view_state = outcome.view_state;

        let refresh = Exchange::new(context.prefix, &context.form_id, &context.refresh_id)
            .execute(&context.form_id)
            .render(&context.form_id)
            .extras(paging);
        let outcome = self.ajax.exchange(&refresh, &context.view_state).await?;
        context.view_state = outcome.view_state;

        if let Some(html) = outcome.updates.non_empty(&context.form_id) {
            return Ok(html.to_string());
        }

        if outcome.updates.targets(&self.target.search_form_id) {
            return Err(ProtocolError::SessionExpired {
                expected: context.form_id.clone(),
                returned: self.target.search_form_id.clone(),
            }
            .into());
        }
        Err(ProtocolError::MissingUpdate {
            target: context.form_id.clone(),
            keys: outcome.updates.keys_joined(),
        }
        .into())
    }

    /// Open a record's detail view and extract its fields.
    pub async fn fetch_details(
        &self,
        context: &mut ResultContext,
        link_id: &str,
    ) -> Result<BTreeMap<String, String>, ScrapeError> {
        let exchange = Exchange::new(context.prefix, &context.form_id, link_id)
            .render(&self.target.detail_region);
        let outcome = self.ajax.exchange(&exchange, &context.view_state).await?;
        context.view_state = outcome.view_state;

        let html = outcome
            .updates
            .non_empty(&self.target.detail_region)
            .ok_or_else(|| ProtocolError::MissingUpdate {
                target: self.target.detail_region.clone(),
                keys: outcome.updates.keys_joined(),
            })?;
        Ok(extract_details(html))
    }
}

/// Data-grid paging parameters for a page request.
pub fn page_fields(grid_id: &str, offset: u64, rows: u64) -> Vec<(String, String)> {
    let page = if rows > 0 { offset / rows } else { 0 };
    vec![
        (format!("{}_pagination", grid_id), "true".to_string()),
        (format!("{}_first", grid_id), offset.to_string()),
        (format!("{}_rows", grid_id), rows.to_string()),
        (format!("{}_page", grid_id), page.to_string()),
        (format!("{}_encodeFeature", grid_id), "true".to_string()),
    ]
}

fn with_cache_buster(url: &str) -> String {
    if url.contains('?') {
        return url.to_string();
    }
    let n = rand::rng().random_range(1..=CACHE_BUSTER_MAX);
    format!("{}?_cb={}", url, n)
}
