//! Error taxonomy for the crawler.
//!
//! Transport failures are retried by the HTTP client before they surface here.
//! Protocol errors are never retried automatically, except for
//! [`ProtocolError::SessionExpired`] which the crawl state machine answers
//! with one fresh search.

use thiserror::Error;

/// Network-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {method} {url} failed after {attempts} attempts: {last}")]
    Exhausted {
        method: &'static str,
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Invalid proxy URL {url}: {source}")]
    InvalidProxy {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Proxy list request failed: {0}")]
    ProxySource(String),
}

/// The server answered, but not in the shape the protocol requires.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("No ViewState found{}", keys_suffix(.keys))]
    NoViewState { keys: Option<String> },

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Exchange returned no {target} update. Update keys: {keys}")]
    MissingUpdate { target: String, keys: String },

    #[error("AJAX request returned an empty response")]
    EmptyResponse,

    #[error("AJAX request returned a full HTML page instead of a partial response: {snippet}")]
    UnexpectedFullPage { snippet: String },

    #[error("Malformed partial response: {0}")]
    MalformedEnvelope(String),

    #[error("Server reported {name}: {message}")]
    ServerError { name: String, message: String },

    #[error("Could not obtain the search page from any candidate URL. Last error: {last}")]
    SearchPageUnavailable { last: String },

    #[error("Jurisdiction {0:?} is not offered by the search form")]
    UnknownJurisdiction(String),

    #[error("Could not parse total result count")]
    CountNotFound,

    #[error("View expired (server returned {returned} instead of {expected})")]
    SessionExpired { expected: String, returned: String },
}

fn keys_suffix(keys: &Option<String>) -> String {
    match keys {
        Some(keys) => format!(" (update keys: {})", keys),
        None => String::new(),
    }
}

impl ProtocolError {
    /// True when the server silently dropped the session back to the search view.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ProtocolError::SessionExpired { .. })
    }
}

/// A well-formed fragment whose content could not be interpreted.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Result count unavailable: {0}")]
    Count(#[source] ProtocolError),

    #[error("Page at offset {offset} contained no result cards")]
    EmptyPage { offset: u64 },
}

/// Failure writing records to the output sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Any error raised while crawling.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl ScrapeError {
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ScrapeError::Protocol(e) if e.is_session_expired())
    }
}

/// A jurisdiction crawl that was aborted, with enough context to resume by hand.
#[derive(Debug, Error)]
#[error("Jurisdiction {jurisdiction:?} aborted at offset {offset} (view state {view_state_prefix}): {source}")]
pub struct JurisdictionError {
    pub jurisdiction: String,
    pub offset: u64,
    pub view_state_prefix: String,
    #[source]
    pub source: ScrapeError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expired_detection() {
        let err: ScrapeError = ProtocolError::SessionExpired {
            expected: "resultForm".into(),
            returned: "searchForm".into(),
        }
        .into();
        assert!(err.is_session_expired());

        let err: ScrapeError = ProtocolError::CountNotFound.into();
        assert!(!err.is_session_expired());
    }

    #[test]
    fn test_no_view_state_message() {
        let err = ProtocolError::NoViewState {
            keys: Some("a, b".into()),
        };
        assert_eq!(err.to_string(), "No ViewState found (update keys: a, b)");
        let err = ProtocolError::NoViewState { keys: None };
        assert_eq!(err.to_string(), "No ViewState found");
    }
}
