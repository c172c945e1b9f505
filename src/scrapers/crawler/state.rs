//! Crawl lifecycle of one jurisdiction.

use std::fmt;

/// Where a crawler is in the search/paginate cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrawlState {
    #[default]
    Idle,
    /// A search page was loaded and its identifiers extracted.
    HasSearchContext,
    /// A search was submitted; paging identifiers are known.
    HasResultContext,
    Paginating,
    /// The server dropped the result view; a fresh search is required.
    SessionExpired,
    /// Every page of the jurisdiction was fetched or the record budget ran out.
    Exhausted,
}

impl CrawlState {
    pub fn can_transition(self, to: CrawlState) -> bool {
        use CrawlState::*;
        matches!(
            (self, to),
            (Idle, HasSearchContext)
                | (HasSearchContext, HasResultContext)
                | (HasResultContext, Paginating)
                | (HasResultContext, Exhausted)
                | (Paginating, Paginating)
                | (Paginating, SessionExpired)
                | (Paginating, Exhausted)
                | (SessionExpired, HasSearchContext)
                | (Exhausted, Idle)
        )
    }

    /// Move to `to` if the lifecycle allows it. Returns whether it did.
    pub fn transition(&mut self, to: CrawlState) -> bool {
        if self.can_transition(to) {
            *self = to;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrawlState::Idle => "idle",
            CrawlState::HasSearchContext => "has-search-context",
            CrawlState::HasResultContext => "has-result-context",
            CrawlState::Paginating => "paginating",
            CrawlState::SessionExpired => "session-expired",
            CrawlState::Exhausted => "exhausted",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_with_recovery() {
        let mut state = CrawlState::Idle;
        for next in [
            CrawlState::HasSearchContext,
            CrawlState::HasResultContext,
            CrawlState::Paginating,
            CrawlState::Paginating,
            CrawlState::SessionExpired,
            CrawlState::HasSearchContext,
            CrawlState::HasResultContext,
            CrawlState::Paginating,
            CrawlState::Exhausted,
            CrawlState::Idle,
        ] {
            assert!(state.transition(next), "{} -> {}", state, next);
        }
    }

    #[test]
    fn test_rejected_transitions() {
        let mut state = CrawlState::Idle;
        assert!(!state.transition(CrawlState::Paginating));
        assert_eq!(state, CrawlState::Idle);
        assert!(!CrawlState::HasSearchContext.can_transition(CrawlState::Paginating));
        assert!(!CrawlState::Exhausted.can_transition(CrawlState::Paginating));
    }
}
