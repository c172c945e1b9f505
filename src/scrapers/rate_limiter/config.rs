//! Rate limiter tuning.

use std::time::Duration;

/// Adaptive delay parameters.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Spacing between requests when not backing off.
    pub base_delay: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Factor applied to the delay on 429/503.
    pub backoff_multiplier: f64,
    /// Factor applied to the delay once `recovery_threshold` successes accumulate.
    pub recovery_multiplier: f64,
    pub recovery_threshold: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::ZERO,
            min_delay: Duration::ZERO,
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.5,
            recovery_threshold: 5,
        }
    }
}

/// Snapshot of one domain's limiter state.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainStats {
    pub current_delay: Duration,
    pub in_backoff: bool,
    pub total_requests: u64,
    pub rate_limit_hits: u64,
}
