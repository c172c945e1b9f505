//! Per-domain rate limiting state.

use std::time::{Duration, Instant};

/// State for a single domain.
#[derive(Debug, Clone)]
pub struct DomainState {
    pub current_delay: Duration,
    pub last_request: Option<Instant>,
    /// Consecutive successes since the last backoff step.
    pub consecutive_successes: u32,
    pub in_backoff: bool,
    pub total_requests: u64,
    pub rate_limit_hits: u64,
}

impl DomainState {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            current_delay: base_delay,
            last_request: None,
            consecutive_successes: 0,
            in_backoff: false,
            total_requests: 0,
            rate_limit_hits: 0,
        }
    }

    /// Scale the delay, clamped to `[min, max]`.
    pub fn scale_delay(&mut self, factor: f64, min: Duration, max: Duration) {
        let scaled = Duration::from_secs_f64(self.current_delay.as_secs_f64() * factor);
        self.current_delay = scaled.clamp(min, max);
    }

    /// Time until this domain is ready for another request.
    pub fn time_until_ready(&self) -> Duration {
        match self.last_request {
            Some(last) => self.current_delay.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_delay_is_clamped() {
        let mut state = DomainState::new(Duration::from_millis(100));
        state.scale_delay(100.0, Duration::ZERO, Duration::from_secs(1));
        assert_eq!(state.current_delay, Duration::from_secs(1));
        state.scale_delay(0.0, Duration::from_millis(50), Duration::from_secs(1));
        assert_eq!(state.current_delay, Duration::from_millis(50));
    }

    #[test]
    fn test_fresh_domain_is_ready() {
        let state = DomainState::new(Duration::from_secs(10));
        assert_eq!(state.time_until_ready(), Duration::ZERO);
    }
}
