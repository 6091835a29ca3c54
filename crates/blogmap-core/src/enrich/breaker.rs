//! Circuit breaker for HTML enrichment.
//!
//! A site that blocks scrapers fails every fetch. Once `threshold` fetches
//! have been launched without a single success, the breaker trips and
//! further fetches are refused. One success disarms it for good, even when
//! it arrives after the trip (a batch wider than the threshold can trip the
//! breaker before its own results are in).

/// Default number of failed attempts before the breaker trips.
pub const DEFAULT_THRESHOLD: usize = 3;

/// Per-run breaker state, owned by the enrichment loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreaker {
    attempted: usize,
    succeeded: usize,
    threshold: usize,
    threshold_exceeded: bool,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    #[must_use]
    pub const fn new(threshold: usize) -> Self {
        Self {
            attempted: 0,
            succeeded: 0,
            threshold,
            threshold_exceeded: false,
        }
    }

    /// Ask to launch one fetch.
    ///
    /// Returns `false` (and trips the breaker) while `attempted >= threshold`
    /// with no successes. A granted request counts as attempted immediately.
    pub fn try_acquire(&mut self) -> bool {
        if self.succeeded == 0 && self.attempted >= self.threshold {
            if !self.threshold_exceeded {
                self.threshold_exceeded = true;
                tracing::warn!(
                    attempted = self.attempted,
                    "HTML fetches keep failing; skipping enrichment for remaining posts"
                );
            }
            return false;
        }

        self.attempted += 1;
        true
    }

    /// Record a completed, successful fetch. Closes a tripped breaker.
    pub fn record_success(&mut self) {
        self.succeeded += 1;
        if self.threshold_exceeded {
            self.threshold_exceeded = false;
            tracing::debug!(
                attempted = self.attempted,
                "HTML fetch succeeded after the breaker tripped; resuming enrichment"
            );
        }
    }

    /// Fetches launched so far.
    #[must_use]
    pub const fn attempted(&self) -> usize {
        self.attempted
    }

    /// Fetches that succeeded so far.
    #[must_use]
    pub const fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Whether the breaker has tripped.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.threshold_exceeded
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::disallowed_macros)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_after_threshold_failures() {
        let mut breaker = CircuitBreaker::default();
        assert!(breaker.try_acquire());
        assert!(breaker.try_acquire());
        assert!(breaker.try_acquire());
        assert!(!breaker.is_open());

        assert!(!breaker.try_acquire());
        assert!(breaker.is_open());
        assert_eq!(breaker.attempted(), 3);

        assert!(!breaker.try_acquire());
        assert_eq!(breaker.attempted(), 3);
    }

    #[test]
    fn test_late_success_closes_tripped_breaker() {
        let mut breaker = CircuitBreaker::default();
        for _ in 0..3 {
            assert!(breaker.try_acquire());
        }
        assert!(!breaker.try_acquire());
        assert!(breaker.is_open());

        breaker.record_success();
        assert!(!breaker.is_open());
        for _ in 0..5 {
            assert!(breaker.try_acquire());
        }
        assert_eq!(breaker.attempted(), 8);
    }

    #[test]
    fn test_success_disarms() {
        let mut breaker = CircuitBreaker::new(2);
        assert!(breaker.try_acquire());
        breaker.record_success();
        for _ in 0..10 {
            assert!(breaker.try_acquire());
        }
        assert_eq!(breaker.attempted(), 11);
        assert_eq!(breaker.succeeded(), 1);
        assert!(!breaker.is_open());
    }

    #[test]
    fn test_zero_threshold_never_fetches() {
        let mut breaker = CircuitBreaker::new(0);
        assert!(!breaker.try_acquire());
        assert!(breaker.is_open());
    }
}
