//! Token Budget - rate-limited escalation allowance.
//!
//! A per-process token bucket that damps oscillation: every escalation
//! consumes tokens, tokens refill at a fixed rate, and exhaustion is the
//! machine's cue to stop negotiating and jump straight to quarantine.
//! An attacker probing the detector with near-threshold behavior burns
//! the budget and ends up quarantined instead of flapping forever.

use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Per-process escalation allowance.
///
/// Tokens are fractional internally so slow refill rates accrue smoothly;
/// `remaining()` is clamped and never observed negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBudget {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill_nanos: i64,
}

impl TokenBudget {
    /// New budget, filled to capacity.
    pub fn new(capacity: f64, refill_per_sec: f64, now_nanos: i64) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec,
            last_refill_nanos: now_nanos,
        }
    }

    /// Accrue refill for elapsed time. Idempotent for equal timestamps;
    /// clock regressions accrue nothing.
    pub fn refill(&mut self, now_nanos: i64) {
        let elapsed = now_nanos.saturating_sub(self.last_refill_nanos);
        if elapsed <= 0 {
            return;
        }
        let gained = (elapsed as f64 / NANOS_PER_SEC) * self.refill_per_sec;
        self.tokens = (self.tokens + gained).min(self.capacity);
        self.last_refill_nanos = now_nanos;
    }

    /// All-or-nothing consume. Returns false (and leaves the balance
    /// untouched) when fewer than `cost` tokens remain.
    pub fn try_consume(&mut self, cost: f64) -> bool {
        if self.tokens >= cost {
            self.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Drop the balance to zero. Used when a forced quarantine supersedes
    /// a computed transition.
    pub fn drain(&mut self) {
        self.tokens = 0.0;
    }

    /// Refill to capacity. Used on operator release.
    pub fn reset(&mut self, now_nanos: i64) {
        self.tokens = self.capacity;
        self.last_refill_nanos = now_nanos;
    }

    /// Remaining whole-and-fractional tokens, never negative.
    pub fn remaining(&self) -> f64 {
        self.tokens.max(0.0)
    }

    /// Less than one whole token left.
    pub fn is_exhausted(&self) -> bool {
        self.tokens < 1.0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: i64 = 1_000_000_000;

    #[test]
    fn test_starts_full() {
        let b = TokenBudget::new(5.0, 1.0, 0);
        assert_eq!(b.remaining(), 5.0);
        assert!(!b.is_exhausted());
    }

    #[test]
    fn test_consume_all_or_nothing() {
        let mut b = TokenBudget::new(3.0, 1.0, 0);
        assert!(b.try_consume(2.0));
        assert_eq!(b.remaining(), 1.0);
        // 1 remaining, cost 2: refused, balance untouched
        assert!(!b.try_consume(2.0));
        assert_eq!(b.remaining(), 1.0);
    }

    #[test]
    fn test_never_negative() {
        let mut b = TokenBudget::new(1.0, 0.5, 0);
        assert!(b.try_consume(1.0));
        assert!(!b.try_consume(0.5));
        assert!(b.remaining() >= 0.0);
        b.drain();
        assert_eq!(b.remaining(), 0.0);
    }

    #[test]
    fn test_refill_rate() {
        let mut b = TokenBudget::new(10.0, 2.0, 0);
        b.drain();
        b.refill(3 * SEC);
        assert!((b.remaining() - 6.0).abs() < 1e-9);
        // Caps at capacity
        b.refill(100 * SEC);
        assert_eq!(b.remaining(), 10.0);
    }

    #[test]
    fn test_clock_regression_accrues_nothing() {
        let mut b = TokenBudget::new(4.0, 1.0, 10 * SEC);
        b.drain();
        b.refill(5 * SEC);
        assert_eq!(b.remaining(), 0.0);
    }

    #[test]
    fn test_exhaustion_boundary() {
        let mut b = TokenBudget::new(2.0, 1.0, 0);
        assert!(b.try_consume(1.5));
        assert!(b.is_exhausted());
        b.refill(SEC);
        assert!(!b.is_exhausted());
    }
}
