//! Exponential retry backoff with jitter.

#![allow(missing_docs)]

use std::time::Duration;

use rand::Rng;

/// Doubling backoff, capped, with ±25% jitter to avoid retry alignment
/// across processes.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
}

impl Backoff {
    #[must_use]
    pub const fn new(base: Duration, cap: Duration) -> Self {
        Self { base, cap }
    }

    /// Deterministic delay before the given retry (attempt numbering starts
    /// at 1 for the first retry): `base * 2^(attempt-1)`, capped.
    #[must_use]
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let factor = 2u64.saturating_pow(exponent);
        let delay = self.base.saturating_mul(u32::try_from(factor).unwrap_or(u32::MAX));
        delay.min(self.cap)
    }

    /// Jittered delay: raw delay scaled by a uniform factor in [0.75, 1.25],
    /// still capped.
    #[must_use]
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let raw = self.raw_delay(attempt);
        let factor = rand::rng().random_range(0.75..=1.25);
        raw.mul_f64(factor).min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_cap() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(1_000));
        assert_eq!(backoff.raw_delay(1), Duration::from_millis(100));
        assert_eq!(backoff.raw_delay(2), Duration::from_millis(200));
        assert_eq!(backoff.raw_delay(3), Duration::from_millis(400));
        assert_eq!(backoff.raw_delay(4), Duration::from_millis(800));
        assert_eq!(backoff.raw_delay(5), Duration::from_millis(1_000));
        assert_eq!(backoff.raw_delay(50), Duration::from_millis(1_000));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(10_000));
        for attempt in 1..6 {
            let raw = backoff.raw_delay(attempt);
            for _ in 0..50 {
                let jittered = backoff.jittered_delay(attempt);
                assert!(jittered >= raw.mul_f64(0.75));
                assert!(jittered <= raw.mul_f64(1.25));
            }
        }
    }

    #[test]
    fn jitter_respects_cap() {
        let backoff = Backoff::new(Duration::from_millis(800), Duration::from_millis(1_000));
        for _ in 0..50 {
            assert!(backoff.jittered_delay(2) <= Duration::from_millis(1_000));
        }
    }
}
