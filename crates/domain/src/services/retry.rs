//! Retry delay calculation with exponential backoff and jitter.
//!
//! Formula: `delay = min(initial_delay * 2^retry_count, max_delay) ± 20%`.
//! The jitter decorrelates retries across workers after a vendor recovers.

use std::time::Duration;

use rand::Rng;
use thiserror::Error;

/// Jitter percentage (±20%).
const JITTER_FACTOR: f64 = 0.2;

/// Shift width at which `2^retry_count` no longer fits in a u64.
const MAX_SHIFT: u32 = 62;

#[derive(Debug, Error)]
pub enum RetryPolicyError {
    #[error("initial delay must be positive")]
    NonPositiveInitialDelay,

    #[error("max delay must be positive")]
    NonPositiveMaxDelay,

    #[error("max delay must be >= initial delay")]
    MaxDelayBelowInitial,
}

/// Source of uniform random values in `[0, 1)`.
///
/// Injectable so tests can pin the jitter to a known value.
pub trait JitterSource: Send + Sync {
    fn next_unit(&self) -> f64;
}

/// Default jitter source backed by the thread-local RNG.
#[derive(Debug, Default)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn next_unit(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Computes retry delays from the attempt count.
pub struct RetryDelayCalculator {
    initial_delay: Duration,
    max_delay: Duration,
    jitter: Box<dyn JitterSource>,
}

impl RetryDelayCalculator {
    /// Creates a calculator with the thread-local RNG as jitter source.
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Result<Self, RetryPolicyError> {
        Self::with_jitter(initial_delay, max_delay, Box::new(ThreadRngJitter))
    }

    /// Creates a calculator with an explicit jitter source.
    pub fn with_jitter(
        initial_delay: Duration,
        max_delay: Duration,
        jitter: Box<dyn JitterSource>,
    ) -> Result<Self, RetryPolicyError> {
        if initial_delay.is_zero() {
            return Err(RetryPolicyError::NonPositiveInitialDelay);
        }
        if max_delay.is_zero() {
            return Err(RetryPolicyError::NonPositiveMaxDelay);
        }
        if max_delay < initial_delay {
            return Err(RetryPolicyError::MaxDelayBelowInitial);
        }

        Ok(Self {
            initial_delay,
            max_delay,
            jitter,
        })
    }

    /// Calculates the delay before retry number `retry_count + 1`, with
    /// jitter applied. The result is always at least 1 ms.
    pub fn calculate_delay(&self, retry_count: u32) -> Duration {
        self.apply_jitter(self.base_delay(retry_count))
    }

    /// Base delay without jitter: `min(initial * 2^retry_count, max)`.
    ///
    /// For `retry_count >= 62` the power is not computed at all; the result
    /// clamps to `max_delay` directly.
    pub fn base_delay(&self, retry_count: u32) -> Duration {
        if retry_count >= MAX_SHIFT {
            return self.max_delay;
        }

        let initial_millis = self.initial_delay.as_millis() as u64;
        let max_millis = self.max_delay.as_millis() as u64;
        let multiplier = 1u64 << retry_count;

        // Compare before multiplying so the product cannot overflow.
        if multiplier > max_millis / initial_millis.max(1) {
            self.max_delay
        } else {
            Duration::from_millis((initial_millis * multiplier).min(max_millis))
        }
    }

    fn apply_jitter(&self, base: Duration) -> Duration {
        let base_millis = base.as_millis() as f64;
        let jitter_range = base_millis * JITTER_FACTOR;

        // next_unit() is [0, 1); scale to [-1, 1).
        let unit = self.jitter.next_unit() * 2.0 - 1.0;
        let with_jitter = (base_millis + jitter_range * unit) as i64;

        Duration::from_millis(with_jitter.max(1) as u64)
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Jitter source that always yields the same unit value.
    struct FixedJitter(f64);

    impl JitterSource for FixedJitter {
        fn next_unit(&self) -> f64 {
            self.0
        }
    }

    fn calculator(initial_ms: u64, max_ms: u64, unit: f64) -> RetryDelayCalculator {
        RetryDelayCalculator::with_jitter(
            Duration::from_millis(initial_ms),
            Duration::from_millis(max_ms),
            Box::new(FixedJitter(unit)),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_zero_initial_delay() {
        let result = RetryDelayCalculator::new(Duration::ZERO, Duration::from_secs(1));
        assert!(matches!(
            result,
            Err(RetryPolicyError::NonPositiveInitialDelay)
        ));
    }

    #[test]
    fn test_rejects_zero_max_delay() {
        let result = RetryDelayCalculator::new(Duration::from_secs(1), Duration::ZERO);
        assert!(matches!(result, Err(RetryPolicyError::NonPositiveMaxDelay)));
    }

    #[test]
    fn test_rejects_max_below_initial() {
        let result = RetryDelayCalculator::new(Duration::from_secs(2), Duration::from_secs(1));
        assert!(matches!(
            result,
            Err(RetryPolicyError::MaxDelayBelowInitial)
        ));
    }

    #[test]
    fn test_base_delay_doubles_per_retry() {
        let calc = calculator(100, 3_600_000, 0.5);
        assert_eq!(calc.base_delay(0), Duration::from_millis(100));
        assert_eq!(calc.base_delay(1), Duration::from_millis(200));
        assert_eq!(calc.base_delay(2), Duration::from_millis(400));
        assert_eq!(calc.base_delay(5), Duration::from_millis(3_200));
    }

    #[test]
    fn test_base_delay_clamps_to_max() {
        let calc = calculator(1_000, 8_000, 0.5);
        assert_eq!(calc.base_delay(3), Duration::from_millis(8_000));
        assert_eq!(calc.base_delay(10), Duration::from_millis(8_000));
    }

    #[test]
    fn test_base_delay_clamps_without_overflow_for_huge_counts() {
        let calc = calculator(1, 3_600_000, 0.5);
        assert_eq!(calc.base_delay(61), calc.max_delay());
        assert_eq!(calc.base_delay(62), calc.max_delay());
        assert_eq!(calc.base_delay(u32::MAX), calc.max_delay());
    }

    #[test]
    fn test_jitter_midpoint_preserves_base() {
        // unit 0.5 maps to zero jitter.
        let calc = calculator(1_000, 3_600_000, 0.5);
        assert_eq!(calc.calculate_delay(0), Duration::from_millis(1_000));
    }

    #[test]
    fn test_jitter_lower_bound_is_eighty_percent() {
        // unit 0.0 maps to -20%.
        let calc = calculator(1_000, 3_600_000, 0.0);
        assert_eq!(calc.calculate_delay(0), Duration::from_millis(800));
        assert_eq!(calc.calculate_delay(2), Duration::from_millis(3_200));
    }

    #[test]
    fn test_jitter_upper_bound_approaches_120_percent() {
        // unit just below 1.0 maps to just below +20%.
        let calc = calculator(1_000, 3_600_000, 0.999_999);
        let delay = calc.calculate_delay(0);
        assert!(delay >= Duration::from_millis(1_199));
        assert!(delay < Duration::from_millis(1_200));
    }

    #[test]
    fn test_delay_floor_is_one_millisecond() {
        // base 1ms with full negative jitter still returns 1ms.
        let calc = calculator(1, 3_600_000, 0.0);
        assert_eq!(calc.calculate_delay(0), Duration::from_millis(1));
    }

    #[test]
    fn test_random_jitter_stays_inside_window() {
        let calc =
            RetryDelayCalculator::new(Duration::from_millis(1_000), Duration::from_secs(3_600))
                .unwrap();
        for retry_count in 0..6 {
            let base = calc.base_delay(retry_count).as_millis() as f64;
            for _ in 0..100 {
                let delay = calc.calculate_delay(retry_count).as_millis() as f64;
                assert!(delay >= base * 0.8 - 1.0, "delay {} below window", delay);
                assert!(delay < base * 1.2 + 1.0, "delay {} above window", delay);
            }
        }
    }
}
