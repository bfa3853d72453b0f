//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::ScalingConfig;

/// Exponential backoff policy, capped at `max_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    pub fn from_config(config: &ScalingConfig) -> Self {
        Self::new(config.retry_base_delay_ms, config.retry_max_delay_ms)
    }

    /// Delay before retry number `attempt` (1-based). Attempt 0 waits nothing.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponential_base = 2u64.saturating_pow(attempt - 1);
        let capped_delay = self.base_ms.saturating_mul(exponential_base).min(self.max_ms);

        // Jitter of up to 10% on top of the capped delay.
        let jitter_range = capped_delay / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped_delay + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_then_caps() {
        let backoff = Backoff::new(100, 1000);
        assert_eq!(backoff.delay(0), Duration::ZERO);

        let first = backoff.delay(1).as_millis();
        assert!((100..110).contains(&first));

        let second = backoff.delay(2).as_millis();
        assert!((200..220).contains(&second));

        let capped = backoff.delay(10).as_millis();
        assert!((1000..1100).contains(&capped));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let backoff = Backoff::new(u64::MAX / 2, u64::MAX / 2);
        let _ = backoff.delay(u32::MAX);
    }
}
