//! Exponential backoff with jitter, used between broker reconnect attempts.

use std::time::Duration;
use rand::Rng;

/// Base delay before the first reconnect attempt.
pub const RECONNECT_BASE_MS: u64 = 500;
/// Upper bound on the delay between reconnect attempts.
pub const RECONNECT_MAX_MS: u64 = 30_000;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Delay before reconnect attempt number `attempt` (1-based).
pub fn reconnect_delay(attempt: u32) -> Duration {
    calculate_backoff(attempt, RECONNECT_BASE_MS, RECONNECT_MAX_MS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);

        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100 && b1.as_millis() < 110);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000 && max.as_millis() < 1100);
    }

    #[test]
    fn test_reconnect_delay_is_capped() {
        let delay = reconnect_delay(u32::MAX);
        assert!(delay >= Duration::from_millis(RECONNECT_MAX_MS));
        assert!(delay < Duration::from_millis(RECONNECT_MAX_MS + RECONNECT_MAX_MS / 10));
    }
}
