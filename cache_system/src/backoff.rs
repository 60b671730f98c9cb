use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use std::time::Duration;

/// Doubling delays from `min_ms`, capped at `max_ms`, one per retry
pub fn exponential(min_ms: u64, max_ms: u64, retries: u32) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(min_ms))
        .with_max_delay(Duration::from_millis(max_ms))
        .with_factor(2.0)
        .with_max_times(retries as usize)
}

/// The delays a retry loop sleeps through, in order
pub fn delays(builder: ExponentialBuilder) -> ExponentialBackoff {
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_cap() {
        let delays: Vec<Duration> = delays(exponential(500, 5000, 6)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(500),
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000),
                Duration::from_millis(5000),
                Duration::from_millis(5000),
            ]
        );
    }

    #[test]
    fn test_one_delay_per_retry() {
        assert_eq!(delays(exponential(200, 2000, 3)).count(), 3);
        assert_eq!(delays(exponential(200, 2000, 0)).count(), 0);
    }
}
