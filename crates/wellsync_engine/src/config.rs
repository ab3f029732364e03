//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for a user's sync passes.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// User whose data this engine syncs. Passes are single-flight per user.
    pub user_id: String,
    /// Device identifier, unique per installation.
    pub device_id: String,
    /// Entity kinds tracked during the pull phase.
    pub kinds: Vec<String>,
    /// Retry configuration for transient transport errors.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(user_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            device_id: device_id.into(),
            kinds: Vec::new(),
            retry: RetryConfig::default(),
        }
    }

    /// Adds an entity kind to track during pulls.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kinds.push(kind.into());
        self
    }

    /// Sets the tracked entity kinds.
    #[must_use]
    pub fn with_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Backoff policy for transient transport failures.
///
/// The attempt budget covers the whole push of one entity: the first try
/// plus its retries. Delays grow geometrically from `initial_delay`, are
/// clamped at `max_delay`, and carry up to 25% jitter so retries from
/// several devices do not align.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts per entity, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Clamp applied to every computed delay.
    pub max_delay: Duration,
    /// Geometric growth factor between consecutive delays.
    pub backoff_multiplier: f64,
    /// Whether delays carry jitter.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a policy with the given attempt budget and default pacing.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Single attempt, no backoff.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1)
            .with_initial_delay(Duration::ZERO)
            .with_max_delay(Duration::ZERO)
            .with_backoff_multiplier(1.0)
            .without_jitter()
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the delay clamp.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the geometric growth factor.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Disables jitter, making delays deterministic.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Delay to wait before the given attempt (0-indexed).
    ///
    /// Attempt 0 runs immediately; attempt `n` waits
    /// `initial_delay * multiplier^(n-1)`, clamped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let growth = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let mut secs = self.initial_delay.as_secs_f64() * growth;
        if secs > self.max_delay.as_secs_f64() {
            secs = self.max_delay.as_secs_f64();
        }
        if self.add_jitter {
            secs += secs * 0.25 * subsec_fraction();
        }
        Duration::from_secs_f64(secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Jitter fraction in `[0, 1)` folded out of the clock's sub-second nanos.
/// Enough spread to de-align concurrent retries without an RNG crate.
fn subsec_fraction() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 997) / 997.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("u1", "device-a")
            .with_kind("goal")
            .with_kind("meal_log")
            .with_retry(RetryConfig::no_retry());

        assert_eq!(config.user_id, "u1");
        assert_eq!(config.device_id, "device-a");
        assert_eq!(config.kinds, vec!["goal", "meal_log"]);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn with_kinds_replaces_list() {
        let config = SyncConfig::new("u1", "d1")
            .with_kind("goal")
            .with_kinds(["supplement", "pantry_item"]);
        assert_eq!(config.kinds, vec!["supplement", "pantry_item"]);
    }

    #[test]
    fn first_attempt_is_immediate() {
        assert_eq!(RetryConfig::default().delay_for_attempt(0), Duration::ZERO);
        assert_eq!(RetryConfig::no_retry().delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn delays_grow_geometrically() {
        let config = RetryConfig::new(4)
            .with_initial_delay(Duration::from_millis(50))
            .with_backoff_multiplier(3.0)
            .without_jitter();

        let delays: Vec<Duration> = (1..=3).map(|a| config.delay_for_attempt(a)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(50),
                Duration::from_millis(150),
                Duration::from_millis(450),
            ]
        );
    }

    #[test]
    fn delays_are_clamped() {
        let config = RetryConfig::new(8)
            .with_initial_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(2))
            .without_jitter();

        // Attempt 3 would be 2s unclamped; everything past it pins there.
        for attempt in 3..8 {
            assert_eq!(config.delay_for_attempt(attempt), Duration::from_secs(2));
        }
    }

    #[test]
    fn jitter_adds_at_most_a_quarter() {
        let config = RetryConfig::new(3).with_initial_delay(Duration::from_millis(200));

        for _ in 0..32 {
            let delay = config.delay_for_attempt(1);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay < Duration::from_millis(250));
        }
    }
}
