use std::collections::BTreeSet;
use std::time::Duration;

/// Exponential backoff settings for transient HTTP failures.
///
/// Built once from [`crate::config::Config`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    retryable_status_codes: BTreeSet<u16>,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one and a zero `base_delay` is bumped to 1ms.
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        retryable_status_codes: impl IntoIterator<Item = u16>,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: base_delay.max(Duration::from_millis(1)),
            retryable_status_codes: retryable_status_codes.into_iter().collect(),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn retryable_status_codes(&self) -> &BTreeSet<u16> {
        &self.retryable_status_codes
    }

    pub fn is_retryable(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Delay before re-sending after the zero-based `attempt_index` failed:
    /// `base_delay * 2^attempt_index`, saturating instead of overflowing.
    pub fn delay_for_attempt(&self, attempt_index: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt_index).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Whether another attempt remains after the zero-based `attempt_index`.
    pub fn has_attempt_after(&self, attempt_index: u32) -> bool {
        attempt_index.saturating_add(1) < self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1), [429, 500, 503])
    }
}
