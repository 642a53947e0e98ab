use std::num::NonZeroU32;
use std::time::Duration;

use super::error::ConfigError;

/// Decision returned by the backoff policy after a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempt budget is spent; the identifier is exhausted.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff with a ceiling and a fixed attempt budget.
///
/// Delay for attempt `n` (1-based) is `min(initial_delay * multiplier^(n-1), max_delay)`.
/// Values are validated at construction so a policy in hand is always usable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(multiplier));
        }
        if initial_delay > max_delay {
            return Err(ConfigError::DelayAboveCeiling {
                initial: initial_delay,
                ceiling: max_delay,
            });
        }
        Ok(Self {
            max_attempts,
            initial_delay,
            multiplier,
            max_delay,
        })
    }

    /// Existence checks: 9 attempts, 1s doubling, capped at 60s.
    pub fn validation_default() -> Self {
        Self {
            max_attempts: 9,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }

    /// Detail fetches: 8 attempts, 1s doubling, capped at 120s.
    pub fn fetch_default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(120),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn next_delay(&self, attempt: u32) -> Result<Duration, ConfigError> {
        if attempt == 0 {
            return Err(ConfigError::InvalidAttempt(attempt));
        }
        Ok(self.delay_for(attempt))
    }

    /// Decide what to do after transient failure of `attempt` (1-based).
    pub fn decide(&self, attempt: u32) -> Result<RetryDecision, ConfigError> {
        let attempt = NonZeroU32::new(attempt).ok_or(ConfigError::InvalidAttempt(attempt))?;
        Ok(self.decide_after(attempt))
    }

    /// [`decide`](Self::decide) for an attempt number that cannot be zero.
    pub fn decide_after(&self, attempt: NonZeroU32) -> RetryDecision {
        if attempt.get() >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        RetryDecision::RetryAfter(self.delay_for(attempt.get()))
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 || self.initial_delay.is_zero() {
            return self.initial_delay;
        }
        // Work in nanoseconds so integral multipliers stay exact.
        let exp = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_nanos() as f64 * self.multiplier.powi(exp);
        let ceiling = self.max_delay.as_nanos() as f64;
        if !(scaled < ceiling) {
            return self.max_delay;
        }
        Duration::from_nanos(scaled.round() as u64)
    }
}
