//! Retry loop: drive one identifier to a terminal classification.

use std::num::NonZeroU32;
use std::time::Duration;

use super::classify::{classify, failure_kind, Classification, FetchOutcome};
use super::error::TransportError;
use super::policy::{BackoffPolicy, RetryDecision};
use crate::types::{AppId, Payload, Phase};

/// Terminal verdict for one identifier after all attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationResult {
    Succeeded(Payload),
    NonExistent,
    /// Attempt budget exhausted on transient failures.
    Failed,
}

/// Blocks the caller for a backoff or throttle delay.
pub trait Sleeper {
    fn sleep(&self, delay: Duration);
}

/// Real wall-clock sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// One attempt, as seen by an observer. Not persisted.
#[derive(Debug)]
pub struct AttemptRecord<'a> {
    pub id: AppId,
    pub phase: Phase,
    /// 1-based.
    pub attempt: u32,
    pub outcome: &'a FetchOutcome,
    pub classification: Classification,
    /// Set when another attempt will follow.
    pub delay_before_next: Option<Duration>,
}

/// Hook for watching every attempt (logging, telemetry, tests).
pub trait AttemptObserver {
    fn on_attempt(&mut self, record: &AttemptRecord<'_>);
}

impl<F> AttemptObserver for F
where
    F: FnMut(&AttemptRecord<'_>),
{
    fn on_attempt(&mut self, record: &AttemptRecord<'_>) {
        self(record)
    }
}

/// Default observer: one tracing event per attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl AttemptObserver for LogObserver {
    fn on_attempt(&mut self, record: &AttemptRecord<'_>) {
        let phase = record.phase.as_str();
        match (record.outcome, record.delay_before_next) {
            (FetchOutcome::Success(_), _) => {
                tracing::debug!(id = record.id, phase, attempt = record.attempt, "fetched");
            }
            (FetchOutcome::NotFound, _) => {
                tracing::debug!(id = record.id, phase, attempt = record.attempt, "does not exist");
            }
            (FetchOutcome::TransientError(e), Some(delay)) => {
                tracing::warn!(
                    id = record.id,
                    phase,
                    attempt = record.attempt,
                    kind = %failure_kind(e),
                    delay_ms = delay.as_millis() as u64,
                    "transient failure: {}; retrying",
                    e
                );
            }
            (FetchOutcome::TransientError(e), None) => {
                tracing::warn!(
                    id = record.id,
                    phase,
                    attempt = record.attempt,
                    kind = %failure_kind(e),
                    "giving up after {} attempts: {}",
                    record.attempt,
                    e
                );
            }
        }
    }
}

/// Runs a single fetch operation through a backoff policy until it reaches a
/// terminal classification. One executor per phase; the fetch closure decides
/// which transport operation is retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryExecutor {
    policy: BackoffPolicy,
    phase: Phase,
}

impl RetryExecutor {
    pub fn new(policy: BackoffPolicy, phase: Phase) -> Self {
        Self { policy, phase }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Attempt `fetch(id)` until success, not-found, or exhaustion.
    ///
    /// Transport errors are folded into transient failures and never escape.
    /// Only the backoff sleep suspends the caller.
    pub fn execute<F>(
        &self,
        id: AppId,
        mut fetch: F,
        sleeper: &dyn Sleeper,
        observer: &mut dyn AttemptObserver,
    ) -> ClassificationResult
    where
        F: FnMut(AppId) -> Result<FetchOutcome, TransportError>,
    {
        let mut attempt = NonZeroU32::MIN;
        loop {
            let outcome = FetchOutcome::from(fetch(id));
            let classification = classify(&outcome);
            let delay = match classification {
                Classification::TransientFailure => match self.policy.decide_after(attempt) {
                    RetryDecision::RetryAfter(d) => Some(d),
                    RetryDecision::NoRetry => None,
                },
                Classification::Success | Classification::NotFound => None,
            };

            observer.on_attempt(&AttemptRecord {
                id,
                phase: self.phase,
                attempt: attempt.get(),
                outcome: &outcome,
                classification,
                delay_before_next: delay,
            });

            match (outcome, delay) {
                (FetchOutcome::Success(payload), _) => {
                    return ClassificationResult::Succeeded(payload)
                }
                (FetchOutcome::NotFound, _) => return ClassificationResult::NonExistent,
                (FetchOutcome::TransientError(_), None) => return ClassificationResult::Failed,
                (FetchOutcome::TransientError(_), Some(d)) => {
                    sleeper.sleep(d);
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}
