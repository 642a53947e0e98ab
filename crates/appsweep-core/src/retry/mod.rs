//! Retry and backoff engine.
//!
//! This module holds the backoff policy, the three-way outcome classifier
//! (success, not-found, transient failure), and the executor that drives a
//! single identifier to a terminal verdict. The orchestrator instantiates one
//! executor per pass with its own policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{
    classify, classify_curl_error, classify_http_status, failure_kind, Classification,
    FailureKind, FetchOutcome,
};
pub use error::{ConfigError, TransportError};
pub use policy::{BackoffPolicy, RetryDecision};
pub use run::{
    AttemptObserver, AttemptRecord, ClassificationResult, LogObserver, RetryExecutor, Sleeper,
    ThreadSleeper,
};
