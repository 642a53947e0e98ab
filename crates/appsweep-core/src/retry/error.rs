//! Error types for backoff configuration and transport failures.

use std::time::Duration;

use thiserror::Error;

/// Invalid retry or orchestration parameters. Fatal: raised before any run starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("attempt number must be 1 or greater (got {0})")]
    InvalidAttempt(u32),
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("backoff multiplier must be finite and at least 1.0 (got {0})")]
    InvalidMultiplier(f64),
    #[error("initial delay {initial:?} exceeds ceiling {ceiling:?}")]
    DelayAboveCeiling { initial: Duration, ceiling: Duration },
    #[error("delay must be a finite, non-negative number of seconds (got {0})")]
    InvalidDelay(f64),
    #[error("checkpoint_interval must be at least 1")]
    ZeroCheckpointInterval,
}

/// Error returned by a single transport call (curl failure, HTTP error, or bad body).
///
/// The retry executor never propagates these; every variant is a transient failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error(transparent)]
    Curl(#[from] curl::Error),
    /// Server asked us to slow down (HTTP 429).
    #[error("rate limited (HTTP 429)")]
    RateLimited,
    /// HTTP response had some other non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// Body was not valid JSON.
    #[error("invalid JSON body: {0}")]
    Decode(#[from] serde_json::Error),
    /// JSON was valid but not the expected envelope.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// Endpoint could not be turned into a request URL.
    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}
