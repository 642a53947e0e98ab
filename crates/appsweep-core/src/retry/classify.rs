//! Classify fetch outcomes into success, not-found, or transient failure.

use std::fmt;

use crate::retry::error::TransportError;
use crate::types::Payload;

/// What one transport attempt produced.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Remote record retrieved.
    Success(Payload),
    /// Remote answered with a well-formed "no such id".
    NotFound,
    /// Anything else: network, timeout, rate limit, malformed body, bad status.
    TransientError(TransportError),
}

impl From<Result<FetchOutcome, TransportError>> for FetchOutcome {
    fn from(result: Result<FetchOutcome, TransportError>) -> Self {
        result.unwrap_or_else(FetchOutcome::TransientError)
    }
}

/// Verdict for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    /// Terminal; never retried and never counted as a failure.
    NotFound,
    /// Eligible for retry.
    TransientFailure,
}

/// Finer-grained cause of a transient failure, for logs and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Server asked us to slow down (429).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Server-side HTTP failure (5xx).
    Http5xx(u16),
    /// Response body did not decode into the expected shape.
    Malformed,
    /// Any other failure.
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => f.write_str("timeout"),
            FailureKind::Throttled => f.write_str("throttled"),
            FailureKind::Connection => f.write_str("connection"),
            FailureKind::Http5xx(code) => write!(f, "http {code}"),
            FailureKind::Malformed => f.write_str("malformed"),
            FailureKind::Other => f.write_str("other"),
        }
    }
}

pub fn classify(outcome: &FetchOutcome) -> Classification {
    match outcome {
        FetchOutcome::Success(_) => Classification::Success,
        FetchOutcome::NotFound => Classification::NotFound,
        FetchOutcome::TransientError(_) => Classification::TransientFailure,
    }
}

/// Classify an HTTP status code.
pub fn classify_http_status(code: u32) -> FailureKind {
    match code {
        429 | 503 => FailureKind::Throttled,
        500..=599 => FailureKind::Http5xx(code as u16),
        _ => FailureKind::Other,
    }
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> FailureKind {
    if e.is_operation_timedout() {
        return FailureKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return FailureKind::Connection;
    }
    FailureKind::Other
}

/// Classify a transport error into a failure kind.
pub fn failure_kind(e: &TransportError) -> FailureKind {
    match e {
        TransportError::Curl(ce) => classify_curl_error(ce),
        TransportError::RateLimited => FailureKind::Throttled,
        TransportError::Http(code) => classify_http_status(*code),
        TransportError::Decode(_) | TransportError::Malformed(_) => FailureKind::Malformed,
        TransportError::Url(_) => FailureKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn three_way_split() {
        assert_eq!(
            classify(&FetchOutcome::Success(json!({"name": "x"}))),
            Classification::Success
        );
        assert_eq!(classify(&FetchOutcome::NotFound), Classification::NotFound);
        assert_eq!(
            classify(&FetchOutcome::TransientError(TransportError::RateLimited)),
            Classification::TransientFailure
        );
        assert_eq!(
            classify(&FetchOutcome::TransientError(TransportError::Malformed(
                "missing key".into()
            ))),
            Classification::TransientFailure
        );
    }

    #[test]
    fn raised_transport_errors_become_transient() {
        let raised: Result<FetchOutcome, TransportError> = Err(TransportError::Http(502));
        let outcome = FetchOutcome::from(raised);
        assert_eq!(classify(&outcome), Classification::TransientFailure);

        let ok: Result<FetchOutcome, TransportError> = Ok(FetchOutcome::NotFound);
        assert_eq!(classify(&FetchOutcome::from(ok)), Classification::NotFound);
    }

    #[test]
    fn http_429_and_503_throttled() {
        assert_eq!(classify_http_status(429), FailureKind::Throttled);
        assert_eq!(classify_http_status(503), FailureKind::Throttled);
        assert_eq!(failure_kind(&TransportError::RateLimited), FailureKind::Throttled);
    }

    #[test]
    fn http_5xx_and_4xx() {
        assert!(matches!(classify_http_status(500), FailureKind::Http5xx(500)));
        assert!(matches!(classify_http_status(502), FailureKind::Http5xx(502)));
        assert_eq!(classify_http_status(403), FailureKind::Other);
    }

    #[test]
    fn decode_errors_are_malformed() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(failure_kind(&TransportError::Decode(err)), FailureKind::Malformed);
    }
}
