//! Shared identifier and phase types.

use std::fmt;

/// Catalog identifier (an app id in the remote store).
pub type AppId = u64;

/// Remote payload returned for a successful fetch.
pub type Payload = serde_json::Value;

/// Which pass of the sweep produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Existence check before the detail fetch.
    Validation,
    /// Detail payload fetch.
    Fetch,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Validation => "validation",
            Phase::Fetch => "fetch",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
