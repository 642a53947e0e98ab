//! Durable JSON persistence for checkpoints and exports.
//!
//! The core only needs two operations: write a JSON document under a name and
//! read it back. A missing document is not an error; it means "no prior
//! state". Writes that fail are retried once after a short fixed pause, then
//! reported as a run-level warning so in-memory results are never lost.

mod fs;
mod memory;

pub use fs::FsSink;
pub use memory::MemorySink;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::retry::Sleeper;

/// Pause before the single persistence retry.
pub const PERSIST_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json error on {name}: {source}")]
    Json {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    /// Injected or backend-specific failure.
    #[error("write to {name} rejected: {reason}")]
    Rejected { name: String, reason: String },
}

/// Persistence backend keyed by document name (e.g. `checkpoint.json`).
pub trait Sink {
    fn write_json(&self, name: &str, document: &serde_json::Value) -> Result<(), SinkError>;

    /// Returns `Ok(None)` when no document exists under `name`.
    fn read_json(&self, name: &str) -> Result<Option<serde_json::Value>, SinkError>;
}

/// A persistence failure that survived the retry; surfaced with the run report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistWarning {
    pub name: String,
    pub error: String,
}

impl fmt::Display for PersistWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not persist {}: {}", self.name, self.error)
    }
}

/// Serialize `document` and write it, retrying once after [`PERSIST_RETRY_DELAY`].
pub fn write_with_retry<T>(
    sink: &dyn Sink,
    name: &str,
    document: &T,
    sleeper: &dyn Sleeper,
) -> Result<(), PersistWarning>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(document).map_err(|e| PersistWarning {
        name: name.to_string(),
        error: e.to_string(),
    })?;
    match sink.write_json(name, &value) {
        Ok(()) => return Ok(()),
        Err(e) => {
            tracing::warn!(name, error = %e, "write failed; retrying once");
        }
    }
    sleeper.sleep(PERSIST_RETRY_DELAY);
    sink.write_json(name, &value).map_err(|e| {
        tracing::warn!(name, error = %e, "write failed again; keeping results in memory");
        PersistWarning {
            name: name.to_string(),
            error: e.to_string(),
        }
    })
}

/// Read and decode a typed document. `Ok(None)` when absent.
pub fn read_typed<T: DeserializeOwned>(sink: &dyn Sink, name: &str) -> Result<Option<T>, SinkError> {
    let Some(value) = sink.read_json(name)? else {
        return Ok(None);
    };
    serde_json::from_value(value)
        .map(Some)
        .map_err(|source| SinkError::Json {
            name: name.to_string(),
            source,
        })
}
