//! In-memory sink with a write log. Used by tests and dry runs.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{Sink, SinkError};

#[derive(Debug, Default)]
struct Inner {
    docs: BTreeMap<String, serde_json::Value>,
    history: Vec<(String, serde_json::Value)>,
    fail_writes: usize,
}

/// Keeps every document in memory and records each successful write in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    inner: Mutex<Inner>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` writes (to exercise persistence retries).
    pub fn fail_next_writes(&self, n: usize) {
        self.lock().fail_writes = n;
    }

    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        self.lock().docs.get(name).cloned()
    }

    /// Every successful write to `name`, oldest first.
    pub fn writes_to(&self, name: &str) -> Vec<serde_json::Value> {
        self.lock()
            .history
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().docs.keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Sink for MemorySink {
    fn write_json(&self, name: &str, document: &serde_json::Value) -> Result<(), SinkError> {
        let mut inner = self.lock();
        if inner.fail_writes > 0 {
            inner.fail_writes -= 1;
            return Err(SinkError::Rejected {
                name: name.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        inner.docs.insert(name.to_string(), document.clone());
        inner.history.push((name.to_string(), document.clone()));
        Ok(())
    }

    fn read_json(&self, name: &str) -> Result<Option<serde_json::Value>, SinkError> {
        Ok(self.lock().docs.get(name).cloned())
    }
}
