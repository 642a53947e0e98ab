//! Accumulated list of ids the store reports as non-existent.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::timestamp_now;
use crate::retry::Sleeper;
use crate::sink::{self, PersistWarning, Sink, SinkError};
use crate::types::AppId;

pub const NON_EXISTENT_FILE: &str = "non_existent_apps.json";

const DESCRIPTION: &str = "App IDs that do not exist or have no data in the store";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonExistentExport {
    pub non_existent_app_ids: Vec<AppId>,
    pub count: usize,
    pub exported_at: String,
    pub description: String,
}

impl NonExistentExport {
    pub fn load(sink: &dyn Sink) -> Result<BTreeSet<AppId>, SinkError> {
        let doc: Option<Self> = sink::read_typed(sink, NON_EXISTENT_FILE)?;
        Ok(doc
            .map(|d| d.non_existent_app_ids.into_iter().collect())
            .unwrap_or_default())
    }

    /// Union `new_ids` with the existing export and rewrite it. Returns the merged size.
    pub fn merge(
        sink: &dyn Sink,
        new_ids: &BTreeSet<AppId>,
        sleeper: &dyn Sleeper,
    ) -> Result<usize, PersistWarning> {
        let existing = Self::load(sink).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable non-existent export");
            BTreeSet::new()
        });
        let merged: BTreeSet<AppId> = existing.union(new_ids).copied().collect();
        let doc = Self {
            non_existent_app_ids: merged.iter().copied().collect(),
            count: merged.len(),
            exported_at: timestamp_now(),
            description: DESCRIPTION.to_string(),
        };
        sink::write_with_retry(sink, NON_EXISTENT_FILE, &doc, sleeper)?;
        Ok(doc.count)
    }
}
