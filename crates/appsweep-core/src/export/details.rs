//! Merged store of fetched detail payloads, keyed by id.
//!
//! Layout: `{"<id>": <payload>, ..., "updated_at": "<ISO-8601>"}`. Existing
//! entries are kept; new payloads overwrite entries with the same id.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use super::timestamp_now;
use crate::retry::Sleeper;
use crate::sink::{self, PersistWarning, Sink, SinkError};
use crate::types::{AppId, Payload};

pub const DETAILS_FILE: &str = "app_details.json";

const UPDATED_AT: &str = "updated_at";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailsStore {
    entries: Map<String, Value>,
}

impl DetailsStore {
    pub fn load(sink: &dyn Sink) -> Result<Self, SinkError> {
        let mut entries: Map<String, Value> =
            sink::read_typed(sink, DETAILS_FILE)?.unwrap_or_default();
        entries.remove(UPDATED_AT);
        Ok(Self { entries })
    }

    /// Ids with a stored payload. Keys that are not ids are ignored.
    pub fn ids(&self) -> BTreeSet<AppId> {
        self.entries
            .keys()
            .filter_map(|k| k.parse::<AppId>().ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: AppId) -> Option<&Payload> {
        self.entries.get(&id.to_string())
    }

    /// Insert payloads; returns how many ids were new.
    pub fn merge(&mut self, payloads: &BTreeMap<AppId, Payload>) -> usize {
        let mut added = 0;
        for (id, payload) in payloads {
            if self
                .entries
                .insert(id.to_string(), payload.clone())
                .is_none()
            {
                added += 1;
            }
        }
        added
    }

    pub fn save(&self, sink: &dyn Sink, sleeper: &dyn Sleeper) -> Result<(), PersistWarning> {
        let mut doc = self.entries.clone();
        doc.insert(UPDATED_AT.to_string(), Value::String(timestamp_now()));
        sink::write_with_retry(sink, DETAILS_FILE, &doc, sleeper)
    }
}
