//! Local catalog of known ids and planning of which ids still need work.
//!
//! `catalog.json` maps `"<id>" -> name` (plus `updated_at`). Planning is purely
//! local: it compares the catalog against the details store and the
//! non-existent export without touching the network.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use crate::export::timestamp_now;
use crate::retry::Sleeper;
use crate::sink::{self, PersistWarning, Sink, SinkError};
use crate::transport::CatalogEntry;
use crate::types::AppId;

pub const CATALOG_FILE: &str = "catalog.json";

const UPDATED_AT: &str = "updated_at";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    apps: BTreeMap<AppId, String>,
}

impl Catalog {
    pub fn load(sink: &dyn Sink) -> Result<Self, SinkError> {
        let doc: Map<String, Value> = sink::read_typed(sink, CATALOG_FILE)?.unwrap_or_default();
        let apps = doc
            .into_iter()
            .filter(|(k, _)| k != UPDATED_AT)
            .filter_map(|(k, v)| {
                let id = k.parse::<AppId>().ok()?;
                let name = v.as_str().unwrap_or_default().to_string();
                Some((id, name))
            })
            .collect();
        Ok(Self { apps })
    }

    /// Add entries not yet known. Returns how many were new.
    pub fn merge(&mut self, entries: impl IntoIterator<Item = CatalogEntry>) -> usize {
        let mut added = 0;
        for entry in entries {
            if entry.appid == 0 {
                continue;
            }
            if let std::collections::btree_map::Entry::Vacant(slot) = self.apps.entry(entry.appid) {
                slot.insert(entry.name);
                added += 1;
            }
        }
        added
    }

    pub fn save(&self, sink: &dyn Sink, sleeper: &dyn Sleeper) -> Result<(), PersistWarning> {
        let mut doc: Map<String, Value> = self
            .apps
            .iter()
            .map(|(id, name)| (id.to_string(), Value::String(name.clone())))
            .collect();
        doc.insert(UPDATED_AT.to_string(), Value::String(timestamp_now()));
        sink::write_with_retry(sink, CATALOG_FILE, &doc, sleeper)
    }

    /// All ids, ascending.
    pub fn ids(&self) -> Vec<AppId> {
        self.apps.keys().copied().collect()
    }

    pub fn name(&self, id: AppId) -> Option<&str> {
        self.apps.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

/// Summary of a local planning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub pending: Vec<AppId>,
    pub already_fetched: usize,
    pub known_non_existent: usize,
}

/// Ids in `catalog` order that are neither fetched nor known to be missing.
pub fn plan_pending(
    catalog: &[AppId],
    fetched: &BTreeSet<AppId>,
    non_existent: &BTreeSet<AppId>,
) -> Plan {
    let mut already_fetched = 0;
    let mut known_non_existent = 0;
    let mut pending = Vec::new();
    for &id in catalog {
        if non_existent.contains(&id) {
            known_non_existent += 1;
        } else if fetched.contains(&id) {
            already_fetched += 1;
        } else {
            pending.push(id);
        }
    }
    Plan {
        pending,
        already_fetched,
        known_non_existent,
    }
}
