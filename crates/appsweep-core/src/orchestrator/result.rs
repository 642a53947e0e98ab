//! Accumulated per-identifier verdicts for one run.

use std::collections::{BTreeMap, BTreeSet};

use crate::retry::ClassificationResult;
use crate::types::{AppId, Payload, Phase};

/// Disjoint partition of every identifier the orchestrator has classified.
///
/// `succeeded` holds payloads fetched in this run; `resumed_succeeded` holds
/// ids restored from a checkpoint, whose payloads were persisted elsewhere.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSets {
    pub succeeded: BTreeMap<AppId, Payload>,
    pub resumed_succeeded: BTreeSet<AppId>,
    pub non_existent: BTreeSet<AppId>,
    pub failed_validation: BTreeSet<AppId>,
    pub failed_fetch: BTreeSet<AppId>,
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultCounts {
    pub succeeded: usize,
    pub non_existent: usize,
    pub failed: usize,
}

impl ResultSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one terminal verdict in. Removes `id` from every other set first,
    /// so re-recording an id (retry of a failure) keeps the sets disjoint.
    pub fn record(&mut self, id: AppId, phase: Phase, result: ClassificationResult) {
        self.forget(id);
        match result {
            ClassificationResult::Succeeded(payload) => {
                self.succeeded.insert(id, payload);
            }
            ClassificationResult::NonExistent => {
                self.non_existent.insert(id);
            }
            ClassificationResult::Failed => {
                match phase {
                    Phase::Validation => self.failed_validation.insert(id),
                    Phase::Fetch => self.failed_fetch.insert(id),
                };
            }
        }
    }

    pub fn contains(&self, id: AppId) -> bool {
        self.succeeded.contains_key(&id)
            || self.resumed_succeeded.contains(&id)
            || self.non_existent.contains(&id)
            || self.failed_validation.contains(&id)
            || self.failed_fetch.contains(&id)
    }

    /// Union of validation and fetch failures.
    pub fn failed(&self) -> BTreeSet<AppId> {
        self.failed_validation
            .union(&self.failed_fetch)
            .copied()
            .collect()
    }

    /// Ids that succeeded in this run or a resumed one.
    pub fn succeeded_ids(&self) -> BTreeSet<AppId> {
        self.succeeded
            .keys()
            .copied()
            .chain(self.resumed_succeeded.iter().copied())
            .collect()
    }

    pub fn counts(&self) -> ResultCounts {
        ResultCounts {
            succeeded: self.succeeded.len() + self.resumed_succeeded.len(),
            non_existent: self.non_existent.len(),
            failed: self.failed_validation.len() + self.failed_fetch.len(),
        }
    }

    pub fn len(&self) -> usize {
        let c = self.counts();
        c.succeeded + c.non_existent + c.failed
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn forget(&mut self, id: AppId) {
        self.succeeded.remove(&id);
        self.resumed_succeeded.remove(&id);
        self.non_existent.remove(&id);
        self.failed_validation.remove(&id);
        self.failed_fetch.remove(&id);
    }
}
