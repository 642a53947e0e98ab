//! Periodic snapshot of result-set membership, for resuming an interrupted run.
//!
//! Checkpoints carry ids only. Succeeded payloads are persisted by the details
//! store; the checkpoint just remembers which ids no longer need work.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::result::ResultSets;
use crate::sink::{self, Sink, SinkError};
use crate::types::AppId;

/// Document name used for the run checkpoint.
pub const CHECKPOINT_FILE: &str = "checkpoint.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default = "default_version")]
    pub version: u8,
    /// Number of input positions handled so far.
    pub processed: usize,
    /// Size of the (limited) input sequence for this run.
    pub total: usize,
    pub succeeded: Vec<AppId>,
    pub non_existent: Vec<AppId>,
    pub failed_validation: Vec<AppId>,
    pub failed_fetch: Vec<AppId>,
    pub updated_at: String,
    /// True once the run reached the end of its input.
    #[serde(default)]
    pub finalized: bool,
}

fn default_version() -> u8 {
    1
}

impl Checkpoint {
    pub fn from_results(results: &ResultSets, processed: usize, total: usize, finalized: bool) -> Self {
        Self {
            version: default_version(),
            processed,
            total,
            succeeded: results.succeeded_ids().into_iter().collect(),
            non_existent: results.non_existent.iter().copied().collect(),
            failed_validation: results.failed_validation.iter().copied().collect(),
            failed_fetch: results.failed_fetch.iter().copied().collect(),
            updated_at: crate::export::timestamp_now(),
            finalized,
        }
    }

    /// Load the last checkpoint, if any.
    pub fn load(sink: &dyn Sink) -> Result<Option<Self>, SinkError> {
        sink::read_typed(sink, CHECKPOINT_FILE)
    }

    /// Rebuild result sets from checkpoint membership. Succeeded ids have no
    /// payload here and land in `resumed_succeeded`.
    pub fn to_results(&self) -> ResultSets {
        ResultSets {
            succeeded: Default::default(),
            resumed_succeeded: self.succeeded.iter().copied().collect(),
            non_existent: self.non_existent.iter().copied().collect(),
            failed_validation: self.failed_validation.iter().copied().collect(),
            failed_fetch: self.failed_fetch.iter().copied().collect(),
        }
    }

    pub fn classified_ids(&self) -> BTreeSet<AppId> {
        self.succeeded
            .iter()
            .chain(&self.non_existent)
            .chain(&self.failed_validation)
            .chain(&self.failed_fetch)
            .copied()
            .collect()
    }
}
