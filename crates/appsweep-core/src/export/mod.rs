//! Stable-schema exports of classified ids.
//!
//! Failure exports are written per phase (`failed_validation_app_ids.json`,
//! `failed_fetch_app_ids.json`) plus their deduplicated union
//! (`all_failed_app_ids.json`). Exports overwrite, never append, so exporting
//! the same results twice yields the same id lists.

mod details;
mod non_existent;

pub use details::{DetailsStore, DETAILS_FILE};
pub use non_existent::{NonExistentExport, NON_EXISTENT_FILE};

use std::collections::BTreeSet;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::orchestrator::ResultSets;
use crate::retry::{Sleeper, ThreadSleeper};
use crate::sink::{self, PersistWarning, Sink, SinkError};
use crate::types::{AppId, Phase};

/// Current UTC time as ISO-8601 (`2024-01-31T12:00:00Z`).
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Which failure list an export holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportCategory {
    FailedValidation,
    FailedFetch,
    AllFailed,
}

impl ExportCategory {
    pub const ALL: [ExportCategory; 3] = [
        ExportCategory::FailedValidation,
        ExportCategory::FailedFetch,
        ExportCategory::AllFailed,
    ];

    pub fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::Validation => ExportCategory::FailedValidation,
            Phase::Fetch => ExportCategory::FailedFetch,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ExportCategory::FailedValidation => "failed_validation_app_ids.json",
            ExportCategory::FailedFetch => "failed_fetch_app_ids.json",
            ExportCategory::AllFailed => "all_failed_app_ids.json",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ExportCategory::FailedValidation => {
                "App IDs whose existence check failed after all retry attempts"
            }
            ExportCategory::FailedFetch => {
                "App IDs whose detail fetch failed after all retry attempts"
            }
            ExportCategory::AllFailed => "App IDs that failed after all retry attempts in any phase",
        }
    }
}

/// On-disk failure export. Ids are sorted and unique; `count == failed_app_ids.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedIdExport {
    pub failed_app_ids: Vec<AppId>,
    pub count: usize,
    pub exported_at: String,
    pub description: String,
}

impl FailedIdExport {
    pub fn new(category: ExportCategory, ids: &BTreeSet<AppId>) -> Self {
        Self {
            failed_app_ids: ids.iter().copied().collect(),
            count: ids.len(),
            exported_at: timestamp_now(),
            description: category.description().to_string(),
        }
    }

    pub fn ids(&self) -> BTreeSet<AppId> {
        self.failed_app_ids.iter().copied().collect()
    }
}

/// What an export pass wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub written: Vec<ExportCategory>,
    pub warnings: Vec<PersistWarning>,
}

pub struct FailureExporter<'a> {
    sink: &'a dyn Sink,
    sleeper: &'a dyn Sleeper,
}

impl<'a> FailureExporter<'a> {
    pub fn new(sink: &'a dyn Sink) -> Self {
        Self {
            sink,
            sleeper: &ThreadSleeper,
        }
    }

    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Write the per-phase failure exports and their union.
    pub fn export(&self, results: &ResultSets) -> ExportReport {
        self.export_sets(&results.failed_validation, &results.failed_fetch)
    }

    pub fn export_sets(
        &self,
        failed_validation: &BTreeSet<AppId>,
        failed_fetch: &BTreeSet<AppId>,
    ) -> ExportReport {
        let all: BTreeSet<AppId> = failed_validation.union(failed_fetch).copied().collect();
        let mut report = ExportReport::default();
        for (category, ids) in [
            (ExportCategory::FailedValidation, failed_validation),
            (ExportCategory::FailedFetch, failed_fetch),
            (ExportCategory::AllFailed, &all),
        ] {
            match self.export_category(category, ids) {
                Ok(true) => report.written.push(category),
                Ok(false) => {}
                Err(w) => report.warnings.push(w),
            }
        }
        report
    }

    /// Write one category. Empty lists are only written when a previous export
    /// exists, so stale failures get cleared. Returns whether a file was written.
    pub fn export_category(
        &self,
        category: ExportCategory,
        ids: &BTreeSet<AppId>,
    ) -> Result<bool, PersistWarning> {
        let name = category.file_name();
        if ids.is_empty() && matches!(self.sink.read_json(name), Ok(None)) {
            return Ok(false);
        }
        let doc = FailedIdExport::new(category, ids);
        sink::write_with_retry(self.sink, name, &doc, self.sleeper)?;
        tracing::info!(file = name, count = doc.count, "exported failed ids");
        Ok(true)
    }
}

/// Load the ids of a previous failure export. Absent file means no failures.
pub fn load_failed_ids(
    sink: &dyn Sink,
    category: ExportCategory,
) -> Result<BTreeSet<AppId>, SinkError> {
    let doc: Option<FailedIdExport> = sink::read_typed(sink, category.file_name())?;
    Ok(doc.map(|d| d.ids()).unwrap_or_default())
}
