//! End-to-end sweep: plan, orchestrate, persist payloads and exports.
//!
//! [`Pipeline::run`] is one orchestrator pass. At every checkpoint (and at the
//! end) new payloads go into the details store and the non-existent and
//! failure exports are rewritten, so a crash never leaves `checkpoint.json`
//! ahead of the data it vouches for. [`Pipeline::retry_failed`] repeats passes
//! over `all_failed_app_ids.json` until it is empty, the round budget is
//! spent, or a stop is requested.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use thiserror::Error;

use crate::catalog::{plan_pending, Catalog, Plan};
use crate::control::StopSignal;
use crate::export::{
    load_failed_ids, DetailsStore, ExportCategory, ExportReport, FailureExporter,
    NonExistentExport, DETAILS_FILE,
};
use crate::orchestrator::{BatchOrchestrator, OrchestratorSettings, ResultSets, RunReport};
use crate::retry::{ConfigError, Sleeper, ThreadSleeper};
use crate::sink::{PersistWarning, Sink, SinkError};
use crate::transport::Transport;
use crate::types::AppId;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// One pass plus what was persisted during it.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub run: RunReport,
    /// The last failure export of the pass.
    pub exports: ExportReport,
    /// Ids newly added to the details store.
    pub details_added: usize,
    /// Size of the non-existent export after merging, if it was written.
    pub non_existent_total: Option<usize>,
    /// Failures as exported: this pass plus carried ids it never reached.
    pub failed_validation: BTreeSet<AppId>,
    pub failed_fetch: BTreeSet<AppId>,
    /// Every persistence failure of the pass, checkpoints included.
    pub warnings: Vec<PersistWarning>,
}

impl PipelineReport {
    pub fn failed(&self) -> BTreeSet<AppId> {
        self.failed_validation
            .union(&self.failed_fetch)
            .copied()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryReport {
    pub rounds: Vec<PipelineReport>,
    /// Ids still failed after the last round, including ones a stop left untried.
    pub remaining: BTreeSet<AppId>,
    pub stopped: bool,
}

/// Failures from an earlier export that stay recorded until this pass
/// classifies the id again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CarriedFailures {
    validation: BTreeSet<AppId>,
    fetch: BTreeSet<AppId>,
}

impl CarriedFailures {
    fn load(sink: &dyn Sink) -> Result<Self, SinkError> {
        let all = load_failed_ids(sink, ExportCategory::AllFailed)?;
        let validation: BTreeSet<AppId> = load_failed_ids(sink, ExportCategory::FailedValidation)?
            .intersection(&all)
            .copied()
            .collect();
        let fetch = all.difference(&validation).copied().collect();
        Ok(Self { validation, fetch })
    }

    fn is_empty(&self) -> bool {
        self.validation.is_empty() && self.fetch.is_empty()
    }
}

/// Checkpoint-time persistence for one pass.
struct ResultsPersister<'a> {
    sink: &'a dyn Sink,
    sleeper: &'a dyn Sleeper,
    carried: CarriedFailures,
    details: Option<DetailsStore>,
    details_unreadable: bool,
    details_dirty: bool,
    flushed: BTreeSet<AppId>,
    details_added: usize,
    non_existent_total: Option<usize>,
    exports: ExportReport,
}

impl<'a> ResultsPersister<'a> {
    fn new(sink: &'a dyn Sink, sleeper: &'a dyn Sleeper, carried: CarriedFailures) -> Self {
        Self {
            sink,
            sleeper,
            carried,
            details: None,
            details_unreadable: false,
            details_dirty: false,
            flushed: BTreeSet::new(),
            details_added: 0,
            non_existent_total: None,
            exports: ExportReport::default(),
        }
    }

    fn failed_sets(&self, results: &ResultSets) -> (BTreeSet<AppId>, BTreeSet<AppId>) {
        let untouched = |ids: &BTreeSet<AppId>| -> Vec<AppId> {
            ids.iter().copied().filter(|id| !results.contains(*id)).collect()
        };
        let mut validation = results.failed_validation.clone();
        validation.extend(untouched(&self.carried.validation));
        let mut fetch = results.failed_fetch.clone();
        fetch.extend(untouched(&self.carried.fetch));
        (validation, fetch)
    }

    fn flush(&mut self, results: &ResultSets) -> Vec<PersistWarning> {
        let mut warnings = Vec::new();
        self.flush_details(results, &mut warnings);

        if !results.non_existent.is_empty() {
            match NonExistentExport::merge(self.sink, &results.non_existent, self.sleeper) {
                Ok(total) => self.non_existent_total = Some(total),
                Err(w) => warnings.push(w),
            }
        }

        let (validation, fetch) = self.failed_sets(results);
        self.exports = FailureExporter::new(self.sink)
            .with_sleeper(self.sleeper)
            .export_sets(&validation, &fetch);
        warnings.extend(self.exports.warnings.iter().cloned());
        warnings
    }

    /// Merge payloads not yet flushed. A failed save stays dirty and is
    /// retried at the next checkpoint.
    fn flush_details(&mut self, results: &ResultSets, warnings: &mut Vec<PersistWarning>) {
        if self.details_unreadable {
            return;
        }
        let fresh: BTreeMap<AppId, _> = results
            .succeeded
            .iter()
            .filter(|(id, _)| !self.flushed.contains(id))
            .map(|(id, payload)| (*id, payload.clone()))
            .collect();
        if fresh.is_empty() && !self.details_dirty {
            return;
        }
        if self.details.is_none() {
            match DetailsStore::load(self.sink) {
                Ok(store) => self.details = Some(store),
                Err(e) => {
                    // Leave an unreadable store alone rather than replace it with this pass only.
                    self.details_unreadable = true;
                    warnings.push(PersistWarning {
                        name: DETAILS_FILE.to_string(),
                        error: e.to_string(),
                    });
                    return;
                }
            }
        }
        let Some(store) = self.details.as_mut() else {
            return;
        };
        self.details_added += store.merge(&fresh);
        self.flushed.extend(fresh.keys().copied());
        match store.save(self.sink, self.sleeper) {
            Ok(()) => {
                self.details_dirty = false;
                tracing::info!(stored = store.len(), "details store updated");
            }
            Err(w) => {
                self.details_dirty = true;
                warnings.push(w);
            }
        }
    }
}

pub struct Pipeline<'a> {
    settings: OrchestratorSettings,
    transport: &'a dyn Transport,
    sink: &'a dyn Sink,
    sleeper: &'a dyn Sleeper,
    stop: StopSignal,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: OrchestratorSettings,
        transport: &'a dyn Transport,
        sink: &'a dyn Sink,
    ) -> Result<Self, ConfigError> {
        if settings.checkpoint_interval == 0 {
            return Err(ConfigError::ZeroCheckpointInterval);
        }
        Ok(Self {
            settings,
            transport,
            sink,
            sleeper: &ThreadSleeper,
            stop: StopSignal::new(),
        })
    }

    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Catalog ids not yet fetched and not known to be missing. The whole
    /// list is returned; `limit` is applied by the orchestrator in [`Pipeline::run`].
    pub fn plan(&self, catalog: &Catalog) -> Result<Plan, SinkError> {
        let fetched = DetailsStore::load(self.sink)?.ids();
        let non_existent = NonExistentExport::load(self.sink)?;
        Ok(plan_pending(&catalog.ids(), &fetched, &non_existent))
    }

    /// Classify `ids` and persist the outcome. With `resume`, ids already in
    /// the last checkpoint are skipped.
    pub fn run(&self, ids: &[AppId], resume: bool) -> Result<PipelineReport, PipelineError> {
        self.run_with(self.settings, ids, resume, CarriedFailures::default())
    }

    /// Re-run the ids in `all_failed_app_ids.json` for up to `max_rounds`
    /// rounds, pausing `round_pause` between rounds.
    pub fn retry_failed(
        &self,
        max_rounds: u32,
        round_pause: Duration,
    ) -> Result<RetryReport, PipelineError> {
        let settings = OrchestratorSettings {
            limit: None,
            ..self.settings
        };
        let mut carried = CarriedFailures::load(self.sink)?;
        let mut rounds = Vec::new();
        let mut stopped = false;

        for round in 1..=max_rounds {
            if carried.is_empty() {
                break;
            }
            if self.stop.is_stop_requested() {
                stopped = true;
                break;
            }
            let ids: Vec<AppId> = carried.validation.union(&carried.fetch).copied().collect();
            tracing::info!(round, max_rounds, pending = ids.len(), "retry round");
            let report = self.run_with(settings, &ids, false, carried)?;
            stopped = report.run.stopped;
            carried = CarriedFailures {
                validation: report.failed_validation.clone(),
                fetch: report.failed_fetch.clone(),
            };
            rounds.push(report);

            if stopped {
                break;
            }
            if !carried.is_empty() && round < max_rounds && !round_pause.is_zero() {
                self.sleeper.sleep(round_pause);
            }
        }

        let remaining: BTreeSet<AppId> = carried.validation.union(&carried.fetch).copied().collect();
        if remaining.is_empty() {
            tracing::info!(rounds = rounds.len(), "no failed ids left");
        } else {
            tracing::warn!(
                rounds = rounds.len(),
                remaining = remaining.len(),
                stopped,
                "failed ids remain after retry rounds"
            );
        }
        Ok(RetryReport {
            rounds,
            remaining,
            stopped,
        })
    }

    fn run_with(
        &self,
        settings: OrchestratorSettings,
        ids: &[AppId],
        resume: bool,
        carried: CarriedFailures,
    ) -> Result<PipelineReport, PipelineError> {
        let mut persister = ResultsPersister::new(self.sink, self.sleeper, carried);
        let run = {
            let mut orchestrator = BatchOrchestrator::new(settings, self.transport, self.sink)?
                .with_sleeper(self.sleeper)
                .with_stop_signal(self.stop.clone())
                .with_checkpoint_hook(|results: &ResultSets| persister.flush(results));
            if resume {
                orchestrator.resume(ids)?
            } else {
                orchestrator.run(ids)
            }
        };

        for w in &run.warnings {
            tracing::warn!("{w}");
        }
        let (failed_validation, failed_fetch) = persister.failed_sets(&run.results);
        Ok(PipelineReport {
            warnings: run.warnings.clone(),
            exports: persister.exports,
            details_added: persister.details_added,
            non_existent_total: persister.non_existent_total,
            failed_validation,
            failed_fetch,
            run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{DETAILS_FILE, NON_EXISTENT_FILE};
    use crate::orchestrator::Checkpoint;
    use crate::retry::{BackoffPolicy, FetchOutcome, TransportError};
    use crate::sink::MemorySink;
    use crate::transport::CatalogEntry;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::panic::{self, AssertUnwindSafe};

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _delay: Duration) {}
    }

    /// Details responses scripted per id; each call pops the front, the last one repeats.
    #[derive(Default)]
    struct ScriptedStore {
        details: RefCell<HashMap<AppId, Vec<Option<bool>>>>,
        /// Simulated crash: panic when this id's details are requested.
        panic_on: Cell<Option<AppId>>,
        /// Request a stop once this id's details have been served.
        stop_on: RefCell<Option<(AppId, StopSignal)>>,
    }

    impl ScriptedStore {
        /// `Some(true)` found, `Some(false)` missing, `None` transient error.
        fn script(self, id: AppId, steps: &[Option<bool>]) -> Self {
            self.details.borrow_mut().insert(id, steps.to_vec());
            self
        }

        fn next(&self, id: AppId) -> Option<bool> {
            let mut details = self.details.borrow_mut();
            let steps = details.entry(id).or_insert_with(|| vec![Some(true)]);
            if steps.len() > 1 {
                steps.remove(0)
            } else {
                steps[0]
            }
        }
    }

    impl Transport for ScriptedStore {
        fn fetch_existence(&self, _id: AppId) -> Result<FetchOutcome, TransportError> {
            Ok(FetchOutcome::Success(json!(true)))
        }

        fn fetch_details(&self, id: AppId) -> Result<FetchOutcome, TransportError> {
            if self.panic_on.get() == Some(id) {
                panic!("process killed while fetching {id}");
            }
            let outcome = match self.next(id) {
                Some(true) => Ok(FetchOutcome::Success(json!({ "steam_appid": id }))),
                Some(false) => Ok(FetchOutcome::NotFound),
                None => Err(TransportError::RateLimited),
            };
            if let Some((stop_id, stop)) = self.stop_on.borrow().as_ref() {
                if *stop_id == id {
                    stop.request_stop();
                }
            }
            outcome
        }
    }

    fn settings() -> OrchestratorSettings {
        let policy = BackoffPolicy::new(2, Duration::from_millis(1), 2.0, Duration::from_millis(4))
            .unwrap();
        OrchestratorSettings {
            validation: policy,
            fetch: policy,
            checkpoint_interval: 10,
            request_delay: Duration::ZERO,
            validate_before_fetch: false,
            limit: None,
        }
    }

    #[test]
    fn run_persists_details_non_existent_and_failures() {
        let transport = ScriptedStore::default()
            .script(2, &[Some(false)])
            .script(3, &[None]);
        let sink = MemorySink::new();
        let pipeline = Pipeline::new(settings(), &transport, &sink)
            .unwrap()
            .with_sleeper(&NoSleep);

        let report = pipeline.run(&[1, 2, 3], false).unwrap();
        assert_eq!(report.details_added, 1);
        assert_eq!(report.non_existent_total, Some(1));
        assert!(report.warnings.is_empty());

        assert_eq!(sink.get(DETAILS_FILE).unwrap()["1"], json!({"steam_appid": 1}));
        assert_eq!(sink.get(NON_EXISTENT_FILE).unwrap()["non_existent_app_ids"], json!([2]));
        assert_eq!(
            load_failed_ids(&sink, ExportCategory::AllFailed).unwrap(),
            [3].into_iter().collect()
        );
    }

    #[test]
    fn plan_skips_fetched_and_missing() {
        let transport = ScriptedStore::default().script(2, &[Some(false)]);
        let sink = MemorySink::new();
        let pipeline = Pipeline::new(settings(), &transport, &sink)
            .unwrap()
            .with_sleeper(&NoSleep);
        pipeline.run(&[1, 2], false).unwrap();

        let mut catalog = Catalog::default();
        catalog.merge((1..=4).map(|appid| CatalogEntry {
            appid,
            name: format!("app {appid}"),
        }));
        let plan = pipeline.plan(&catalog).unwrap();
        assert_eq!(plan.pending, vec![3, 4]);
        assert_eq!(plan.already_fetched, 1);
        assert_eq!(plan.known_non_existent, 1);
    }

    #[test]
    fn retry_failed_drains_until_empty() {
        // 5 fails both attempts of round 1, then succeeds; 6 never recovers.
        let transport = ScriptedStore::default()
            .script(5, &[None, None, Some(true)])
            .script(6, &[None]);
        let sink = MemorySink::new();
        let pipeline = Pipeline::new(settings(), &transport, &sink)
            .unwrap()
            .with_sleeper(&NoSleep);
        pipeline.run(&[5, 6], false).unwrap();

        let report = pipeline.retry_failed(3, Duration::from_secs(5)).unwrap();
        assert_eq!(report.rounds.len(), 3);
        assert_eq!(report.remaining, [6].into_iter().collect());
        assert!(!report.stopped);
        assert_eq!(
            load_failed_ids(&sink, ExportCategory::AllFailed).unwrap(),
            [6].into_iter().collect()
        );
        assert!(DetailsStore::load(&sink).unwrap().get(5).is_some());
    }

    #[test]
    fn retry_failed_with_nothing_failed_does_nothing() {
        let transport = ScriptedStore::default();
        let sink = MemorySink::new();
        let pipeline = Pipeline::new(settings(), &transport, &sink).unwrap();
        let report = pipeline.retry_failed(5, Duration::ZERO).unwrap();
        assert!(report.rounds.is_empty());
        assert!(report.remaining.is_empty());
        assert!(sink.names().is_empty());
    }

    #[test]
    fn retry_clears_stale_failure_exports() {
        let transport = ScriptedStore::default().script(8, &[None, None, Some(true)]);
        let sink = MemorySink::new();
        let pipeline = Pipeline::new(settings(), &transport, &sink)
            .unwrap()
            .with_sleeper(&NoSleep);
        pipeline.run(&[8], false).unwrap();

        let report = pipeline.retry_failed(5, Duration::ZERO).unwrap();
        assert_eq!(report.rounds.len(), 1);
        assert!(report.remaining.is_empty());
        let all = sink.get(ExportCategory::AllFailed.file_name()).unwrap();
        assert_eq!(all["count"], json!(0));
    }

    #[test]
    fn retry_stops_before_first_round_when_requested() {
        let transport = ScriptedStore::default().script(4, &[None]);
        let sink = MemorySink::new();
        let stop = StopSignal::new();
        let pipeline = Pipeline::new(settings(), &transport, &sink)
            .unwrap()
            .with_sleeper(&NoSleep)
            .with_stop_signal(stop.clone());
        pipeline.run(&[4], false).unwrap();

        stop.request_stop();
        let report = pipeline.retry_failed(5, Duration::ZERO).unwrap();
        assert!(report.stopped);
        assert!(report.rounds.is_empty());
        assert_eq!(report.remaining, [4].into_iter().collect());
    }

    #[test]
    fn resume_skips_checkpointed_ids() {
        let transport = ScriptedStore::default();
        let sink = MemorySink::new();
        let pipeline = Pipeline::new(settings(), &transport, &sink)
            .unwrap()
            .with_sleeper(&NoSleep);
        pipeline.run(&[1, 2], false).unwrap();

        let report = pipeline.run(&[1, 2, 3], true).unwrap();
        assert_eq!(report.details_added, 1);
        assert_eq!(report.run.processed, 3);
        let cp = Checkpoint::load(&sink).unwrap().unwrap();
        assert!(cp.finalized);
        assert_eq!(cp.classified_ids(), [1, 2, 3].into_iter().collect());
    }

    #[test]
    fn checkpoints_persist_payloads_so_a_crash_loses_nothing() {
        let transport = ScriptedStore::default();
        transport.panic_on.set(Some(3));
        let sink = MemorySink::new();
        let mut s = settings();
        s.checkpoint_interval = 2;
        let pipeline = Pipeline::new(s, &transport, &sink)
            .unwrap()
            .with_sleeper(&NoSleep);

        let crashed = panic::catch_unwind(AssertUnwindSafe(|| pipeline.run(&[1, 2, 3], false)));
        assert!(crashed.is_err());
        let cp = Checkpoint::load(&sink).unwrap().unwrap();
        assert!(!cp.finalized);
        assert_eq!(cp.classified_ids(), [1, 2].into_iter().collect());
        assert_eq!(DetailsStore::load(&sink).unwrap().ids(), [1, 2].into_iter().collect());

        transport.panic_on.set(None);
        let report = pipeline.run(&[1, 2, 3], true).unwrap();
        assert_eq!(report.details_added, 1);
        let store = DetailsStore::load(&sink).unwrap();
        assert_eq!(store.ids(), [1, 2, 3].into_iter().collect());
        assert_eq!(store.get(1), Some(&json!({"steam_appid": 1})));
    }

    #[test]
    fn failure_exports_are_written_at_each_checkpoint() {
        let mut transport = ScriptedStore::default();
        for id in 1..=5 {
            transport = transport.script(id, &[None]);
        }
        let sink = MemorySink::new();
        let mut s = settings();
        s.checkpoint_interval = 2;
        let pipeline = Pipeline::new(s, &transport, &sink)
            .unwrap()
            .with_sleeper(&NoSleep);

        let report = pipeline.run(&[1, 2, 3, 4, 5], false).unwrap();
        assert_eq!(report.failed(), (1..=5).collect());

        let writes = sink.writes_to(ExportCategory::FailedFetch.file_name());
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0]["failed_app_ids"], json!([1, 2]));
        assert_eq!(writes[1]["failed_app_ids"], json!([1, 2, 3, 4]));
        assert_eq!(writes[2]["count"], json!(5));
        assert_eq!(sink.writes_to(ExportCategory::AllFailed.file_name()).len(), 3);
    }

    #[test]
    fn stop_mid_retry_round_keeps_untried_ids_failed() {
        let mut transport = ScriptedStore::default();
        for id in 1..=3 {
            transport = transport.script(id, &[None, None, Some(true)]);
        }
        let sink = MemorySink::new();
        let stop = StopSignal::new();
        let pipeline = Pipeline::new(settings(), &transport, &sink)
            .unwrap()
            .with_sleeper(&NoSleep)
            .with_stop_signal(stop.clone());
        pipeline.run(&[1, 2, 3], false).unwrap();
        assert_eq!(
            load_failed_ids(&sink, ExportCategory::AllFailed).unwrap(),
            [1, 2, 3].into_iter().collect()
        );

        *transport.stop_on.borrow_mut() = Some((1, stop.clone()));
        let report = pipeline.retry_failed(5, Duration::ZERO).unwrap();
        assert!(report.stopped);
        assert_eq!(report.rounds.len(), 1);
        assert_eq!(report.rounds[0].run.processed, 1);
        assert_eq!(report.remaining, [2, 3].into_iter().collect());
        assert_eq!(
            load_failed_ids(&sink, ExportCategory::AllFailed).unwrap(),
            [2, 3].into_iter().collect()
        );
        assert_eq!(
            load_failed_ids(&sink, ExportCategory::FailedFetch).unwrap(),
            [2, 3].into_iter().collect()
        );
        assert!(DetailsStore::load(&sink).unwrap().get(1).is_some());
    }

    #[test]
    fn untried_ids_keep_their_failure_category() {
        let sink = MemorySink::new();
        FailureExporter::new(&sink)
            .with_sleeper(&NoSleep)
            .export_sets(&[9].into_iter().collect(), &[2].into_iter().collect());

        let transport = ScriptedStore::default();
        let stop = StopSignal::new();
        *transport.stop_on.borrow_mut() = Some((2, stop.clone()));
        let pipeline = Pipeline::new(settings(), &transport, &sink)
            .unwrap()
            .with_sleeper(&NoSleep)
            .with_stop_signal(stop);

        let report = pipeline.retry_failed(5, Duration::ZERO).unwrap();
        assert!(report.stopped);
        assert_eq!(report.remaining, [9].into_iter().collect());
        assert_eq!(
            load_failed_ids(&sink, ExportCategory::FailedValidation).unwrap(),
            [9].into_iter().collect()
        );
        assert!(load_failed_ids(&sink, ExportCategory::FailedFetch)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let transport = ScriptedStore::default();
        let sink = MemorySink::new();
        let mut s = settings();
        s.checkpoint_interval = 0;
        assert!(matches!(
            Pipeline::new(s, &transport, &sink),
            Err(ConfigError::ZeroCheckpointInterval)
        ));
    }
}
