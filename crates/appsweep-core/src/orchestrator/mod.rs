//! Batch orchestrator: walk the identifier sequence, classify each id through
//! the validation and fetch passes, accumulate results, and checkpoint.
//!
//! Processing is strictly sequential so the upstream rate limit is respected;
//! the only suspension points are backoff sleeps and the inter-request delay.

mod checkpoint;
mod result;

pub use checkpoint::{Checkpoint, CHECKPOINT_FILE};
pub use result::{ResultCounts, ResultSets};

use std::time::Duration;

use crate::control::StopSignal;
use crate::retry::{
    AttemptObserver, BackoffPolicy, ClassificationResult, ConfigError, LogObserver,
    RetryExecutor, Sleeper, ThreadSleeper,
};
use crate::sink::{self, PersistWarning, Sink, SinkError};
use crate::transport::Transport;
use crate::types::{AppId, Phase};

/// Immutable run parameters, built once from config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorSettings {
    pub validation: BackoffPolicy,
    pub fetch: BackoffPolicy,
    /// Write a checkpoint after every N input positions.
    pub checkpoint_interval: usize,
    /// Pause between identifiers (not after the last one).
    pub request_delay: Duration,
    /// Run the existence check before fetching details.
    pub validate_before_fetch: bool,
    /// Only process the first K identifiers.
    pub limit: Option<usize>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            validation: BackoffPolicy::validation_default(),
            fetch: BackoffPolicy::fetch_default(),
            checkpoint_interval: 100,
            request_delay: Duration::from_millis(500),
            validate_before_fetch: true,
            limit: None,
        }
    }
}

/// Persists documents that must not lag behind `checkpoint.json` (payloads,
/// exports). Runs with the accumulated results right before every checkpoint
/// after the start snapshot, so a resume never skips an id whose payload was
/// only held in memory.
pub trait CheckpointHook {
    fn before_checkpoint(&mut self, results: &ResultSets) -> Vec<PersistWarning>;
}

impl<F> CheckpointHook for F
where
    F: FnMut(&ResultSets) -> Vec<PersistWarning>,
{
    fn before_checkpoint(&mut self, results: &ResultSets) -> Vec<PersistWarning> {
        self(results)
    }
}

/// Outcome of one orchestrator run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub results: ResultSets,
    /// Input positions handled (including ones skipped as already classified).
    pub processed: usize,
    /// Length of the input after applying `limit`.
    pub total: usize,
    /// True if the stop signal ended the run early.
    pub stopped: bool,
    /// Checkpoints written between the start and final snapshots.
    pub intermediate_checkpoints: usize,
    pub warnings: Vec<PersistWarning>,
}

impl RunReport {
    pub fn counts(&self) -> ResultCounts {
        self.results.counts()
    }
}

pub struct BatchOrchestrator<'a> {
    settings: OrchestratorSettings,
    validation: RetryExecutor,
    fetch: RetryExecutor,
    transport: &'a dyn Transport,
    sink: &'a dyn Sink,
    sleeper: &'a dyn Sleeper,
    observer: Box<dyn AttemptObserver + 'a>,
    hook: Option<Box<dyn CheckpointHook + 'a>>,
    stop: StopSignal,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        settings: OrchestratorSettings,
        transport: &'a dyn Transport,
        sink: &'a dyn Sink,
    ) -> Result<Self, ConfigError> {
        if settings.checkpoint_interval == 0 {
            return Err(ConfigError::ZeroCheckpointInterval);
        }
        Ok(Self {
            validation: RetryExecutor::new(settings.validation, Phase::Validation),
            fetch: RetryExecutor::new(settings.fetch, Phase::Fetch),
            settings,
            transport,
            sink,
            sleeper: &ThreadSleeper,
            observer: Box::new(LogObserver),
            hook: None,
            stop: StopSignal::new(),
        })
    }

    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_observer(mut self, observer: impl AttemptObserver + 'a) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn with_checkpoint_hook(mut self, hook: impl CheckpointHook + 'a) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Process `ids` from scratch.
    pub fn run(&mut self, ids: &[AppId]) -> RunReport {
        self.run_from(ids, ResultSets::new())
    }

    /// Process `ids`, skipping any already classified in the last checkpoint.
    pub fn resume(&mut self, ids: &[AppId]) -> Result<RunReport, SinkError> {
        let prior = match Checkpoint::load(self.sink)? {
            Some(cp) => {
                tracing::info!(
                    processed = cp.processed,
                    classified = cp.classified_ids().len(),
                    "resuming from checkpoint"
                );
                cp.to_results()
            }
            None => ResultSets::new(),
        };
        Ok(self.run_from(ids, prior))
    }

    /// Process `ids`, starting from already-accumulated `results`.
    pub fn run_from(&mut self, ids: &[AppId], mut results: ResultSets) -> RunReport {
        let ids = match self.settings.limit {
            Some(k) => &ids[..k.min(ids.len())],
            None => ids,
        };
        let total = ids.len();
        let interval = self.settings.checkpoint_interval;
        let mut warnings = Vec::new();
        let mut intermediate_checkpoints = 0;
        let mut processed = 0;
        let mut stopped = false;

        self.checkpoint(&results, 0, total, false, &mut warnings);

        for &id in ids {
            if self.stop.is_stop_requested() {
                tracing::info!(processed, total, "stop requested; checkpointing partial results");
                stopped = true;
                break;
            }

            let contacted = if results.contains(id) {
                tracing::debug!(id, "already classified; skipping");
                false
            } else {
                let (phase, verdict) = self.classify_one(id);
                results.record(id, phase, verdict);
                true
            };
            processed += 1;

            if processed % interval == 0 && processed < total {
                tracing::info!(processed, total, "checkpoint");
                if self.checkpoint(&results, processed, total, false, &mut warnings) {
                    intermediate_checkpoints += 1;
                }
            }

            if contacted && processed < total && !self.settings.request_delay.is_zero() {
                self.sleeper.sleep(self.settings.request_delay);
            }
        }

        self.checkpoint(&results, processed, total, !stopped, &mut warnings);

        let counts = results.counts();
        tracing::info!(
            succeeded = counts.succeeded,
            non_existent = counts.non_existent,
            failed = counts.failed,
            stopped,
            "run finished"
        );

        RunReport {
            results,
            processed,
            total,
            stopped,
            intermediate_checkpoints,
            warnings,
        }
    }

    /// Drive one id through both passes. A validation verdict other than
    /// success short-circuits the fetch pass.
    pub fn classify_one(&mut self, id: AppId) -> (Phase, ClassificationResult) {
        let transport = self.transport;
        if self.settings.validate_before_fetch {
            let verdict = self.validation.execute(
                id,
                |id| transport.fetch_existence(id),
                self.sleeper,
                self.observer.as_mut(),
            );
            match verdict {
                ClassificationResult::Succeeded(_) => {}
                other => return (Phase::Validation, other),
            }
        }
        let verdict = self.fetch.execute(
            id,
            |id| transport.fetch_details(id),
            self.sleeper,
            self.observer.as_mut(),
        );
        (Phase::Fetch, verdict)
    }

    /// Returns true when the snapshot was persisted. The hook runs first,
    /// except for the start snapshot.
    fn checkpoint(
        &mut self,
        results: &ResultSets,
        processed: usize,
        total: usize,
        finalized: bool,
        warnings: &mut Vec<PersistWarning>,
    ) -> bool {
        if processed > 0 || finalized {
            if let Some(hook) = self.hook.as_mut() {
                warnings.extend(hook.before_checkpoint(results));
            }
        }
        let cp = Checkpoint::from_results(results, processed, total, finalized);
        match sink::write_with_retry(self.sink, CHECKPOINT_FILE, &cp, self.sleeper) {
            Ok(()) => true,
            Err(w) => {
                warnings.push(w);
                false
            }
        }
    }
}
