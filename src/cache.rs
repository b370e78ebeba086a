//! Validation cache for experiment listings
//!
//! Listing a user's or project's experiments yields keys from an index;
//! the records behind them may be missing or corrupt. A validation pass
//! loads every key on a bounded pool, caches the experiments that load,
//! and prunes the records that don't, so one bad entry never breaks a
//! listing.
//!
//! A pass has two explicit stages:
//! 1. per-key workers produce a [`ValidationOutcome`]
//! 2. a reducer walks the outcomes in key order, caching successes and
//!    purging missing or corrupt records

use crate::error::ErrorKind;
use crate::experiment::Experiment;
use crate::Result;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument, Span};

/// Where a validation pass loads experiments from and purges them to.
pub trait ExperimentSource: Clone + Send + Sync + 'static {
    /// Load and parse the experiment at `key`.
    fn load(&self, key: &str, with_info: bool) -> impl Future<Output = Result<Experiment>> + Send;

    /// Remove the record at `key` and its index entries.
    fn purge(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Result of validating one key.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    /// Validated key
    pub key: String,
    /// Loaded experiment, or why it failed to load
    pub result: std::result::Result<Experiment, ErrorKind>,
    /// Whether the reducer deleted the record
    pub purged: bool,
}

impl ValidationOutcome {
    /// Whether the key loaded.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.result.is_ok()
    }
}

/// Failures that mean the record itself is bad, as opposed to the store
/// being unreachable.
const fn is_prunable(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::NotFound | ErrorKind::CorruptRecord)
}

/// Concurrently populated cache of validated experiments.
#[derive(Debug, Clone)]
pub struct ValidationCache {
    entries: Arc<DashMap<String, Experiment>>,
    pool: Arc<Semaphore>,
    max_keys: usize,
    span: Span,
}

impl ValidationCache {
    /// Cache validating at most `max_keys` keys per pass (`0` = unlimited)
    /// with `pool_size` concurrent loads.
    #[must_use]
    pub fn new(max_keys: usize, pool_size: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            pool: Arc::new(Semaphore::new(pool_size.max(1))),
            max_keys,
            span: Span::none(),
        }
    }

    /// Emit logs and run validation tasks inside `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Cached experiment for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Experiment> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Number of cached experiments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop the cached entry for `key`.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop all cached entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Apply the `max_keys` cap. Truncation happens before validation.
    #[must_use]
    pub fn truncate<'a>(&self, keys: &'a [String]) -> &'a [String] {
        if self.max_keys > 0 && keys.len() > self.max_keys {
            &keys[..self.max_keys]
        } else {
            keys
        }
    }

    /// Validate `keys` against `source`.
    ///
    /// With `blocking`, waits for the whole pass (workers and reducer)
    /// before collecting results. Without it, the pass runs in the
    /// background and the results reflect whatever is cached right now.
    /// Either way the results follow input key order, filtered to cached
    /// keys. Must be called from within a Tokio runtime.
    pub async fn validate<R: ExperimentSource>(
        &self,
        source: &R,
        keys: &[String],
        with_info: bool,
        blocking: bool,
    ) -> ValidationPass {
        let keys = self.truncate(keys).to_vec();
        let driver = tokio::spawn(
            run_pass(self.clone(), source.clone(), keys.clone(), with_info)
                .instrument(self.span.clone()),
        );

        if !blocking {
            return ValidationPass {
                experiments: self.collect(&keys),
                pending: Some(driver),
                outcomes: Vec::new(),
            };
        }

        let outcomes = match driver.await {
            Ok(outcomes) => outcomes,
            Err(err) => {
                self.span
                    .in_scope(|| warn!(error = %err, "validation pass aborted"));
                Vec::new()
            }
        };
        ValidationPass {
            experiments: self.collect(&keys),
            pending: None,
            outcomes,
        }
    }

    fn collect(&self, keys: &[String]) -> Vec<Experiment> {
        keys.iter().filter_map(|key| self.get(key)).collect()
    }

    /// Reducer step: cache successes, purge bad records, log failures.
    async fn reduce<R: ExperimentSource>(&self, source: &R, outcome: &mut ValidationOutcome) {
        match &outcome.result {
            Ok(experiment) => {
                self.entries.insert(outcome.key.clone(), experiment.clone());
            }
            Err(kind) if is_prunable(*kind) => {
                warn!(
                    key = %outcome.key,
                    kind = ?kind,
                    "experiment does not exist or is corrupted, deleting record"
                );
                self.invalidate(&outcome.key);
                match source.purge(&outcome.key).await {
                    Ok(()) => outcome.purged = true,
                    Err(err) => debug!(key = %outcome.key, error = %err, "purge failed"),
                }
            }
            Err(kind) => {
                warn!(key = %outcome.key, kind = ?kind, "experiment could not be validated");
            }
        }
    }
}

async fn run_pass<R: ExperimentSource>(
    cache: ValidationCache,
    source: R,
    keys: Vec<String>,
    with_info: bool,
) -> Vec<ValidationOutcome> {
    let workers: Vec<_> = keys
        .into_iter()
        .map(|key| {
            let source = source.clone();
            let pool = Arc::clone(&cache.pool);
            let task_key = key.clone();
            let handle = tokio::spawn(
                async move {
                    let _permit = pool.acquire_owned().await.ok();
                    source.load(&task_key, with_info).await.map_err(|e| e.kind())
                }
                .in_current_span(),
            );
            (key, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(workers.len());
    for (key, handle) in workers {
        let result = handle.await.unwrap_or(Err(ErrorKind::Other));
        let mut outcome = ValidationOutcome {
            key,
            result,
            purged: false,
        };
        cache.reduce(&source, &mut outcome).await;
        outcomes.push(outcome);
    }
    debug!(
        validated = outcomes.iter().filter(|o| o.is_valid()).count(),
        total = outcomes.len(),
        "validation pass complete"
    );
    outcomes
}

/// Results of a validation pass.
#[derive(Debug)]
pub struct ValidationPass {
    experiments: Vec<Experiment>,
    pending: Option<JoinHandle<Vec<ValidationOutcome>>>,
    outcomes: Vec<ValidationOutcome>,
}

impl ValidationPass {
    /// Cached experiments in input key order.
    #[must_use]
    pub fn experiments(&self) -> &[Experiment] {
        &self.experiments
    }

    /// Take the cached experiments.
    #[must_use]
    pub fn into_experiments(self) -> Vec<Experiment> {
        self.experiments
    }

    /// Whether the pass is still running in the background.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Per-key outcomes, waiting for a background pass if necessary.
    pub async fn outcomes(self) -> Vec<ValidationOutcome> {
        match self.pending {
            Some(handle) => handle.await.unwrap_or_default(),
            None => self.outcomes,
        }
    }
}
