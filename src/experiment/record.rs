//! Experiment - root entity of the registry

use super::{Artifact, GitInfo};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Lifecycle status of an experiment.
///
/// Conceptually `Waiting → Running → {Stopped, Finished}`. The registry
/// writes whatever status it is asked to; `Stopped` is a cooperative
/// signal that the executing worker polls for, not a kill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    /// Added, not yet picked up by a worker.
    #[default]
    Waiting,
    /// Executing on a worker.
    Running,
    /// Cancellation requested.
    Stopped,
    /// Completed.
    Finished,
}

impl ExperimentStatus {
    /// Status as stored in the keyed store.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Finished => "finished",
        }
    }
}

impl std::fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived info computed on read; never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExperimentInfo {
    /// Experiment type; detection is not implemented, so always `"unknown"`.
    pub kind: String,
    /// Reduced metric value, if the experiment names a metric and it was found.
    pub metric_value: Option<f64>,
    /// Lines of the output log, if it could be streamed.
    pub logtail: Option<Vec<String>>,
}

/// Experiment represents one tracked unit of work.
///
/// Timestamps are seconds since the Unix epoch with sub-second precision,
/// which is also how they are stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experiment {
    #[serde(default)]
    key: String,
    status: ExperimentStatus,
    time_added: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_started: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_finished: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_last_checkpoint: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metric: Option<String>,
    #[serde(default)]
    artifacts: BTreeMap<String, Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    git: Option<GitInfo>,
    #[serde(skip)]
    info: Option<ExperimentInfo>,
}

impl Experiment {
    /// Create a new, not yet added experiment.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        ExperimentBuilder::new(key).build()
    }

    /// Create a builder for an experiment with optional fields.
    #[must_use]
    pub fn builder(key: impl Into<String>) -> ExperimentBuilder {
        ExperimentBuilder::new(key)
    }

    /// Parse a stored record.
    ///
    /// The record's own `key` field, if any, is ignored in favour of `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::CorruptRecord` if the record is not an object or a
    /// required field (`status`, `time_added`, artifact `mutable`) is
    /// missing or malformed.
    pub fn from_record(key: &str, record: Value) -> Result<Self> {
        if !record.is_object() {
            return Err(Error::corrupt(key, "record is not an object"));
        }
        let mut experiment: Self =
            serde_json::from_value(record).map_err(|e| Error::corrupt(key, e))?;
        if experiment.time_added.is_none() {
            return Err(Error::corrupt(key, "missing field `time_added`"));
        }
        key.clone_into(&mut experiment.key);
        Ok(experiment)
    }

    /// Serialize into the stored record shape.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if the record cannot be encoded.
    pub fn to_record(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Experiment key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// When the experiment was added.
    #[must_use]
    pub const fn time_added(&self) -> Option<f64> {
        self.time_added
    }

    /// When the experiment started running.
    #[must_use]
    pub const fn time_started(&self) -> Option<f64> {
        self.time_started
    }

    /// When the experiment finished.
    #[must_use]
    pub const fn time_finished(&self) -> Option<f64> {
        self.time_finished
    }

    /// When the last checkpoint was initiated.
    #[must_use]
    pub const fn time_last_checkpoint(&self) -> Option<f64> {
        self.time_last_checkpoint
    }

    /// Owning identity as recorded at add time.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Project the experiment is indexed under.
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Metric spec, `"<name>"` or `"<name>:<reducer>"`.
    #[must_use]
    pub fn metric(&self) -> Option<&str> {
        self.metric.as_deref()
    }

    /// Artifacts by tag.
    #[must_use]
    pub const fn artifacts(&self) -> &BTreeMap<String, Artifact> {
        &self.artifacts
    }

    /// Artifact by tag.
    #[must_use]
    pub fn artifact(&self, tag: &str) -> Option<&Artifact> {
        self.artifacts.get(tag)
    }

    /// Git snapshot, if captured.
    #[must_use]
    pub const fn git(&self) -> Option<&GitInfo> {
        self.git.as_ref()
    }

    /// Derived info, if loaded with it.
    #[must_use]
    pub const fn info(&self) -> Option<&ExperimentInfo> {
        self.info.as_ref()
    }

    pub(crate) fn artifacts_mut(&mut self) -> &mut BTreeMap<String, Artifact> {
        &mut self.artifacts
    }

    pub(crate) fn mark_added(&mut self, at: f64, owner: String) {
        self.time_added = Some(at);
        self.status = ExperimentStatus::Waiting;
        self.owner = Some(owner);
    }

    pub(crate) fn mark_started(&mut self, at: f64) {
        self.time_started = Some(at);
        self.status = ExperimentStatus::Running;
    }

    pub(crate) fn mark_finished(&mut self, at: f64) {
        self.time_finished = Some(at);
        self.status = ExperimentStatus::Finished;
    }

    pub(crate) fn set_git(&mut self, git: Option<GitInfo>) {
        self.git = git;
    }

    pub(crate) fn set_info(&mut self, info: ExperimentInfo) {
        self.info = Some(info);
    }
}

/// Builder for `Experiment`.
#[derive(Debug)]
pub struct ExperimentBuilder {
    key: String,
    project: Option<String>,
    metric: Option<String>,
    artifacts: BTreeMap<String, Artifact>,
}

impl ExperimentBuilder {
    /// Create a new builder with the required key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            project: None,
            metric: None,
            artifacts: BTreeMap::new(),
        }
    }

    /// Index the experiment under a project.
    #[must_use]
    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Set the metric spec, e.g. `"loss:min"`.
    #[must_use]
    pub fn metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }

    /// Attach an artifact under `tag`.
    #[must_use]
    pub fn artifact(mut self, tag: impl Into<String>, artifact: Artifact) -> Self {
        self.artifacts.insert(tag.into(), artifact);
        self
    }

    /// Build the `Experiment`.
    #[must_use]
    pub fn build(self) -> Experiment {
        Experiment {
            key: self.key,
            status: ExperimentStatus::Waiting,
            time_added: None,
            time_started: None,
            time_finished: None,
            time_last_checkpoint: None,
            owner: None,
            project: self.project,
            metric: self.metric,
            artifacts: self.artifacts,
            git: None,
            info: None,
        }
    }
}

/// An experiment addressed either by key or by value.
#[derive(Debug, Clone, Copy)]
pub enum ExperimentRef<'a> {
    /// Raw experiment key
    Key(&'a str),
    /// In-memory experiment
    Experiment(&'a Experiment),
}

impl ExperimentRef<'_> {
    /// Key of the referenced experiment.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Key(key) => key,
            Self::Experiment(experiment) => experiment.key(),
        }
    }
}

impl<'a> From<&'a str> for ExperimentRef<'a> {
    fn from(key: &'a str) -> Self {
        Self::Key(key)
    }
}

impl<'a> From<&'a String> for ExperimentRef<'a> {
    fn from(key: &'a String) -> Self {
        Self::Key(key)
    }
}

impl<'a> From<&'a Experiment> for ExperimentRef<'a> {
    fn from(experiment: &'a Experiment) -> Self {
        Self::Experiment(experiment)
    }
}
