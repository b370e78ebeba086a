//! Derived info: metric extraction and log tails
//!
//! An experiment's `metric` field names a scalar series in its event-log
//! artifact (`"loss"`, `"loss:min"`, `"accuracy:max"`). The extractor
//! streams that artifact, decodes every regular file in it, and folds
//! the matching observations with the requested reducer.
//!
//! Nothing here fails the surrounding read: derived info that cannot be
//! computed is simply absent.

use crate::blob::archive::unpack_members;
use crate::blob::BlobStore;
use crate::experiment::{Experiment, ExperimentInfo};
use crate::{Error, Result};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, Span};

/// Artifact tag holding the event-log archive.
pub const EVENT_LOG_TAG: &str = "tb";
/// Artifact tag holding the captured output log.
pub const OUTPUT_LOG_TAG: &str = "output";

/// How observations of a series fold into one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reducer {
    /// Running minimum.
    Min,
    /// Running maximum.
    Max,
    /// Most recently logged value wins.
    #[default]
    Last,
}

impl Reducer {
    /// Parse a reducer token; absent or unrecognized tokens mean `Last`.
    #[must_use]
    pub fn from_token(token: Option<&str>) -> Self {
        match token {
            Some("min") => Self::Min,
            Some("max") => Self::Max,
            _ => Self::Last,
        }
    }

    /// Fold one observation into the accumulator.
    #[must_use]
    pub fn fold(self, acc: Option<f64>, value: f64) -> f64 {
        match (self, acc) {
            (Self::Min, Some(acc)) => acc.min(value),
            (Self::Max, Some(acc)) => acc.max(value),
            _ => value,
        }
    }

    /// Reduce a sequence of observations, in write order.
    pub fn reduce<I: IntoIterator<Item = f64>>(self, values: I) -> Option<f64> {
        values
            .into_iter()
            .fold(None, |acc, value| Some(self.fold(acc, value)))
    }
}

/// Parsed `"<name>"` / `"<name>:<reducer>"` metric spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSpec {
    name: String,
    reducer: Reducer,
}

impl MetricSpec {
    /// Series name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reducer applied to the series.
    #[must_use]
    pub const fn reducer(&self) -> Reducer {
        self.reducer
    }
}

impl FromStr for MetricSpec {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self> {
        let (name, token) = match spec.split_once(':') {
            Some((name, token)) => (name, Some(token)),
            None => (spec, None),
        };
        if name.is_empty() {
            return Err(Error::InvalidInput(format!("metric spec {spec:?} has no name")));
        }
        Ok(Self {
            name: name.to_string(),
            reducer: Reducer::from_token(token),
        })
    }
}

/// One scalar observation from an event log.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScalarEvent {
    /// Series name
    pub tag: String,
    /// Observed value
    #[serde(alias = "simple_value")]
    pub value: f64,
}

/// Decodes the scalar observations of one event-log file.
///
/// Log formats are owned by the producers; implement this trait to plug
/// one in. Undecodable input yields no events rather than an error.
pub trait EventDecoder: Send + Sync {
    /// Observations in the order they were written.
    fn decode(&self, data: &[u8]) -> Vec<ScalarEvent>;
}

/// Decoder for one JSON object per line: `{"tag": "loss", "value": 0.5}`.
///
/// Blank or malformed lines are skipped; extra fields are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesDecoder;

impl EventDecoder for JsonLinesDecoder {
    fn decode(&self, data: &[u8]) -> Vec<ScalarEvent> {
        String::from_utf8_lossy(data)
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

/// Computes metric values and log tails for experiments.
pub struct MetricExtractor<B> {
    blobs: Arc<B>,
    decoder: Arc<dyn EventDecoder>,
    span: Span,
}

impl<B: BlobStore> MetricExtractor<B> {
    /// Create an extractor decoding event logs as JSON lines.
    #[must_use]
    pub fn new(blobs: Arc<B>) -> Self {
        Self {
            blobs,
            decoder: Arc::new(JsonLinesDecoder),
            span: Span::none(),
        }
    }

    /// Use a different event-log decoder.
    #[must_use]
    pub fn with_decoder(mut self, decoder: Arc<dyn EventDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Emit logs inside `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Reduce the experiment's metric series.
    ///
    /// `Ok(None)` if the experiment names no metric, has no event-log
    /// artifact, or the series never appears.
    ///
    /// # Errors
    ///
    /// Returns `Error::DerivedInfo` if the event log cannot be streamed or
    /// unpacked.
    pub async fn extract_metric(&self, experiment: &Experiment) -> Result<Option<f64>> {
        let Some(spec) = experiment.metric() else {
            return Ok(None);
        };
        let spec: MetricSpec = spec.parse()?;
        let Some(artifact) = experiment.artifact(EVENT_LOG_TAG) else {
            return Ok(None);
        };

        let bytes = self
            .blobs
            .stream(artifact)
            .await
            .map_err(|e| Error::DerivedInfo(format!("event log stream: {e}")))?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let members =
            unpack_members(&bytes).map_err(|e| Error::DerivedInfo(format!("event log: {e}")))?;

        let observations = members.iter().flat_map(|member| {
            self.decoder
                .decode(&member.data)
                .into_iter()
                .filter(|event| event.tag == spec.name())
                .map(|event| event.value)
        });
        Ok(spec.reducer().reduce(observations))
    }

    /// Lines of the experiment's output log, with progress redraws resolved.
    ///
    /// `Ok(None)` if the experiment has no output artifact or nothing is
    /// stored for it.
    ///
    /// # Errors
    ///
    /// Returns `Error::DerivedInfo` if the log cannot be streamed or unpacked.
    pub async fn read_logtail(&self, experiment: &Experiment) -> Result<Option<Vec<String>>> {
        let Some(artifact) = experiment.artifact(OUTPUT_LOG_TAG) else {
            return Ok(None);
        };
        let bytes = self
            .blobs
            .stream(artifact)
            .await
            .map_err(|e| Error::DerivedInfo(format!("output log stream: {e}")))?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let members =
            unpack_members(&bytes).map_err(|e| Error::DerivedInfo(format!("output log: {e}")))?;
        let first = members
            .first()
            .ok_or_else(|| Error::DerivedInfo("output log archive is empty".into()))?;

        let text = strip_control_sequences(&String::from_utf8_lossy(&first.data));
        Ok(Some(text.lines().map(str::to_string).collect()))
    }

    /// Compute all derived info, absorbing failures into absent fields.
    pub async fn experiment_info(&self, experiment: &Experiment) -> ExperimentInfo {
        let logtail = self.read_logtail(experiment).await.unwrap_or_else(|err| {
            self.span
                .in_scope(|| info!(key = %experiment.key(), error = %err, "log tail unavailable"));
            None
        });
        let metric_value = self.extract_metric(experiment).await.unwrap_or_else(|err| {
            self.span
                .in_scope(|| info!(key = %experiment.key(), error = %err, "metric unavailable"));
            None
        });
        self.span.in_scope(|| {
            debug!(key = %experiment.key(), metric = ?metric_value, "derived info computed");
        });

        ExperimentInfo {
            kind: "unknown".to_string(),
            metric_value,
            logtail,
        }
    }
}

/// Resolve terminal redraw sequences the way a terminal would display them.
///
/// - backspace erases the previous character of the line
/// - a bare carriage return restarts the line
/// - ANSI escape sequences are dropped
#[must_use]
pub fn strip_control_sequences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut line = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\n' => {
                out.push_str(&line);
                out.push('\n');
                line.clear();
            }
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    line.clear();
                }
            }
            '\u{8}' => {
                line.pop();
            }
            '\u{1b}' => {
                if chars.next_if_eq(&'[').is_some() {
                    // CSI: parameters until a final byte in '@'..='~'
                    for next in chars.by_ref() {
                        if ('@'..='~').contains(&next) {
                            break;
                        }
                    }
                } else {
                    chars.next();
                }
            }
            other => line.push(other),
        }
    }
    out.push_str(&line);
    out
}
