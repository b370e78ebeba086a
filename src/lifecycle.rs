//! Artifact lifecycle: key resolution and checkpoint uploads
//!
//! Immutable artifacts are uploaded exactly once, when the experiment is
//! added. Mutable artifacts with a local source are re-uploaded by every
//! checkpoint; each upload is an independent task on a bounded pool, so
//! one failing upload never cancels the others.

use crate::blob::BlobStore;
use crate::error::ErrorKind;
use crate::experiment::{Artifact, Experiment};
use crate::registry::paths;
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn, Instrument, Span};

/// Decides how each artifact is persisted and runs checkpoint uploads.
pub struct ArtifactLifecycleManager<B> {
    blobs: Arc<B>,
    uploads: Arc<Semaphore>,
    span: Span,
}

impl<B: BlobStore + 'static> ArtifactLifecycleManager<B> {
    /// Create a manager running at most `upload_concurrency` uploads at once.
    #[must_use]
    pub fn new(blobs: Arc<B>, upload_concurrency: usize) -> Self {
        Self {
            blobs,
            uploads: Arc::new(Semaphore::new(upload_concurrency.max(1))),
            span: Span::none(),
        }
    }

    /// Emit logs and run upload tasks inside `span`.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// The underlying blob store.
    #[must_use]
    pub const fn blobs(&self) -> &Arc<B> {
        &self.blobs
    }

    /// Resolve every artifact's storage key, then its location.
    ///
    /// Mutable keys are derived from the experiment key and tag.
    /// Immutable artifacts with a local source are uploaded now and keep
    /// the key the blob store returns.
    ///
    /// # Errors
    ///
    /// Propagates the first immutable upload failure (`Error::NotFound`
    /// for an unreadable local source).
    pub async fn resolve_artifacts(&self, experiment: &mut Experiment) -> Result<()> {
        let experiment_key = experiment.key().to_string();
        for (tag, artifact) in experiment.artifacts_mut().iter_mut() {
            if artifact.is_mutable() {
                artifact.set_key(paths::mutable_artifact(&experiment_key, tag));
            } else if artifact.local().is_some() {
                let key = self.blobs.put(artifact).instrument(self.span.clone()).await?;
                self.span.in_scope(|| debug!(tag = %tag, key = %key, "uploaded immutable artifact"));
                artifact.set_key(key);
            }
        }
        self.refresh_locations(experiment);
        Ok(())
    }

    /// Recompute `qualified` and `bucket` for every artifact.
    pub fn refresh_locations(&self, experiment: &mut Experiment) {
        let bucket = self.blobs.bucket().to_string();
        for artifact in experiment.artifacts_mut().values_mut() {
            let qualified = artifact.key().map(|key| self.blobs.qualified_location(key));
            artifact.set_location(qualified, bucket.clone());
        }
    }

    /// Launch one upload task per mutable artifact with a local source.
    ///
    /// Returns immediately; await [`CheckpointHandle::wait`] for completion
    /// or drop the handle to let uploads finish in the background.
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn checkpoint(&self, experiment: &Experiment) -> CheckpointHandle {
        let mut tasks = Vec::new();
        for (tag, artifact) in experiment.artifacts() {
            if !artifact.is_checkpointed() {
                continue;
            }
            let artifact = if artifact.key().is_some() {
                artifact.clone()
            } else {
                artifact
                    .clone()
                    .with_key(paths::mutable_artifact(experiment.key(), tag))
            };
            let handle = tokio::spawn(
                upload(Arc::clone(&self.blobs), Arc::clone(&self.uploads), tag.clone(), artifact)
                    .instrument(self.span.clone()),
            );
            tasks.push((tag.clone(), handle));
        }
        self.span.in_scope(|| {
            debug!(key = %experiment.key(), uploads = tasks.len(), "checkpoint launched");
        });
        CheckpointHandle { tasks }
    }
}

async fn upload<B: BlobStore>(
    blobs: Arc<B>,
    uploads: Arc<Semaphore>,
    tag: String,
    artifact: Artifact,
) -> Result<String> {
    let _permit = uploads
        .acquire_owned()
        .await
        .map_err(|_| Error::TaskFailed("upload pool closed".into()))?;
    match blobs.put(&artifact).await {
        Ok(key) => {
            debug!(tag = %tag, key = %key, "checkpoint upload complete");
            Ok(key)
        }
        Err(err) => {
            warn!(tag = %tag, error = %err, "checkpoint upload failed; retried next checkpoint");
            Err(err)
        }
    }
}

/// In-flight uploads of one checkpoint.
#[derive(Debug)]
pub struct CheckpointHandle {
    tasks: Vec<(String, JoinHandle<Result<String>>)>,
}

impl CheckpointHandle {
    /// Number of launched uploads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the checkpoint launched no uploads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tags being uploaded, in launch order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|(tag, _)| tag.as_str())
    }

    /// Wait for every upload and report per-tag outcomes.
    pub async fn wait(self) -> CheckpointReport {
        let mut report = CheckpointReport::default();
        for (tag, handle) in self.tasks {
            match handle.await {
                Ok(Ok(key)) => report.uploaded.push((tag, key)),
                Ok(Err(err)) => report.failed.push((tag, err.kind())),
                Err(join_err) => {
                    warn!(tag = %tag, error = %join_err, "checkpoint upload task aborted");
                    report.failed.push((tag, ErrorKind::Other));
                }
            }
        }
        report
    }
}

/// Outcome of a completed checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointReport {
    /// (tag, storage key) of successful uploads
    pub uploaded: Vec<(String, String)>,
    /// (tag, failure kind) of failed uploads
    pub failed: Vec<(String, ErrorKind)>,
}

impl CheckpointReport {
    /// Whether every upload succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A checkpoint either awaited to completion or still uploading.
#[derive(Debug)]
pub enum CheckpointProgress {
    /// Blocking checkpoint: every upload has finished.
    Completed(CheckpointReport),
    /// Non-blocking checkpoint: uploads continue in the background.
    Pending(CheckpointHandle),
}

impl CheckpointProgress {
    /// Wait for any outstanding uploads.
    pub async fn wait(self) -> CheckpointReport {
        match self {
            Self::Completed(report) => report,
            Self::Pending(handle) => handle.wait().await,
        }
    }

    /// Whether uploads may still be running.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}
