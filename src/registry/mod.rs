//! Experiment registry
//!
//! The orchestrator: owns the path scheme (see [`paths`]), the status
//! state machine and ownership checks, and composes the keyed store, blob
//! store, lifecycle manager, metric extractor and validation cache into
//! the add/start/stop/finish/delete/checkpoint/query operations.
//!
//! No lock guards the registry. Writes to distinct paths are unordered
//! relative to each other and concurrent `add` calls on one key race
//! with last-writer-wins; the keyed store's per-path atomicity is the
//! only guarantee.
//!
//! # Example
//!
//! ```rust
//! use trueno_registry::experiment::{Experiment, ExperimentStatus};
//! use trueno_registry::principal::StaticPrincipal;
//! use trueno_registry::{ExperimentRegistry, RegistryConfig};
//!
//! # async fn example() -> trueno_registry::Result<()> {
//! let registry =
//!     ExperimentRegistry::in_memory(StaticPrincipal::new("alice"), RegistryConfig::default())
//!         .await?;
//!
//! let mut experiment = Experiment::builder("exp-001").project("vision").build();
//! registry.add(&mut experiment).await?;
//!
//! let stored = registry.get("exp-001", false).await?;
//! assert_eq!(stored.status(), ExperimentStatus::Waiting);
//! assert!(registry.can_write("exp-001", Some("alice")).await?);
//! # Ok(())
//! # }
//! ```

pub mod paths;

use crate::blob::{BlobStore, MemoryBlobStore};
use crate::cache::{ExperimentSource, ValidationCache, ValidationPass};
use crate::config::RegistryConfig;
use crate::experiment::{unix_timestamp, Artifact, Experiment, ExperimentRef, GitInfo};
use crate::kv::{KeyedStore, MemoryKeyedStore};
use crate::lifecycle::{ArtifactLifecycleManager, CheckpointProgress};
use crate::metric::{EventDecoder, JsonLinesDecoder, MetricExtractor};
use crate::principal::{AccessPrincipal, GUEST_IDENTITY};
use crate::telemetry::component_span;
use crate::{Error, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn, Span};

/// Artifact tag of the submitted source tree; git metadata is captured from it.
pub const WORKSPACE_TAG: &str = "workspace";

struct Inner<S, B, P> {
    store: Arc<S>,
    lifecycle: ArtifactLifecycleManager<B>,
    extractor: MetricExtractor<B>,
    principal: P,
    cache: ValidationCache,
    config: RegistryConfig,
    span: Span,
}

/// Experiment registry bound to a keyed store, a blob store and a principal.
///
/// Cheap to clone; clones share the stores and the validation cache.
pub struct ExperimentRegistry<S, B, P> {
    inner: Arc<Inner<S, B, P>>,
}

impl<S, B, P> Clone for ExperimentRegistry<S, B, P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> ExperimentRegistry<MemoryKeyedStore, MemoryBlobStore, P>
where
    P: AccessPrincipal + 'static,
{
    /// Registry over fresh in-memory stores, blobs in `config.bucket`.
    ///
    /// # Errors
    ///
    /// See [`ExperimentRegistry::open`].
    pub async fn in_memory(principal: P, config: RegistryConfig) -> Result<Self> {
        let blobs = Arc::new(MemoryBlobStore::new(config.bucket.clone()));
        Self::open(Arc::new(MemoryKeyedStore::new()), blobs, principal, config).await
    }
}

impl<S, B, P> ExperimentRegistry<S, B, P>
where
    S: KeyedStore + 'static,
    B: BlobStore + 'static,
    P: AccessPrincipal + 'static,
{
    /// Open a registry decoding event logs as JSON lines.
    ///
    /// Records the principal's email under `users/<identity>/email` when
    /// the session is authenticated and not expired.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `config` is invalid, or the store error
    /// if the email cannot be written.
    pub async fn open(
        store: Arc<S>,
        blobs: Arc<B>,
        principal: P,
        config: RegistryConfig,
    ) -> Result<Self> {
        Self::open_with_decoder(store, blobs, principal, config, Arc::new(JsonLinesDecoder)).await
    }

    /// Open a registry with a custom event-log decoder.
    ///
    /// # Errors
    ///
    /// See [`ExperimentRegistry::open`].
    pub async fn open_with_decoder(
        store: Arc<S>,
        blobs: Arc<B>,
        principal: P,
        config: RegistryConfig,
        decoder: Arc<dyn EventDecoder>,
    ) -> Result<Self> {
        config.validate()?;

        let lifecycle = ArtifactLifecycleManager::new(Arc::clone(&blobs), config.upload_concurrency)
            .with_span(component_span("lifecycle"));
        let extractor = MetricExtractor::new(blobs)
            .with_decoder(decoder)
            .with_span(component_span("metric"));
        let cache = ValidationCache::new(config.max_keys, config.worker_pool_size)
            .with_span(component_span("cache"));

        let registry = Self {
            inner: Arc::new(Inner {
                store,
                lifecycle,
                extractor,
                principal,
                cache,
                config,
                span: component_span("registry"),
            }),
        };
        registry.record_session().await?;
        Ok(registry)
    }

    async fn record_session(&self) -> Result<()> {
        if !self.is_authenticated() || self.is_auth_expired() {
            return Ok(());
        }
        let Some(email) = self.inner.principal.email() else {
            return Ok(());
        };
        let identity = self.identity();
        self.inner
            .store
            .set(&paths::user_email(&identity), json!(email))
            .await?;
        self.inner
            .span
            .in_scope(|| debug!(identity = %identity, "session email recorded"));
        Ok(())
    }

    /// Identity of the caller; the guest identity when `config.guest` is set.
    #[must_use]
    pub fn identity(&self) -> String {
        if self.inner.config.guest {
            GUEST_IDENTITY.to_string()
        } else {
            self.inner.principal.current_identity()
        }
    }

    fn is_authenticated(&self) -> bool {
        self.identity() != GUEST_IDENTITY
    }

    /// Whether the principal's credentials have expired. Guests never expire.
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        !self.inner.config.guest && self.inner.principal.is_expired()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// The keyed store records live in.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    /// The blob store artifact bytes live in.
    #[must_use]
    pub fn blobs(&self) -> &Arc<B> {
        self.inner.lifecycle.blobs()
    }

    /// The validation cache behind listings.
    #[must_use]
    pub fn cache(&self) -> &ValidationCache {
        &self.inner.cache
    }

    /// Add an experiment, overwriting any record at the same key.
    ///
    /// Stamps `time_added` and `waiting`, captures git metadata from an
    /// existing local workspace, resolves every artifact's key and
    /// location (uploading immutable artifacts), writes the record and
    /// its index entries, then runs a blocking checkpoint. The caller's
    /// `experiment` is updated in place.
    ///
    /// The prior record is deleted unconditionally; its blobs are not.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the key, an artifact tag or the
    /// project is not a single path segment (checked before anything is
    /// written), `Error::NotFound` if an immutable artifact's local source is
    /// unreadable, `Error::PermissionDenied` if ownership is enforced and
    /// the caller does not own an existing record, and store errors
    /// unmodified. Failed checkpoint uploads are logged, not returned.
    #[instrument(parent = &self.inner.span, skip_all, fields(key = %experiment.key()))]
    pub async fn add(&self, experiment: &mut Experiment) -> Result<()> {
        let key = experiment.key().to_string();
        check_key(&key)?;
        for tag in experiment.artifacts().keys() {
            check_segment("artifact tag", tag)?;
        }
        if let Some(project) = experiment.project() {
            check_segment("project", project)?;
        }
        let identity = self.identity();
        check_segment("identity", &identity)?;
        self.ensure_writable(&key).await?;

        let store = &self.inner.store;
        store.delete(&paths::experiment(&key)).await?;
        self.inner.cache.invalidate(&key);

        let time_added = unix_timestamp();
        experiment.mark_added(time_added, identity.clone());
        experiment.set_git(capture_git(experiment).await);

        self.inner.lifecycle.resolve_artifacts(experiment).await?;

        store
            .set(&paths::experiment(&key), experiment.to_record()?)
            .await?;
        store
            .set(&paths::user_experiment(&identity, &key), json!(time_added))
            .await?;
        if let Some(project) = experiment.project() {
            if self.is_authenticated() {
                store
                    .set(&paths::project_owner(project, &key), json!(identity))
                    .await?;
            }
        }

        self.run_checkpoint(experiment, true).await?;
        info!(owner = %identity, "added experiment");
        Ok(())
    }

    /// Mark the experiment running and launch a non-blocking checkpoint.
    ///
    /// Writes `status` and `time_started` as partial updates.
    ///
    /// # Errors
    ///
    /// Returns `Error::PermissionDenied` under enforced ownership, and
    /// store errors unmodified.
    #[instrument(parent = &self.inner.span, skip_all, fields(key = %experiment.key()))]
    pub async fn start(&self, experiment: &mut Experiment) -> Result<CheckpointProgress> {
        let key = experiment.key().to_string();
        check_key(&key)?;
        self.ensure_writable(&key).await?;

        experiment.mark_started(unix_timestamp());
        let store = &self.inner.store;
        store
            .set(
                &paths::experiment_field(&key, "status"),
                json!(experiment.status().as_str()),
            )
            .await?;
        store
            .set(
                &paths::experiment_field(&key, "time_started"),
                json!(experiment.time_started()),
            )
            .await?;
        info!("started experiment");

        self.run_checkpoint(experiment, false).await
    }

    /// Request cooperative cancellation by writing `status = stopped`.
    ///
    /// The executing worker polls for this; nothing is killed here. Any
    /// process may stop any experiment, so ownership is never enforced.
    ///
    /// # Errors
    ///
    /// Returns store errors unmodified.
    pub async fn stop<'a>(&self, target: impl Into<ExperimentRef<'a>>) -> Result<()> {
        let target = target.into();
        let key = target.key();
        check_key(key)?;
        self.inner
            .store
            .set(&paths::experiment_field(key, "status"), json!("stopped"))
            .await?;
        self.inner.cache.invalidate(key);
        self.inner
            .span
            .in_scope(|| info!(key = %key, "stop requested"));
        Ok(())
    }

    /// Mark the stored experiment at `key` finished.
    ///
    /// Only `status` and `time_finished` are written; no checkpoint runs.
    /// Returns the recorded `time_finished`.
    ///
    /// # Errors
    ///
    /// Returns `Error::PermissionDenied` under enforced ownership, and
    /// store errors unmodified.
    pub async fn finish(&self, key: &str) -> Result<f64> {
        check_key(key)?;
        self.ensure_writable(key).await?;
        self.write_finished(key, unix_timestamp()).await
    }

    /// Checkpoint the experiment, blocking, then mark it finished.
    ///
    /// The caller's `experiment` is updated in place. Returns the recorded
    /// `time_finished`.
    ///
    /// # Errors
    ///
    /// As [`ExperimentRegistry::finish`].
    #[instrument(parent = &self.inner.span, skip_all, fields(key = %experiment.key()))]
    pub async fn finish_experiment(&self, experiment: &mut Experiment) -> Result<f64> {
        let key = experiment.key().to_string();
        check_key(&key)?;
        self.ensure_writable(&key).await?;

        let time_finished = unix_timestamp();
        self.run_checkpoint(experiment, true).await?;
        self.write_finished(&key, time_finished).await?;
        experiment.mark_finished(time_finished);
        Ok(time_finished)
    }

    async fn write_finished(&self, key: &str, time_finished: f64) -> Result<f64> {
        let store = &self.inner.store;
        store
            .set(&paths::experiment_field(key, "status"), json!("finished"))
            .await?;
        store
            .set(
                &paths::experiment_field(key, "time_finished"),
                json!(time_finished),
            )
            .await?;
        self.inner.cache.invalidate(key);
        self.inner
            .span
            .in_scope(|| info!(key = %key, "finished experiment"));
        Ok(time_finished)
    }

    /// Delete an experiment, its blobs and its index entries.
    ///
    /// Lenient: if the record cannot be loaded only the index entries and
    /// the record path are removed, and an artifact blob that fails to
    /// delete is logged and left orphaned. Not transactional.
    ///
    /// # Errors
    ///
    /// Returns `Error::PermissionDenied` under enforced ownership, and
    /// store errors from index or record deletion.
    pub async fn delete<'a>(&self, target: impl Into<ExperimentRef<'a>>) -> Result<()> {
        let target = target.into();
        let key = target.key().to_string();
        check_key(&key)?;
        self.ensure_writable(&key).await?;

        let loaded = match target {
            ExperimentRef::Experiment(experiment) => Some(experiment.clone()),
            ExperimentRef::Key(_) => match self.get(&key, false).await {
                Ok(experiment) => Some(experiment),
                Err(err) => {
                    self.inner.span.in_scope(|| {
                        debug!(key = %key, error = %err, "record unavailable, removing index entries only");
                    });
                    None
                }
            },
        };

        let store = &self.inner.store;
        let identity = self.identity();
        store.delete(&paths::user_experiment(&identity, &key)).await?;

        if let Some(experiment) = &loaded {
            if let Some(owner) = experiment.owner().filter(|owner| *owner != identity) {
                store.delete(&paths::user_experiment(owner, &key)).await?;
            }
            self.delete_blobs(experiment).await;
            if let Some(project) = experiment.project() {
                store.delete(&paths::project_member(project, &key)).await?;
            }
        }

        store.delete(&paths::experiment(&key)).await?;
        self.inner.cache.invalidate(&key);
        self.inner
            .span
            .in_scope(|| info!(key = %key, loaded = loaded.is_some(), "deleted experiment"));
        Ok(())
    }

    async fn delete_blobs(&self, experiment: &Experiment) {
        let blobs = self.blobs();
        for (tag, artifact) in experiment.artifacts() {
            let Some(artifact_key) = artifact.key() else {
                continue;
            };
            self.inner
                .span
                .in_scope(|| debug!(tag = %tag, artifact_key = %artifact_key, "deleting artifact"));
            if let Err(err) = blobs.delete(artifact).await {
                self.inner.span.in_scope(|| {
                    warn!(tag = %tag, artifact_key = %artifact_key, error = %err, "artifact left orphaned");
                });
            }
        }
    }

    /// Upload every mutable artifact with a local source.
    ///
    /// `time_last_checkpoint` is written as soon as uploads are launched,
    /// so it records when the checkpoint was initiated, not completed.
    /// With `blocking`, waits for every upload; otherwise returns the
    /// in-flight uploads. Failed uploads are reported, never returned as
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns `Error::PermissionDenied` under enforced ownership, and
    /// the store error if the timestamp cannot be written.
    #[instrument(parent = &self.inner.span, skip_all, fields(key = %experiment.key(), blocking = blocking))]
    pub async fn checkpoint(
        &self,
        experiment: &Experiment,
        blocking: bool,
    ) -> Result<CheckpointProgress> {
        check_key(experiment.key())?;
        self.ensure_writable(experiment.key()).await?;
        self.run_checkpoint(experiment, blocking).await
    }

    /// Checkpoint the stored experiment at `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` or `Error::CorruptRecord` if the record
    /// cannot be loaded, otherwise as [`ExperimentRegistry::checkpoint`].
    pub async fn checkpoint_key(&self, key: &str, blocking: bool) -> Result<CheckpointProgress> {
        let experiment = self.get(key, false).await?;
        self.checkpoint(&experiment, blocking).await
    }

    async fn run_checkpoint(
        &self,
        experiment: &Experiment,
        blocking: bool,
    ) -> Result<CheckpointProgress> {
        let key = experiment.key();
        let handle = self.inner.lifecycle.checkpoint(experiment);
        self.inner
            .store
            .set(
                &paths::experiment_field(key, "time_last_checkpoint"),
                json!(unix_timestamp()),
            )
            .await?;
        self.inner.cache.invalidate(key);

        if !blocking {
            return Ok(CheckpointProgress::Pending(handle));
        }
        let report = handle.wait().await;
        if !report.is_complete() {
            self.inner.span.in_scope(|| {
                warn!(key = %key, failed = report.failed.len(), "checkpoint incomplete");
            });
        }
        Ok(CheckpointProgress::Completed(report))
    }

    /// Load the experiment at `key`, optionally with derived info.
    ///
    /// Derived info never fails the call; fields that cannot be computed
    /// are absent.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no record exists, `Error::CorruptRecord`
    /// if it does not parse, and store errors unmodified.
    #[instrument(parent = &self.inner.span, skip_all, fields(key = %key, with_info = with_info))]
    pub async fn get(&self, key: &str, with_info: bool) -> Result<Experiment> {
        check_key(key)?;
        let record = self
            .inner
            .store
            .get(&paths::experiment(key))
            .await?
            .ok_or_else(|| Error::NotFound(paths::experiment(key)))?;
        let mut experiment = Experiment::from_record(key, record)?;

        if with_info {
            let info = self.inner.extractor.experiment_info(&experiment).await;
            experiment.set_info(info);
        }
        Ok(experiment)
    }

    /// Experiment keys of a user, most recently added first.
    ///
    /// `user` may be an identity or an email (anything containing `@`);
    /// `None` means the caller. An unknown email yields no keys. Ordering
    /// comes from the personal index, not from the records.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the identity is not a single path
    /// segment, and store errors unmodified.
    pub async fn list_for_user(&self, user: Option<&str>) -> Result<Vec<String>> {
        let identity = match user {
            None => self.identity(),
            Some(email) if email.contains('@') => match self.resolve_email(email).await? {
                Some(identity) => identity,
                None => return Ok(Vec::new()),
            },
            Some(identity) => identity.to_string(),
        };
        check_segment("identity", &identity)?;

        let index = self
            .inner
            .store
            .get(&paths::user_experiments(&identity))
            .await?;
        let Some(Value::Object(index)) = index else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<(String, f64)> = index
            .into_iter()
            .filter_map(|(key, value)| match value.as_f64() {
                Some(time_added) => Some((key, time_added)),
                None => {
                    self.inner.span.in_scope(|| {
                        warn!(identity = %identity, key = %key, "index entry has no time_added, skipping");
                    });
                    None
                }
            })
            .collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(entries.into_iter().map(|(key, _)| key).collect())
    }

    async fn resolve_email(&self, email: &str) -> Result<Option<String>> {
        let users = self.users().await?;
        Ok(users
            .into_iter()
            .find(|(_, user_email)| user_email.as_deref() == Some(email))
            .map(|(identity, _)| identity))
    }

    /// Raw project membership mapping: experiment key to `{"owner": ..}`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `project` is not a single path
    /// segment, and store errors unmodified.
    pub async fn list_for_project(&self, project: &str) -> Result<BTreeMap<String, Value>> {
        check_segment("project", project)?;
        match self.inner.store.get(&paths::project(project)).await? {
            Some(Value::Object(members)) => Ok(members.into_iter().collect()),
            _ => Ok(BTreeMap::new()),
        }
    }

    /// Names of all projects.
    ///
    /// # Errors
    ///
    /// Returns store errors unmodified.
    pub async fn projects(&self) -> Result<Vec<String>> {
        match self.inner.store.get_shallow(paths::PROJECTS_ROOT).await? {
            Some(Value::Object(projects)) => Ok(projects.into_iter().map(|(name, _)| name).collect()),
            _ => Ok(Vec::new()),
        }
    }

    /// Known users and their recorded emails.
    ///
    /// # Errors
    ///
    /// Returns store errors unmodified.
    pub async fn users(&self) -> Result<BTreeMap<String, Option<String>>> {
        let Some(Value::Object(ids)) = self.inner.store.get_shallow(paths::USERS_ROOT).await? else {
            return Ok(BTreeMap::new());
        };
        let mut users = BTreeMap::new();
        for identity in ids.keys() {
            let email = self
                .inner
                .store
                .get(&paths::user_email(identity))
                .await?
                .and_then(|value| value.as_str().map(str::to_string));
            users.insert(identity.clone(), email);
        }
        Ok(users)
    }

    /// Whether `identity` (default: the caller) may write the experiment.
    ///
    /// Reads the stored `owner`: absent or guest-owned experiments are
    /// writable by anyone, others only by their owner.
    ///
    /// # Errors
    ///
    /// Returns store errors unmodified.
    pub async fn can_write(&self, key: &str, identity: Option<&str>) -> Result<bool> {
        check_key(key)?;
        let identity = identity.map_or_else(|| self.identity(), str::to_string);
        let owner = self
            .inner
            .store
            .get(&paths::experiment_field(key, "owner"))
            .await?;
        Ok(match owner.as_ref().and_then(Value::as_str) {
            None | Some(GUEST_IDENTITY) => true,
            Some(owner) => owner == identity,
        })
    }

    async fn ensure_writable(&self, key: &str) -> Result<()> {
        if !self.inner.config.enforce_ownership {
            return Ok(());
        }
        let identity = self.identity();
        if self.can_write(key, Some(&identity)).await? {
            Ok(())
        } else {
            self.inner
                .span
                .in_scope(|| warn!(key = %key, identity = %identity, "write rejected"));
            Err(Error::PermissionDenied {
                key: key.to_string(),
                identity,
            })
        }
    }

    /// Download URLs of the experiment's stored artifacts, by tag.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the experiment does not exist, and
    /// blob store errors unmodified.
    pub async fn artifact_urls(&self, key: &str) -> Result<BTreeMap<String, String>> {
        let experiment = self.get(key, false).await?;
        let mut urls = BTreeMap::new();
        for (tag, artifact) in experiment.artifacts() {
            if let Some(url) = self.blobs().resolve_url(artifact).await? {
                urls.insert(tag.clone(), url);
            }
        }
        Ok(urls)
    }

    /// Stored bytes of one artifact.
    ///
    /// # Errors
    ///
    /// Returns blob store errors unmodified.
    pub async fn artifact_bytes(&self, artifact: &Artifact) -> Result<Option<Vec<u8>>> {
        self.blobs().stream(artifact).await
    }

    /// Validate `keys` through the validation cache, pruning bad records.
    pub async fn valid_experiments(
        &self,
        keys: &[String],
        with_info: bool,
        blocking: bool,
    ) -> ValidationPass {
        self.inner
            .cache
            .validate(self, keys, with_info, blocking)
            .await
    }

    /// A user's valid experiments, most recently added first.
    ///
    /// # Errors
    ///
    /// Returns store errors from reading the index; bad entries are pruned.
    pub async fn user_experiments(
        &self,
        user: Option<&str>,
        with_info: bool,
    ) -> Result<Vec<Experiment>> {
        let keys = self.list_for_user(user).await?;
        Ok(self
            .valid_experiments(&keys, with_info, true)
            .await
            .into_experiments())
    }

    /// A project's valid experiments, in key order.
    ///
    /// # Errors
    ///
    /// Returns store errors from reading the index; bad entries are pruned.
    pub async fn project_experiments(
        &self,
        project: &str,
        with_info: bool,
    ) -> Result<Vec<Experiment>> {
        let keys: Vec<String> = self.list_for_project(project).await?.into_keys().collect();
        Ok(self
            .valid_experiments(&keys, with_info, true)
            .await
            .into_experiments())
    }
}

impl<S, B, P> ExperimentSource for ExperimentRegistry<S, B, P>
where
    S: KeyedStore + 'static,
    B: BlobStore + 'static,
    P: AccessPrincipal + 'static,
{
    async fn load(&self, key: &str, with_info: bool) -> Result<Experiment> {
        self.get(key, with_info).await
    }

    async fn purge(&self, key: &str) -> Result<()> {
        self.delete(key).await
    }
}

/// Keys, artifact tags, identities and project names become path
/// segments, so each must be a single non-empty segment.
fn check_segment(what: &str, value: &str) -> Result<()> {
    if value.is_empty() || value.contains('/') {
        return Err(Error::InvalidInput(format!(
            "{what} {value:?} must be a non-empty path segment"
        )));
    }
    Ok(())
}

fn check_key(key: &str) -> Result<()> {
    check_segment("experiment key", key)
}

async fn capture_git(experiment: &Experiment) -> Option<GitInfo> {
    let workspace = experiment.artifact(WORKSPACE_TAG)?.local()?.to_path_buf();
    tokio::task::spawn_blocking(move || {
        if workspace.exists() {
            GitInfo::capture(&workspace)
        } else {
            None
        }
    })
    .await
    .ok()
    .flatten()
}
