//! Experiment registry integration tests
//!
//! Exercises the registry end to end over the in-memory stores, with
//! small failing adapters for the lenient and best-effort paths.

use chrono::{Duration, Utc};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use trueno_registry::blob::{BlobStore, MemoryBlobStore};
use trueno_registry::experiment::{Artifact, Experiment, ExperimentStatus};
use trueno_registry::kv::{KeyedStore, MemoryKeyedStore};
use trueno_registry::lifecycle::CheckpointProgress;
use trueno_registry::principal::{GuestPrincipal, StaticPrincipal};
use trueno_registry::{Error, ExperimentRegistry, RegistryConfig, Result};

type MemoryRegistry = ExperimentRegistry<MemoryKeyedStore, MemoryBlobStore, StaticPrincipal>;

async fn registry_for(user: &str) -> MemoryRegistry {
    ExperimentRegistry::in_memory(StaticPrincipal::new(user), RegistryConfig::default())
        .await
        .unwrap()
}

/// Registries for several users over one pair of stores.
async fn shared_registries(users: &[&str]) -> Vec<MemoryRegistry> {
    let store = Arc::new(MemoryKeyedStore::new());
    let blobs = Arc::new(MemoryBlobStore::new("shared-bucket"));
    let mut registries = Vec::new();
    for user in users {
        let registry = ExperimentRegistry::open(
            Arc::clone(&store),
            Arc::clone(&blobs),
            StaticPrincipal::new(*user),
            RegistryConfig::default(),
        )
        .await
        .unwrap();
        registries.push(registry);
    }
    registries
}

fn write_file(dir: &Path, name: &str, contents: &[u8]) {
    std::fs::write(dir.join(name), contents).unwrap();
}

// =============================================================================
// add / get
// =============================================================================

#[tokio::test]
async fn test_add_then_get_is_waiting_with_resolved_artifacts() {
    let workspace = tempfile::tempdir().unwrap();
    write_file(workspace.path(), "train.py", b"print('hi')");
    let modeldir = tempfile::tempdir().unwrap();
    write_file(modeldir.path(), "weights.bin", b"\x01\x02");

    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("exp-1")
        .artifact("workspace", Artifact::immutable(workspace.path()))
        .artifact("modeldir", Artifact::mutable(modeldir.path()))
        .artifact("output", Artifact::new(true))
        .build();

    registry.add(&mut experiment).await.unwrap();
    let stored = registry.get("exp-1", false).await.unwrap();

    assert_eq!(stored.key(), "exp-1");
    assert_eq!(stored.status(), ExperimentStatus::Waiting);
    assert_eq!(stored.owner(), Some("alice"));
    assert!(stored.time_added().is_some());
    assert!(stored.time_last_checkpoint().is_some());
    assert_eq!(stored.artifacts().len(), 3);
    for (tag, artifact) in stored.artifacts() {
        assert!(!artifact.qualified().unwrap_or_default().is_empty(), "{tag}");
        assert_eq!(artifact.bucket(), Some("trueno-artifacts"), "{tag}");
    }

    // The blocking checkpoint uploaded the mutable artifact before add returned.
    assert!(registry.blobs().contains("experiments/exp-1/modeldir.tgz"));
    // No local source, no upload.
    assert!(!registry.blobs().contains("experiments/exp-1/output.tgz"));
}

#[tokio::test]
async fn test_add_updates_caller_copy() {
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("exp-1")
        .artifact("modeldir", Artifact::new(true))
        .build();

    registry.add(&mut experiment).await.unwrap();

    assert_eq!(experiment.status(), ExperimentStatus::Waiting);
    assert_eq!(
        experiment.artifact("modeldir").unwrap().key(),
        Some("experiments/exp-1/modeldir.tgz")
    );
}

#[tokio::test]
async fn test_readd_content_addressed_key_is_stable() {
    let workspace = tempfile::tempdir().unwrap();
    write_file(workspace.path(), "main.rs", b"fn main() {}");
    let registry = registry_for("alice").await;

    let build = || {
        Experiment::builder("exp-1")
            .artifact("workspace", Artifact::immutable(workspace.path()))
            .build()
    };
    let mut first = build();
    registry.add(&mut first).await.unwrap();
    let mut second = build();
    registry.add(&mut second).await.unwrap();

    let first_key = first.artifact("workspace").unwrap().key().unwrap();
    let second_key = second.artifact("workspace").unwrap().key().unwrap();
    assert!(first_key.starts_with("blobstore/"));
    assert_eq!(first_key, second_key);
    assert_eq!(registry.blobs().len(), 1);
}

#[tokio::test]
async fn test_readd_overwrites_prior_record() {
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("exp-1").metric("loss").build();
    registry.add(&mut experiment).await.unwrap();

    let mut replacement = Experiment::new("exp-1");
    registry.add(&mut replacement).await.unwrap();

    let stored = registry.get("exp-1", false).await.unwrap();
    assert!(stored.metric().is_none());
}

#[tokio::test]
async fn test_add_with_unreadable_immutable_source_is_not_found() {
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("exp-1")
        .artifact("workspace", Artifact::immutable("/no/such/workspace"))
        .build();

    let err = registry.add(&mut experiment).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "{err}");
}

#[tokio::test]
async fn test_add_tolerates_failed_checkpoint_upload() {
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("exp-1")
        .artifact("modeldir", Artifact::mutable("/not/created/yet"))
        .build();

    registry.add(&mut experiment).await.unwrap();

    assert!(registry.get("exp-1", false).await.is_ok());
    assert!(registry.blobs().is_empty());
}

#[tokio::test]
async fn test_add_rejects_path_like_keys() {
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::new("a/b");

    let err = registry.add(&mut experiment).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_add_rejects_path_like_artifact_tags() {
    let registry = registry_for("alice").await;
    let mut original = Experiment::new("e1");
    registry.add(&mut original).await.unwrap();

    let mut experiment = Experiment::builder("e1")
        .artifact("logs/tb", Artifact::new(true))
        .build();
    let err = registry.add(&mut experiment).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    // Rejected before the prior record was touched, so listings keep it.
    assert!(registry.get("e1", false).await.is_ok());
    let listed = registry.user_experiments(None, false).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(registry.get("e1", false).await.is_ok());
}

#[tokio::test]
async fn test_add_rejects_path_like_project() {
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("e1").project("a/b").build();

    let err = registry.add(&mut experiment).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(registry.projects().await.unwrap().is_empty());
    assert!(registry.store().get("experiments/e1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_add_captures_no_git_outside_work_tree() {
    let workspace = tempfile::tempdir().unwrap();
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("exp-1")
        .artifact("workspace", Artifact::immutable(workspace.path()))
        .build();

    registry.add(&mut experiment).await.unwrap();

    assert!(experiment.git().is_none());
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let registry = registry_for("alice").await;

    let err = registry.get("ghost", true).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_get_corrupt_record() {
    let registry = registry_for("alice").await;
    registry
        .store()
        .set("experiments/bad", json!({"owner": "alice"}))
        .await
        .unwrap();

    let err = registry.get("bad", false).await.unwrap_err();
    assert!(matches!(err, Error::CorruptRecord { .. }));
}

// =============================================================================
// start / stop / finish / checkpoint
// =============================================================================

#[tokio::test]
async fn test_checkpoint_after_start_is_not_earlier() {
    let modeldir = tempfile::tempdir().unwrap();
    write_file(modeldir.path(), "step-1.ckpt", b"1");
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("exp-1")
        .artifact("modeldir", Artifact::mutable(modeldir.path()))
        .build();
    registry.add(&mut experiment).await.unwrap();

    let progress = registry.start(&mut experiment).await.unwrap();
    assert!(progress.is_pending());
    progress.wait().await;

    let progress = registry.checkpoint(&experiment, true).await.unwrap();
    let CheckpointProgress::Completed(report) = progress else {
        panic!("blocking checkpoint must complete");
    };
    assert!(report.is_complete());

    let stored = registry.get("exp-1", false).await.unwrap();
    assert_eq!(stored.status(), ExperimentStatus::Running);
    assert!(stored.time_last_checkpoint().unwrap() >= stored.time_started().unwrap());
}

#[tokio::test]
async fn test_checkpoint_key_loads_record() {
    let modeldir = tempfile::tempdir().unwrap();
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("exp-1")
        .artifact("modeldir", Artifact::mutable(modeldir.path()))
        .build();
    registry.add(&mut experiment).await.unwrap();
    let before = registry.get("exp-1", false).await.unwrap().time_last_checkpoint();

    let report = registry.checkpoint_key("exp-1", true).await.unwrap().wait().await;

    assert_eq!(report.uploaded.len(), 1);
    let after = registry.get("exp-1", false).await.unwrap().time_last_checkpoint();
    assert!(after >= before);
    assert!(registry.checkpoint_key("ghost", true).await.is_err());
}

#[tokio::test]
async fn test_stop_accepts_key_or_experiment() {
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::new("exp-1");
    registry.add(&mut experiment).await.unwrap();
    registry.start(&mut experiment).await.unwrap();

    registry.stop(&experiment).await.unwrap();
    assert_eq!(
        registry.get("exp-1", false).await.unwrap().status(),
        ExperimentStatus::Stopped
    );

    registry.stop("exp-1").await.unwrap();
    assert_eq!(
        registry.get("exp-1", false).await.unwrap().status(),
        ExperimentStatus::Stopped
    );
}

#[tokio::test]
async fn test_finish_experiment_checkpoints_first() {
    let modeldir = tempfile::tempdir().unwrap();
    write_file(modeldir.path(), "final.bin", b"v1");
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("exp-1")
        .artifact("modeldir", Artifact::mutable(modeldir.path()))
        .build();
    registry.add(&mut experiment).await.unwrap();
    registry.start(&mut experiment).await.unwrap().wait().await;
    write_file(modeldir.path(), "final.bin", b"v2 with more bytes");
    let before = registry.blobs().get("experiments/exp-1/modeldir.tgz").unwrap();

    let time_finished = registry.finish_experiment(&mut experiment).await.unwrap();

    let after = registry.blobs().get("experiments/exp-1/modeldir.tgz").unwrap();
    assert_ne!(before, after);
    let stored = registry.get("exp-1", false).await.unwrap();
    assert_eq!(stored.status(), ExperimentStatus::Finished);
    assert_eq!(stored.time_finished(), Some(time_finished));

    // The caller's copy follows the stored record.
    assert_eq!(experiment.status(), ExperimentStatus::Finished);
    assert_eq!(experiment.time_finished(), Some(time_finished));
    assert!(experiment.time_started().is_some());
}

// =============================================================================
// delete
// =============================================================================

#[tokio::test]
async fn test_delete_removes_record_blobs_and_indices() {
    let modeldir = tempfile::tempdir().unwrap();
    write_file(modeldir.path(), "w.bin", b"w");
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("exp-1")
        .project("vision")
        .artifact("modeldir", Artifact::mutable(modeldir.path()))
        .build();
    registry.add(&mut experiment).await.unwrap();
    assert_eq!(registry.blobs().len(), 1);

    registry.delete("exp-1").await.unwrap();

    assert!(registry.blobs().is_empty());
    assert!(matches!(
        registry.get("exp-1", false).await,
        Err(Error::NotFound(_))
    ));
    assert!(registry.list_for_user(None).await.unwrap().is_empty());
    assert!(registry.list_for_project("vision").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_nonexistent_cleans_index_remnants() {
    let registry = registry_for("alice").await;
    registry
        .store()
        .set("users/alice/experiments/ghost", json!(12.5))
        .await
        .unwrap();

    registry.delete("ghost").await.unwrap();

    assert!(registry.list_for_user(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_corrupt_record_still_removes_it() {
    let registry = registry_for("alice").await;
    let store = registry.store();
    store.set("experiments/bad", json!("garbage")).await.unwrap();
    store
        .set("users/alice/experiments/bad", json!(3.0))
        .await
        .unwrap();

    registry.delete("bad").await.unwrap();

    assert!(store.get("experiments/bad").await.unwrap().is_none());
    assert!(store.get("users/alice/experiments/bad").await.unwrap().is_none());
}

/// Blob store whose deletes always fail.
struct UndeletableBlobs(MemoryBlobStore);

impl BlobStore for UndeletableBlobs {
    async fn put(&self, artifact: &Artifact) -> Result<String> {
        self.0.put(artifact).await
    }

    async fn stream(&self, artifact: &Artifact) -> Result<Option<Vec<u8>>> {
        self.0.stream(artifact).await
    }

    async fn delete(&self, _artifact: &Artifact) -> Result<()> {
        Err(Error::StoreUnavailable("blob backend offline".into()))
    }

    async fn resolve_url(&self, artifact: &Artifact) -> Result<Option<String>> {
        self.0.resolve_url(artifact).await
    }

    fn qualified_location(&self, key: &str) -> String {
        self.0.qualified_location(key)
    }

    fn bucket(&self) -> &str {
        self.0.bucket()
    }
}

#[tokio::test]
async fn test_delete_proceeds_when_blob_delete_fails() {
    let modeldir = tempfile::tempdir().unwrap();
    let blobs = Arc::new(UndeletableBlobs(MemoryBlobStore::new("bucket")));
    let registry = ExperimentRegistry::open(
        Arc::new(MemoryKeyedStore::new()),
        Arc::clone(&blobs),
        StaticPrincipal::new("alice"),
        RegistryConfig::default(),
    )
    .await
    .unwrap();
    let mut experiment = Experiment::builder("exp-1")
        .artifact("modeldir", Artifact::mutable(modeldir.path()))
        .build();
    registry.add(&mut experiment).await.unwrap();

    registry.delete(&experiment).await.unwrap();

    // Record and index are gone; the blob is orphaned.
    assert!(registry.get("exp-1", false).await.is_err());
    assert!(registry.list_for_user(None).await.unwrap().is_empty());
    assert_eq!(blobs.0.len(), 1);
}

/// Keyed store that refuses every write.
struct ReadOnlyStore(MemoryKeyedStore);

impl KeyedStore for ReadOnlyStore {
    async fn get(&self, path: &str) -> Result<Option<serde_json::Value>> {
        self.0.get(path).await
    }

    async fn get_shallow(&self, path: &str) -> Result<Option<serde_json::Value>> {
        self.0.get_shallow(path).await
    }

    async fn set(&self, path: &str, _value: serde_json::Value) -> Result<()> {
        Err(Error::StoreUnavailable(format!("write to {path} rejected")))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        Err(Error::StoreUnavailable(format!("delete of {path} rejected")))
    }
}

#[tokio::test]
async fn test_store_failures_propagate_unmodified() {
    let registry = ExperimentRegistry::open(
        Arc::new(ReadOnlyStore(MemoryKeyedStore::new())),
        Arc::new(MemoryBlobStore::new("bucket")),
        GuestPrincipal,
        RegistryConfig::default(),
    )
    .await
    .unwrap();
    let mut experiment = Experiment::new("exp-1");

    assert!(matches!(
        registry.add(&mut experiment).await,
        Err(Error::StoreUnavailable(_))
    ));
    assert!(matches!(
        registry.stop("exp-1").await,
        Err(Error::StoreUnavailable(_))
    ));
    assert!(matches!(
        registry.delete("exp-1").await,
        Err(Error::StoreUnavailable(_))
    ));
}

// =============================================================================
// ownership
// =============================================================================

#[tokio::test]
async fn test_can_write_follows_stored_owner() {
    let registries = shared_registries(&["alice", "bob"]).await;
    let (alice, bob) = (&registries[0], &registries[1]);
    let mut experiment = Experiment::builder("exp-1").project("vision").build();
    alice.add(&mut experiment).await.unwrap();

    assert!(alice.can_write("exp-1", None).await.unwrap());
    assert!(bob.can_write("exp-1", Some("alice")).await.unwrap());
    assert!(!bob.can_write("exp-1", None).await.unwrap());
    assert!(!alice.can_write("exp-1", Some("bob")).await.unwrap());
    assert_eq!(
        alice.store().get("projects/vision/exp-1/owner").await.unwrap(),
        Some(json!("alice"))
    );
}

#[tokio::test]
async fn test_guest_owned_and_unowned_are_writable() {
    let guest = ExperimentRegistry::in_memory(GuestPrincipal, RegistryConfig::default())
        .await
        .unwrap();
    let mut experiment = Experiment::new("exp-1");
    guest.add(&mut experiment).await.unwrap();

    assert!(guest.can_write("exp-1", Some("anyone")).await.unwrap());
    assert!(guest.can_write("never-added", Some("anyone")).await.unwrap());
}

#[tokio::test]
async fn test_ownership_trusts_store_not_caller_copy() {
    let registries = shared_registries(&["alice", "bob"]).await;
    let (alice, bob) = (&registries[0], &registries[1]);
    let mut experiment = Experiment::new("exp-1");
    alice.add(&mut experiment).await.unwrap();

    // Bob holding alice's experiment value changes nothing.
    let copy = bob.get("exp-1", false).await.unwrap();
    assert_eq!(copy.owner(), Some("alice"));
    assert!(!bob.can_write(copy.key(), None).await.unwrap());
}

// =============================================================================
// listing
// =============================================================================

#[tokio::test]
async fn test_list_for_user_orders_by_recency() {
    let registry = registry_for("alice").await;
    let store = registry.store();
    for (key, time_added) in [("A", 1.0), ("B", 3.0), ("C", 2.0)] {
        store
            .set(&format!("users/alice/experiments/{key}"), json!(time_added))
            .await
            .unwrap();
    }

    assert_eq!(registry.list_for_user(None).await.unwrap(), vec!["B", "C", "A"]);
    assert_eq!(
        registry.list_for_user(Some("alice")).await.unwrap(),
        vec!["B", "C", "A"]
    );
}

#[tokio::test]
async fn test_list_for_user_skips_malformed_entries() {
    let registry = registry_for("alice").await;
    let store = registry.store();
    store
        .set("users/alice/experiments/good", json!(5.0))
        .await
        .unwrap();
    store
        .set("users/alice/experiments/odd", json!("yesterday"))
        .await
        .unwrap();

    assert_eq!(registry.list_for_user(None).await.unwrap(), vec!["good"]);
}

#[tokio::test]
async fn test_list_for_user_resolves_email() {
    let store = Arc::new(MemoryKeyedStore::new());
    let blobs = Arc::new(MemoryBlobStore::new("bucket"));
    let alice = ExperimentRegistry::open(
        Arc::clone(&store),
        Arc::clone(&blobs),
        StaticPrincipal::new("alice").with_email("alice@lab.org"),
        RegistryConfig::default(),
    )
    .await
    .unwrap();
    let bob = ExperimentRegistry::open(store, blobs, GuestPrincipal, RegistryConfig::default())
        .await
        .unwrap();
    let mut experiment = Experiment::new("exp-1");
    alice.add(&mut experiment).await.unwrap();

    assert_eq!(
        bob.list_for_user(Some("alice@lab.org")).await.unwrap(),
        vec!["exp-1"]
    );
    assert!(bob
        .list_for_user(Some("nobody@lab.org"))
        .await
        .unwrap()
        .is_empty());

    let users = bob.users().await.unwrap();
    assert_eq!(users.get("alice"), Some(&Some("alice@lab.org".to_string())));
}

#[tokio::test]
async fn test_expired_session_skips_email() {
    let principal = StaticPrincipal::new("alice")
        .with_email("alice@lab.org")
        .expires_at(Utc::now() - Duration::minutes(5));
    let registry = ExperimentRegistry::in_memory(principal, RegistryConfig::default())
        .await
        .unwrap();

    assert!(registry.is_auth_expired());
    assert!(registry.store().get("users/alice/email").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_for_project_and_projects() {
    let registry = registry_for("alice").await;
    for (key, project) in [("e1", "vision"), ("e2", "vision"), ("e3", "nlp")] {
        let mut experiment = Experiment::builder(key).project(project).build();
        registry.add(&mut experiment).await.unwrap();
    }

    let members = registry.list_for_project("vision").await.unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members["e1"], json!({"owner": "alice"}));

    assert_eq!(registry.projects().await.unwrap(), vec!["nlp", "vision"]);
    assert!(registry.list_for_project("unknown").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listings_reject_path_like_names() {
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("e1").project("vision").build();
    registry.add(&mut experiment).await.unwrap();

    for user in ["", "alice/experiments"] {
        let err = registry.list_for_user(Some(user)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{user:?}");
    }
    for project in ["", "vision/e1"] {
        let err = registry.list_for_project(project).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "{project:?}");
        assert!(registry.project_experiments(project, false).await.is_err());
    }
}

#[tokio::test]
async fn test_project_experiments_validates_members() {
    let registry = registry_for("alice").await;
    for key in ["e1", "e2"] {
        let mut experiment = Experiment::builder(key).project("vision").build();
        registry.add(&mut experiment).await.unwrap();
    }
    registry
        .store()
        .set("experiments/e2", json!(42))
        .await
        .unwrap();

    let experiments = registry.project_experiments("vision", false).await.unwrap();

    assert_eq!(experiments.len(), 1);
    assert_eq!(experiments[0].key(), "e1");
    // The corrupt record was pruned; its project entry outlives it because
    // the project is only known from a loadable record.
    assert!(matches!(
        registry.get("e2", false).await,
        Err(Error::NotFound(_))
    ));
}

// =============================================================================
// artifacts
// =============================================================================

#[tokio::test]
async fn test_artifact_urls_only_for_stored_blobs() {
    let modeldir = tempfile::tempdir().unwrap();
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("exp-1")
        .artifact("modeldir", Artifact::mutable(modeldir.path()))
        .artifact("output", Artifact::new(true))
        .build();
    registry.add(&mut experiment).await.unwrap();

    let urls = registry.artifact_urls("exp-1").await.unwrap();

    assert_eq!(urls.len(), 1);
    assert_eq!(
        urls["modeldir"],
        "mem://trueno-artifacts/experiments/exp-1/modeldir.tgz"
    );
}

#[tokio::test]
async fn test_artifact_bytes() {
    let registry = registry_for("alice").await;
    let mut experiment = Experiment::builder("exp-1")
        .artifact("output", Artifact::new(true))
        .build();
    registry.add(&mut experiment).await.unwrap();
    let output = experiment.artifact("output").unwrap();

    assert!(registry.artifact_bytes(output).await.unwrap().is_none());

    registry
        .blobs()
        .insert("experiments/exp-1/output.tgz", b"bytes".to_vec());
    assert_eq!(
        registry.artifact_bytes(output).await.unwrap(),
        Some(b"bytes".to_vec())
    );
}
