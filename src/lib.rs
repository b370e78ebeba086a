//! # Trueno-Registry: Experiment Registry and Artifact Lifecycle Manager
//!
//! **Version**: 0.1.0
//!
//! Trueno-Registry is the bookkeeping core of a distributed experiment-tracking
//! platform. It records the lifecycle of experiments submitted by users,
//! persists the artifacts they produce, and answers queries about status,
//! ownership and results, on top of a hierarchical keyed store and a blob
//! store supplied by the embedding application.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: Records parse fail-closed; corrupt entries are pruned, never guessed at
//! - **Poka-Yoke safety**: Mutable artifact keys are pure functions of experiment key and tag
//! - **Heijunka**: Checkpoint uploads and validation run on bounded worker pools
//! - **Genchi Genbutsu**: Write permission reads the stored owner, not the caller's copy
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use trueno_registry::experiment::{Artifact, Experiment};
//! use trueno_registry::principal::StaticPrincipal;
//! use trueno_registry::{ExperimentRegistry, RegistryConfig};
//!
//! # async fn example() -> trueno_registry::Result<()> {
//! let registry =
//!     ExperimentRegistry::in_memory(StaticPrincipal::new("alice"), RegistryConfig::default())
//!         .await?;
//!
//! let mut experiment = Experiment::builder("exp-001")
//!     .metric("loss:min")
//!     .artifact("workspace", Artifact::immutable("/home/alice/project"))
//!     .artifact("modeldir", Artifact::mutable("/home/alice/project/model"))
//!     .build();
//!
//! registry.add(&mut experiment).await?;
//! registry.start(&mut experiment).await?;
//! registry.checkpoint(&experiment, true).await?;
//! registry.finish_experiment(&mut experiment).await?;
//!
//! for experiment in registry.user_experiments(None, true).await? {
//!     println!("{} {}", experiment.key(), experiment.status());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod blob;
pub mod cache;
pub mod config;
pub mod error;
pub mod experiment;
pub mod kv;
pub mod lifecycle;
pub mod metric;
pub mod principal;
pub mod registry;
pub mod telemetry;

pub use config::RegistryConfig;
pub use error::{Error, ErrorKind, Result};
pub use registry::ExperimentRegistry;
