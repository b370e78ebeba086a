//! Experiment data model
//!
//! ## Schema Overview
//!
//! ```text
//! Experiment (key, status, timestamps, owner, project, metric)
//!     ├──< Artifact (N) [by tag: mutable | immutable]
//!     └──  GitInfo (0..1) [captured at add time]
//! ```
//!
//! Records are stored as JSON at `experiments/<key>`; see
//! [`crate::registry`] for the full path scheme.
//!
//! ## Usage
//!
//! ```rust
//! use trueno_registry::experiment::{Artifact, Experiment, ExperimentStatus};
//!
//! let experiment = Experiment::builder("exp-001")
//!     .project("vision")
//!     .metric("loss:min")
//!     .artifact("modeldir", Artifact::mutable("/tmp/model"))
//!     .artifact("workspace", Artifact::immutable("/tmp/src"))
//!     .build();
//!
//! assert_eq!(experiment.status(), ExperimentStatus::Waiting);
//! assert!(experiment.artifact("modeldir").unwrap().is_checkpointed());
//! ```

mod artifact;
mod git;
mod record;

pub use artifact::Artifact;
pub use git::GitInfo;
pub use record::{Experiment, ExperimentBuilder, ExperimentInfo, ExperimentRef, ExperimentStatus};

use chrono::Utc;

/// Current time in seconds since the Unix epoch, microsecond precision.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
