//! Persisted path scheme
//!
//! External tooling reads these paths directly; they are part of the
//! public contract.
//!
//! ```text
//! experiments/<key>                         full experiment record
//! experiments/<key>/{status,time_started,   partial-update sub-paths
//!     time_finished,time_last_checkpoint,owner}
//! users/<identity>/experiments/<key>        time_added (recency index)
//! users/<identity>/email                    set once per session
//! projects/<project>/<key>/owner            project membership
//! ```

use crate::kv::join_path;

/// Root of experiment records.
pub const EXPERIMENTS_ROOT: &str = "experiments";
/// Root of per-user indices.
pub const USERS_ROOT: &str = "users";
/// Root of project indices.
pub const PROJECTS_ROOT: &str = "projects";

/// `experiments/<key>`
#[must_use]
pub fn experiment(key: &str) -> String {
    join_path(&[EXPERIMENTS_ROOT, key])
}

/// `experiments/<key>/<field>`
#[must_use]
pub fn experiment_field(key: &str, field: &str) -> String {
    join_path(&[EXPERIMENTS_ROOT, key, field])
}

/// Key of a mutable artifact: `experiments/<key>/<tag>.tgz`.
#[must_use]
pub fn mutable_artifact(key: &str, tag: &str) -> String {
    join_path(&[EXPERIMENTS_ROOT, key, &format!("{tag}.tgz")])
}

/// `users/<identity>/experiments`
#[must_use]
pub fn user_experiments(identity: &str) -> String {
    join_path(&[USERS_ROOT, identity, "experiments"])
}

/// `users/<identity>/experiments/<key>`
#[must_use]
pub fn user_experiment(identity: &str, key: &str) -> String {
    join_path(&[USERS_ROOT, identity, "experiments", key])
}

/// `users/<identity>/email`
#[must_use]
pub fn user_email(identity: &str) -> String {
    join_path(&[USERS_ROOT, identity, "email"])
}

/// `projects/<project>`
#[must_use]
pub fn project(project: &str) -> String {
    join_path(&[PROJECTS_ROOT, project])
}

/// `projects/<project>/<key>`
#[must_use]
pub fn project_member(project: &str, key: &str) -> String {
    join_path(&[PROJECTS_ROOT, project, key])
}

/// `projects/<project>/<key>/owner`
#[must_use]
pub fn project_owner(project: &str, key: &str) -> String {
    join_path(&[PROJECTS_ROOT, project, key, "owner"])
}
