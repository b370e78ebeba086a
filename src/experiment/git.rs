//! Source-control snapshot captured at submission time

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

/// Git metadata of a local workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GitInfo {
    /// `origin` remote URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// `HEAD` commit hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Current branch name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl GitInfo {
    /// Capture git metadata for `workspace`.
    ///
    /// Best effort: returns `None` if `git` is unavailable or the path is
    /// not inside a work tree. Blocks on child processes.
    #[must_use]
    pub fn capture(workspace: &Path) -> Option<Self> {
        let commit = git_output(workspace, &["rev-parse", "HEAD"])?;
        Some(Self {
            url: git_output(workspace, &["remote", "get-url", "origin"]),
            commit: Some(commit),
            branch: git_output(workspace, &["rev-parse", "--abbrev-ref", "HEAD"]),
        })
    }
}

fn git_output(workspace: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(workspace)
        .args(args)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!text.is_empty()).then_some(text)
}
