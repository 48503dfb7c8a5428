//! [`IssueTracker`] over the GitHub `gh` CLI.
//!
//! Authentication and host selection are left to `gh` itself
//! (`gh auth login`, `GH_HOST`).

use std::cell::RefCell;
use std::collections::HashSet;
use std::process::Command;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::{IssueRef, IssueState, IssueTracker, StateFilter};
use crate::error::SyncError;

/// Color given to labels created by plansync.
pub const LABEL_COLOR: &str = "0075ca";

/// Upper bound on issues fetched by one listing.
const LIST_LIMIT: &str = "1000";

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
    state: String,
    #[serde(default)]
    labels: Vec<GhLabel>,
}

/// Issue tracker backed by `gh`.
#[derive(Debug)]
pub struct GhCliTracker {
    repo: Option<String>,
    phase_prefix: String,
    /// Labels known to exist; loaded on first `ensure_label`
    labels: RefCell<Option<HashSet<String>>>,
}

impl GhCliTracker {
    /// Tracker for `repo` (`owner/name`); `None` lets `gh` infer it from the
    /// current directory.
    #[must_use]
    pub fn new(repo: Option<String>, phase_prefix: impl Into<String>) -> Self {
        Self {
            repo,
            phase_prefix: phase_prefix.into(),
            labels: RefCell::new(None),
        }
    }

    /// Check that `gh` is on `PATH`.
    ///
    /// # Errors
    ///
    /// [`SyncError::MissingTool`] if it is not.
    pub fn check_available() -> crate::error::Result<()> {
        which::which("gh").map(|_| ()).map_err(|_| SyncError::MissingTool {
            tool: "gh".to_string(),
        })
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        let mut command = Command::new("gh");
        command.args(args);
        if let Some(repo) = &self.repo {
            command.args(["--repo", repo]);
        }

        tracing::debug!(args = ?args, "Running gh");
        let output = command
            .output()
            .with_context(|| format!("failed to run gh {}", args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("gh {} failed: {}", args.first().unwrap_or(&""), stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn known_labels(&self) -> Result<HashSet<String>> {
        let json = self.run(&["label", "list", "--limit", LIST_LIMIT, "--json", "name"])?;
        parse_label_list(&json)
    }
}

impl IssueTracker for GhCliTracker {
    fn list_issues(&self, filter: StateFilter) -> Result<Vec<IssueRef>> {
        let state = match filter {
            StateFilter::Open => "open",
            StateFilter::Closed => "closed",
            StateFilter::All => "all",
        };
        let json = self.run(&[
            "issue",
            "list",
            "--state",
            state,
            "--limit",
            LIST_LIMIT,
            "--json",
            "number,title,state,labels",
        ])?;
        parse_issue_list(&json, &self.phase_prefix)
    }

    fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<IssueRef> {
        let mut args = vec!["issue", "create", "--title", title, "--body", body];
        for label in labels {
            args.push("--label");
            args.push(label);
        }
        let output = self.run(&args)?;
        let id = parse_issue_url(&output)
            .with_context(|| format!("unexpected gh issue create output: {}", output.trim()))?;

        Ok(IssueRef::new(
            id,
            title,
            IssueState::Open,
            labels.to_vec(),
            &self.phase_prefix,
        ))
    }

    fn set_issue_state(&self, id: u64, state: IssueState) -> Result<()> {
        let verb = match state {
            IssueState::Open => "reopen",
            IssueState::Closed => "close",
        };
        self.run(&["issue", verb, &id.to_string()])?;
        Ok(())
    }

    fn ensure_label(&self, name: &str) -> Result<()> {
        if self.labels.borrow().is_none() {
            let known = self.known_labels()?;
            *self.labels.borrow_mut() = Some(known);
        }
        if self
            .labels
            .borrow()
            .as_ref()
            .is_some_and(|known| known.contains(name))
        {
            return Ok(());
        }

        self.run(&["label", "create", name, "--color", LABEL_COLOR])?;
        if let Some(known) = self.labels.borrow_mut().as_mut() {
            known.insert(name.to_string());
        }
        tracing::info!(label = name, "Created label");
        Ok(())
    }
}

// ============================================================================
// Output Parsing
// ============================================================================

fn parse_issue_list(json: &str, phase_prefix: &str) -> Result<Vec<IssueRef>> {
    let issues: Vec<GhIssue> =
        serde_json::from_str(json).context("failed to parse gh issue list output")?;
    Ok(issues
        .into_iter()
        .map(|issue| {
            let state = if issue.state.eq_ignore_ascii_case("closed") {
                IssueState::Closed
            } else {
                IssueState::Open
            };
            let labels = issue.labels.into_iter().map(|l| l.name).collect();
            IssueRef::new(issue.number, issue.title, state, labels, phase_prefix)
        })
        .collect())
}

fn parse_label_list(json: &str) -> Result<HashSet<String>> {
    let labels: Vec<GhLabel> =
        serde_json::from_str(json).context("failed to parse gh label list output")?;
    Ok(labels.into_iter().map(|l| l.name).collect())
}

/// Issue number from the URL `gh issue create` prints.
fn parse_issue_url(output: &str) -> Option<u64> {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.contains("/issues/"))
        .and_then(|url| url.rsplit('/').next())
        .and_then(|n| n.parse().ok())
}
