//! Mock implementations of the tracker seam.
//!
//! These mocks provide controllable test doubles for the issue tracker,
//! enabling deterministic tests of the reconciler and the publisher.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashSet};

use anyhow::{bail, Result};

use crate::tracker::{IssueRef, IssueState, IssueTracker, StateFilter};

/// In-memory issue tracker.
///
/// # Example
///
/// ```rust
/// use plansync::testing::MockIssueTracker;
/// use plansync::tracker::{IssueState, IssueTracker, StateFilter};
///
/// let tracker = MockIssueTracker::new()
///     .with_issue(1, "[Alpha] Login", IssueState::Closed, &["phase-alpha"]);
///
/// assert_eq!(tracker.list_issues(StateFilter::Closed).unwrap().len(), 1);
/// ```
#[derive(Debug)]
pub struct MockIssueTracker {
    phase_prefix: String,
    issues: RefCell<Vec<IssueRef>>,
    labels: RefCell<BTreeSet<String>>,
    state_changes: RefCell<Vec<(u64, IssueState)>>,
    list_error: Option<String>,
    failing_ids: HashSet<u64>,
    failing_titles: HashSet<String>,
    failing_labels: HashSet<String>,
}

impl Default for MockIssueTracker {
    fn default() -> Self {
        Self {
            phase_prefix: "phase-".to_string(),
            issues: RefCell::new(Vec::new()),
            labels: RefCell::new(BTreeSet::new()),
            state_changes: RefCell::new(Vec::new()),
            list_error: None,
            failing_ids: HashSet::new(),
            failing_titles: HashSet::new(),
            failing_labels: HashSet::new(),
        }
    }
}

impl MockIssueTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing issue.
    #[must_use]
    pub fn with_issue(self, id: u64, title: &str, state: IssueState, labels: &[&str]) -> Self {
        let labels = labels.iter().map(|l| l.to_string()).collect();
        let issue = IssueRef::new(id, title, state, labels, &self.phase_prefix);
        self.issues.borrow_mut().push(issue);
        self
    }

    /// Add an existing label.
    #[must_use]
    pub fn with_label(self, name: &str) -> Self {
        self.labels.borrow_mut().insert(name.to_string());
        self
    }

    /// Make `list_issues` fail.
    #[must_use]
    pub fn with_list_error(mut self, error: &str) -> Self {
        self.list_error = Some(error.to_string());
        self
    }

    /// Make state changes of issue `id` fail.
    #[must_use]
    pub fn with_failing_issue(mut self, id: u64) -> Self {
        self.failing_ids.insert(id);
        self
    }

    /// Make creating an issue with `title` fail.
    #[must_use]
    pub fn with_failing_create(mut self, title: &str) -> Self {
        self.failing_titles.insert(title.to_string());
        self
    }

    /// Make ensuring label `name` fail.
    #[must_use]
    pub fn with_failing_label(mut self, name: &str) -> Self {
        self.failing_labels.insert(name.to_string());
        self
    }

    /// Snapshot of all issues.
    #[must_use]
    pub fn issues(&self) -> Vec<IssueRef> {
        self.issues.borrow().clone()
    }

    /// Look up an issue by id.
    #[must_use]
    pub fn issue(&self, id: u64) -> Option<IssueRef> {
        self.issues.borrow().iter().find(|i| i.id == id).cloned()
    }

    /// Labels that exist, sorted.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.labels.borrow().iter().cloned().collect()
    }

    /// Successful state changes, in call order.
    #[must_use]
    pub fn state_changes(&self) -> Vec<(u64, IssueState)> {
        self.state_changes.borrow().clone()
    }
}

impl IssueTracker for MockIssueTracker {
    fn list_issues(&self, filter: StateFilter) -> Result<Vec<IssueRef>> {
        if let Some(error) = &self.list_error {
            bail!("{}", error);
        }
        Ok(self
            .issues
            .borrow()
            .iter()
            .filter(|i| filter.matches(i.state))
            .cloned()
            .collect())
    }

    fn create_issue(&self, title: &str, _body: &str, labels: &[String]) -> Result<IssueRef> {
        if self.failing_titles.contains(title) {
            bail!("Create failed: {}", title);
        }
        let mut issues = self.issues.borrow_mut();
        let id = issues.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        let issue = IssueRef::new(
            id,
            title,
            IssueState::Open,
            labels.to_vec(),
            &self.phase_prefix,
        );
        issues.push(issue.clone());
        Ok(issue)
    }

    fn set_issue_state(&self, id: u64, state: IssueState) -> Result<()> {
        if self.failing_ids.contains(&id) {
            bail!("State change failed for issue #{}", id);
        }
        let mut issues = self.issues.borrow_mut();
        let Some(issue) = issues.iter_mut().find(|i| i.id == id) else {
            bail!("Issue #{} not found", id);
        };
        issue.state = state;
        self.state_changes.borrow_mut().push((id, state));
        Ok(())
    }

    fn ensure_label(&self, name: &str) -> Result<()> {
        if self.failing_labels.contains(name) {
            bail!("Label failed: {}", name);
        }
        self.labels.borrow_mut().insert(name.to_string());
        Ok(())
    }
}
