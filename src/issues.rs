//! Publishing model tasks as tracker issues.
//!
//! One issue per task, titled `[<phase key>] <task title>`. Tasks that
//! already have an issue with that title are left alone, so publishing is
//! safe to repeat.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::SyncConfig;
use crate::error::{IntoSyncError, Result};
use crate::model::ProjectModel;
use crate::tasks::{TaskRecord, TaskStatus};
use crate::tracker::{
    issue_title, label_slug, normalize_title, phase_label, IssueRef, IssueTracker, StateFilter,
};

/// Labels every published issue carries.
pub const BASE_LABELS: [&str; 2] = ["task", "automated"];

// ============================================================================
// Priority
// ============================================================================

/// Issue priority, taken from the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Priority from the 🔴/🟡/🟢 marker in a phase name; medium otherwise.
    #[must_use]
    pub fn from_phase(phase: &str) -> Self {
        if phase.contains('🔴') {
            Self::High
        } else if phase.contains('🟢') {
            Self::Low
        } else {
            Self::Medium
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Display form used in issue bodies.
    #[must_use]
    pub fn display(self) -> &'static str {
        match self {
            Self::High => "🔴 高优先级",
            Self::Medium => "🟡 中优先级",
            Self::Low => "🟢 低优先级",
        }
    }
}

// ============================================================================
// Issue Content
// ============================================================================

fn status_labels(status: TaskStatus) -> [&'static str; 2] {
    match status {
        TaskStatus::Done => ["status-done", "completed"],
        TaskStatus::InProgress => ["status-in-progress", "in-progress"],
        TaskStatus::Paused => ["status-paused", "paused"],
        TaskStatus::NotStarted => ["status-pending", "pending"],
    }
}

/// Labels for a task's issue, normalized and deduplicated in order.
#[must_use]
pub fn issue_labels(
    config: &SyncConfig,
    phase: &str,
    priority: Priority,
    status: TaskStatus,
) -> Vec<String> {
    let priority_label = format!("priority-{}", priority.as_str());
    let candidates = BASE_LABELS
        .into_iter()
        .map(label_slug)
        .chain([label_slug(&priority_label), label_slug(priority.as_str())])
        .chain(status_labels(status).into_iter().map(label_slug))
        .chain([phase_label(&config.tracker.phase_label_prefix, phase)]);

    let mut seen = HashSet::new();
    candidates.filter(|l| seen.insert(l.clone())).collect()
}

/// Markdown body for a task's issue.
#[must_use]
pub fn issue_body(task: &TaskRecord, phase: &str, priority: Priority) -> String {
    let mut body = format!("# {}\n\n", task.title);

    body.push_str("## 状态\n\n");
    body.push_str(&format!("- **当前状态**: {}\n", task.status.label()));
    if let Some(date) = &task.completion_date {
        body.push_str(&format!("- **完成日期**: {}\n", date));
    }
    body.push('\n');

    body.push_str("## 阶段信息\n\n");
    body.push_str(&format!("- **所属阶段**: {}\n", phase));
    body.push_str(&format!("- **优先级**: {}\n\n", priority.display()));

    if let Some(description) = &task.description {
        body.push_str(&format!("## 任务描述\n\n{}\n\n", description));
    }
    if let Some(logic) = &task.implementation_logic {
        body.push_str(&format!("## 实现逻辑\n\n{}\n\n", logic));
    }
    if !task.acceptance_criteria.is_empty() {
        body.push_str("## 验收标准\n\n");
        for criterion in &task.acceptance_criteria {
            body.push_str(&format!("- [ ] {}\n", criterion));
        }
        body.push('\n');
    }
    if !task.related_files.is_empty() {
        body.push_str("## 相关文件\n\n");
        for file in &task.related_files {
            body.push_str(&format!("- `{}`\n", file));
        }
        body.push('\n');
    }
    if !task.dependencies.is_empty() {
        body.push_str("## 依赖关系\n\n");
        for dependency in &task.dependencies {
            body.push_str(&format!("- {}\n", dependency));
        }
        body.push('\n');
    }

    body.push_str("---\n<!-- Created by plansync -->\n");
    body
}

// ============================================================================
// Publisher
// ============================================================================

/// Outcome of a publish run.
#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    pub created: Vec<IssueRef>,
    /// Titles that would be created (dry run only)
    pub planned: Vec<String>,
    /// Labels that would be ensured, in first-use order (dry run only)
    pub planned_labels: Vec<String>,
    /// Tasks that already had an issue
    pub existing: usize,
    pub failures: usize,
}

/// Creates one issue per model task.
pub struct IssuePublisher<'a, T: IssueTracker + ?Sized> {
    config: &'a SyncConfig,
    tracker: &'a T,
    dry_run: bool,
}

impl<'a, T: IssueTracker + ?Sized> IssuePublisher<'a, T> {
    #[must_use]
    pub fn new(config: &'a SyncConfig, tracker: &'a T) -> Self {
        Self {
            config,
            tracker,
            dry_run: false,
        }
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn priority_for(&self, phase: &str) -> Priority {
        self.config
            .phase(phase)
            .and_then(|p| p.priority)
            .unwrap_or_else(|| Priority::from_phase(phase))
    }

    /// Publish every task of `model` that has no issue yet.
    ///
    /// # Errors
    ///
    /// [`crate::SyncError::Tracker`] if existing issues cannot be listed.
    /// Failures on individual labels or issues are counted instead. A label
    /// is attempted once per run, so each failing label counts once.
    pub fn publish(&self, model: &ProjectModel) -> Result<PublishReport> {
        let mut existing: HashSet<String> = self
            .tracker
            .list_issues(StateFilter::All)
            .into_sync_tracker("list issues")?
            .iter()
            .map(|i| normalize_title(&i.title))
            .collect();

        let mut report = PublishReport::default();
        let mut ensured: HashSet<String> = HashSet::new();

        for detail in &model.phase_details {
            let priority = self.priority_for(&detail.phase);

            for task in &detail.tasks {
                let title =
                    issue_title(&detail.phase, &task.title, self.config.tracker.max_title_len);
                if existing.contains(&normalize_title(&title)) {
                    tracing::debug!(title = %title, "Issue already exists");
                    report.existing += 1;
                    continue;
                }

                let labels = issue_labels(self.config, &detail.phase, priority, task.status);
                for label in &labels {
                    if !ensured.insert(label.clone()) {
                        continue;
                    }
                    if self.dry_run {
                        report.planned_labels.push(label.clone());
                    } else if let Err(e) = self.tracker.ensure_label(label) {
                        tracing::warn!(label = %label, error = %e, "Cannot create label");
                        report.failures += 1;
                    }
                }

                if self.dry_run {
                    report.planned.push(title.clone());
                    existing.insert(normalize_title(&title));
                    continue;
                }

                let body = issue_body(task, &detail.phase, priority);
                match self.tracker.create_issue(&title, &body, &labels) {
                    Ok(issue) => {
                        tracing::info!(issue = issue.id, title = %title, "Created issue");
                        existing.insert(normalize_title(&title));
                        report.created.push(issue);
                    }
                    Err(e) => {
                        tracing::warn!(title = %title, error = %e, "Failed to create issue");
                        report.failures += 1;
                    }
                }
            }
        }

        Ok(report)
    }
}

// ============================================================================
// Tests
// ============================================================================
