//! Bidirectional reconciliation between phase documents and the tracker.
//!
//! - **Issues → documents**: a closed issue marks its task done in the phase
//!   document by swapping the leading status marker of the matching line and,
//!   when the block has one, the value of its body status line. Closing is
//!   the only transition propagated this way.
//! - **Documents → issues**: every task's status, collapsed to done / not
//!   done, is pushed to the issue with the matching title by closing or
//!   reopening it. Issues are never created here.
//!
//! In [`Direction::Both`] an issue whose task was just marked done is never
//! reopened by the second half of the same run.
//!
//! Individual failures (one document, one tracker call) are logged and
//! counted; the run carries on. Only the initial issue listing is fatal.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::config::SyncConfig;
use crate::error::{IntoSyncError, Result};
use crate::model::persistence::atomic_write;
use crate::tasks::parsing::{starts_block, status_value_range};
use crate::tasks::status::leading_symbol;
use crate::tasks::{normalize_status, parse_file, TaskStatus};
use crate::tracker::{
    issue_title, normalize_title, phase_for_issue, IssueRef, IssueState, IssueTracker,
    StateFilter,
};

/// Which way to reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    IssuesToDocuments,
    DocumentsToIssues,
    #[default]
    Both,
}

impl Direction {
    fn includes_issues_to_documents(self) -> bool {
        matches!(self, Self::IssuesToDocuments | Self::Both)
    }

    fn includes_documents_to_issues(self) -> bool {
        matches!(self, Self::DocumentsToIssues | Self::Both)
    }
}

/// Outcome of a reconciliation run.
///
/// In a dry run the counts describe what would have changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Documents rewritten (or that would be)
    pub documents_updated: Vec<PathBuf>,
    /// Task lines whose marker was switched to done
    pub lines_updated: usize,
    pub issues_closed: usize,
    pub issues_reopened: usize,
    /// Items with no counterpart on the other side
    pub skipped: usize,
    /// Items that failed and were left as they were
    pub failures: usize,
    pub dry_run: bool,
}

impl ReconcileReport {
    /// Whether anything changed (or would change).
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.lines_updated + self.issues_closed + self.issues_reopened > 0
    }
}

// ============================================================================
// Marker Retargeting
// ============================================================================

/// Byte offset and text of the leading status marker on a task line.
///
/// The marker may follow indentation and then a heading marker (`###`) or a
/// list bullet.
fn line_marker(line: &str) -> Option<(usize, &'static str, TaskStatus)> {
    let body = line.trim_start();
    let mut pos = line.len() - body.len();

    let after_hashes = body.trim_start_matches('#');
    let rest = if after_hashes.len() < body.len() {
        after_hashes
    } else {
        ["- ", "* ", "+ "]
            .iter()
            .find_map(|bullet| body.strip_prefix(bullet))
            .unwrap_or(body)
    };
    pos += body.len() - rest.len();

    let text = rest.trim_start();
    pos += rest.len() - text.len();

    let (marker, status) = leading_symbol(text)?;
    Some((pos, marker, status))
}

fn done_marker(marker: &str) -> &'static str {
    if marker.starts_with('[') {
        "[x]"
    } else {
        TaskStatus::Done.symbol()
    }
}

/// Mark the task titled `title` as done in `content`.
///
/// Finds the first task line whose text contains the title and whose
/// effective status is not done. The leading marker is replaced (`☐`/`🔄`/`⏸`
/// become `✅`, `[ ]`/`[~]` become `[x]`) unless it is already done, and the
/// value of the first body status line in the block, if any, becomes
/// `✅ 已完成` so it no longer overrides the heading. Everything else, line
/// endings included, is kept byte for byte. Returns `None` when no such line
/// exists.
///
/// # Example
///
/// ```
/// use plansync::reconcile::retarget_marker;
///
/// let doc = "### ✅ Login\n### ☐ Logout\n**状态**: 🔄 进行中\n";
/// assert_eq!(
///     retarget_marker(doc, "Logout").as_deref(),
///     Some("### ✅ Login\n### ✅ Logout\n**状态**: ✅ 已完成\n")
/// );
/// assert_eq!(retarget_marker(doc, "Login"), None);
/// ```
#[must_use]
pub fn retarget_marker(content: &str, title: &str) -> Option<String> {
    let title = normalize_title(title);
    if title.is_empty() {
        return None;
    }

    let mut lines = Vec::new();
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        lines.push((offset, line));
        offset += line.len();
    }

    for (idx, &(offset, line)) in lines.iter().enumerate() {
        let Some((pos, marker, marker_status)) = line_marker(line) else {
            continue;
        };
        if !normalize_title(&line[pos + marker.len()..]).contains(&title) {
            continue;
        }

        // First status line of the block, as an absolute byte range
        let body_status = lines[idx + 1..]
            .iter()
            .take_while(|(_, body_line)| !starts_block(body_line))
            .find_map(|&(body_offset, body_line)| {
                let range = status_value_range(body_line)?;
                let status = normalize_status(&body_line[range.clone()]);
                Some((body_offset + range.start..body_offset + range.end, status))
            });

        let effective = body_status.as_ref().map_or(marker_status, |(_, s)| *s);
        if effective.is_done() {
            continue;
        }

        let mut edits = Vec::with_capacity(2);
        if !marker_status.is_done() {
            let start = offset + pos;
            edits.push((start..start + marker.len(), done_marker(marker)));
        }
        if let Some((range, _)) = body_status {
            edits.push((range, TaskStatus::Done.label()));
        }

        let mut updated = String::with_capacity(content.len() + 16);
        let mut cursor = 0;
        for (range, replacement) in edits {
            updated.push_str(&content[cursor..range.start]);
            updated.push_str(replacement);
            cursor = range.end;
        }
        updated.push_str(&content[cursor..]);
        return Some(updated);
    }
    None
}

// ============================================================================
// Reconciler
// ============================================================================

/// Reconciles one project against one tracker.
pub struct Reconciler<'a, T: IssueTracker + ?Sized> {
    config: &'a SyncConfig,
    project_root: &'a Path,
    tracker: &'a T,
    dry_run: bool,
}

impl<'a, T: IssueTracker + ?Sized> Reconciler<'a, T> {
    #[must_use]
    pub fn new(config: &'a SyncConfig, project_root: &'a Path, tracker: &'a T) -> Self {
        Self {
            config,
            project_root,
            tracker,
            dry_run: false,
        }
    }

    /// Report changes without writing documents or changing issues.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run reconciliation in `direction`.
    ///
    /// # Errors
    ///
    /// [`crate::SyncError::Tracker`] if the issues cannot be listed. Every
    /// later failure is counted in the report instead.
    pub fn run(&self, direction: Direction) -> Result<ReconcileReport> {
        let issues = self
            .tracker
            .list_issues(StateFilter::All)
            .into_sync_tracker("list issues")?;
        tracing::debug!(count = issues.len(), "Listed issues");

        let mut report = ReconcileReport {
            dry_run: self.dry_run,
            ..ReconcileReport::default()
        };
        let mut marked_done = HashSet::new();
        if direction.includes_issues_to_documents() {
            marked_done = self.issues_to_documents(&issues, &mut report);
        }
        if direction.includes_documents_to_issues() {
            self.documents_to_issues(&issues, &marked_done, &mut report);
        }

        if report.failures > 0 {
            tracing::warn!(failures = report.failures, "Reconciliation finished with failures");
        }
        Ok(report)
    }

    /// Propagate closed issues into the phase documents.
    ///
    /// Returns the ids of the issues whose task was marked done (or would be,
    /// in a dry run).
    pub fn issues_to_documents(
        &self,
        issues: &[IssueRef],
        report: &mut ReconcileReport,
    ) -> HashSet<u64> {
        // Tasks to mark done, grouped per document in first-seen order
        let mut pending: Vec<(PathBuf, Vec<(u64, String)>)> = Vec::new();
        let mut marked_done = HashSet::new();

        for issue in issues.iter().filter(|i| i.state.is_closed()) {
            let Some(phase) = phase_for_issue(self.config, issue) else {
                tracing::warn!(issue = issue.id, title = %issue.title, "Cannot resolve phase for issue");
                report.skipped += 1;
                continue;
            };
            let path = self.config.document_path(self.project_root, phase);
            if !path.is_file() {
                tracing::warn!(issue = issue.id, path = %path.display(), "Phase document missing");
                report.skipped += 1;
                continue;
            }

            let task = (issue.id, issue.task_title().to_string());
            match pending.iter_mut().find(|(p, _)| *p == path) {
                Some((_, tasks)) => tasks.push(task),
                None => pending.push((path, vec![task])),
            }
        }

        for (path, tasks) in pending {
            let original = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot read phase document");
                    report.failures += 1;
                    continue;
                }
            };

            let mut content = original.clone();
            let mut changed = Vec::new();
            for (id, title) in &tasks {
                match retarget_marker(&content, title) {
                    Some(updated) => {
                        tracing::info!(path = %path.display(), title = %title, "Marked task done");
                        content = updated;
                        changed.push(*id);
                    }
                    None => {
                        tracing::debug!(title = %title, "No open task line to update");
                    }
                }
            }
            if changed.is_empty() {
                continue;
            }

            if !self.dry_run {
                if let Err(e) = atomic_write(&path, content.as_bytes()) {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot write phase document");
                    report.failures += 1;
                    continue;
                }
            }
            report.lines_updated += changed.len();
            report.documents_updated.push(path);
            marked_done.extend(changed);
        }
        marked_done
    }

    /// Push each task's done / not done status to its issue.
    ///
    /// Issues in `marked_done` are never reopened.
    pub fn documents_to_issues(
        &self,
        issues: &[IssueRef],
        marked_done: &HashSet<u64>,
        report: &mut ReconcileReport,
    ) {
        let index: HashMap<String, &IssueRef> = issues
            .iter()
            .map(|issue| (normalize_title(&issue.title), issue))
            .collect();

        for phase in &self.config.phases {
            let path = self.config.document_path(self.project_root, phase);
            let document = parse_file(&path, &self.config.parser);
            if document.is_missing() {
                continue;
            }

            for task in &document.tasks {
                let title = issue_title(&phase.name, &task.title, self.config.tracker.max_title_len);
                let Some(issue) = index.get(&normalize_title(&title)) else {
                    tracing::warn!(title = %title, "No issue for task");
                    report.skipped += 1;
                    continue;
                };

                let desired = if task.status.is_done() {
                    IssueState::Closed
                } else {
                    IssueState::Open
                };
                if issue.state == desired {
                    continue;
                }
                if desired == IssueState::Open && marked_done.contains(&issue.id) {
                    tracing::debug!(issue = issue.id, "Issue just marked its task done; not reopening");
                    continue;
                }

                if !self.dry_run {
                    if let Err(e) = self.tracker.set_issue_state(issue.id, desired) {
                        tracing::warn!(issue = issue.id, error = %e, "Failed to update issue state");
                        report.failures += 1;
                        continue;
                    }
                }
                tracing::info!(issue = issue.id, state = %desired, "Updated issue state");
                match desired {
                    IssueState::Closed => report.issues_closed += 1,
                    IssueState::Open => report.issues_reopened += 1,
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhaseMapping;
    use crate::testing::{MockIssueTracker, ProjectFixture};

    fn config() -> SyncConfig {
        SyncConfig {
            phases: vec![
                PhaseMapping::new("🔴 Alpha", "alpha.md"),
                PhaseMapping::new("Beta", "beta.md"),
            ],
            ..SyncConfig::default()
        }
    }

    // ========================================================================
    // Marker Retargeting
    // ========================================================================

    #[test]
    fn test_retarget_heading_marker() {
        let doc = "# Phase\n\n### 🔄 Login page\n";
        let updated = retarget_marker(doc, "Login page").unwrap();
        assert_eq!(updated, "# Phase\n\n### ✅ Login page\n");
    }

    #[test]
    fn test_retarget_rewrites_body_status_line() {
        let doc = "### ☐ Login\n\n**状态**: ☐ 未开始\n**描述**: form\n\n### ☐ Logout\n**状态**: 🔄 进行中\n";
        let updated = retarget_marker(doc, "Login").unwrap();
        assert_eq!(
            updated,
            "### ✅ Login\n\n**状态**: ✅ 已完成\n**描述**: form\n\n### ☐ Logout\n**状态**: 🔄 进行中\n"
        );
        let tasks = crate::tasks::parse_document(&updated, &Default::default());
        assert_eq!(tasks[0].status, TaskStatus::Done);
        assert_eq!(tasks[1].status, TaskStatus::InProgress);
    }

    #[test]
    fn test_retarget_done_heading_with_open_body_status() {
        let doc = "### ✅ Login\r\n- **Status:** in progress\r\n";
        assert_eq!(
            retarget_marker(doc, "Login").as_deref(),
            Some("### ✅ Login\r\n- **Status:** ✅ 已完成\r\n")
        );
    }

    #[test]
    fn test_retarget_skips_task_done_by_body_status() {
        assert_eq!(retarget_marker("### ☐ Login\n**状态**: 完成\n", "Login"), None);
    }

    #[test]
    fn test_retarget_bracket_markers() {
        assert_eq!(
            retarget_marker("- [ ] Write tests\n", "Write tests").as_deref(),
            Some("- [x] Write tests\n")
        );
        assert_eq!(
            retarget_marker("  * [~] Deploy\n", "Deploy").as_deref(),
            Some("  * [x] Deploy\n")
        );
    }

    #[test]
    fn test_retarget_paused_with_variation_selector() {
        assert_eq!(
            retarget_marker("⏸️ Review\n", "Review").as_deref(),
            Some("✅ Review\n")
        );
    }

    #[test]
    fn test_retarget_preserves_crlf_and_other_lines() {
        let doc = "### ☐ A\r\n### ☐ B\r\nplain B text\r\n";
        assert_eq!(
            retarget_marker(doc, "B").as_deref(),
            Some("### ☐ A\r\n### ✅ B\r\nplain B text\r\n")
        );
    }

    #[test]
    fn test_retarget_only_first_open_match() {
        let doc = "### ✅ Setup\n### ☐ Setup\n### ☐ Setup\n";
        assert_eq!(
            retarget_marker(doc, "Setup").as_deref(),
            Some("### ✅ Setup\n### ✅ Setup\n### ☐ Setup\n")
        );
    }

    #[test]
    fn test_retarget_ignores_lines_without_marker() {
        assert_eq!(retarget_marker("Login is described here\n", "Login"), None);
        assert_eq!(retarget_marker("### ☐ A\n", ""), None);
    }

    // ========================================================================
    // Issues to Documents
    // ========================================================================

    #[test]
    fn test_closed_issue_marks_document_task_done() {
        let fixture = ProjectFixture::new(config())
            .with_document("alpha.md", "### ☐ Login\n\n### 🔄 Logout\n");
        let tracker = MockIssueTracker::new()
            .with_issue(1, "[Alpha] Logout", IssueState::Closed, &["phase-alpha"])
            .with_issue(2, "[Alpha] Login", IssueState::Open, &["phase-alpha"]);

        let report = Reconciler::new(fixture.config(), fixture.root(), &tracker)
            .run(Direction::IssuesToDocuments)
            .unwrap();

        assert_eq!(report.lines_updated, 1);
        assert_eq!(report.documents_updated.len(), 1);
        assert_eq!(fixture.read_document("alpha.md"), "### ☐ Login\n\n### ✅ Logout\n");
        assert!(tracker.state_changes().is_empty());
    }

    #[test]
    fn test_unresolvable_phase_is_skipped() {
        let fixture = ProjectFixture::new(config()).with_document("alpha.md", "### ☐ Login\n");
        let tracker = MockIssueTracker::new()
            .with_issue(1, "Login", IssueState::Closed, &[])
            .with_issue(2, "[Beta] Charts", IssueState::Closed, &["phase-beta"]);

        let report = Reconciler::new(fixture.config(), fixture.root(), &tracker)
            .run(Direction::IssuesToDocuments)
            .unwrap();

        // No phase for #1, missing beta.md for #2
        assert_eq!(report.skipped, 2);
        assert!(!report.has_changes());
        assert_eq!(fixture.read_document("alpha.md"), "### ☐ Login\n");
    }

    #[test]
    fn test_dry_run_leaves_documents_byte_identical() {
        let fixture = ProjectFixture::new(config()).with_document("alpha.md", "### ☐ Login\n");
        let tracker = MockIssueTracker::new().with_issue(
            1,
            "[Alpha] Login",
            IssueState::Closed,
            &["phase-alpha"],
        );

        let report = Reconciler::new(fixture.config(), fixture.root(), &tracker)
            .with_dry_run(true)
            .run(Direction::IssuesToDocuments)
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.lines_updated, 1);
        assert_eq!(fixture.read_document("alpha.md"), "### ☐ Login\n");
    }

    // ========================================================================
    // Documents to Issues
    // ========================================================================

    #[test]
    fn test_document_status_closes_and_reopens_issues() {
        let fixture = ProjectFixture::new(config())
            .with_document("alpha.md", "### ✅ Login\n\n### ⏸ Logout\n\n### ☐ Profile\n");
        let tracker = MockIssueTracker::new()
            .with_issue(1, "[Alpha] Login", IssueState::Open, &["phase-alpha"])
            .with_issue(2, "[Alpha] Logout", IssueState::Closed, &["phase-alpha"]);

        let report = Reconciler::new(fixture.config(), fixture.root(), &tracker)
            .run(Direction::DocumentsToIssues)
            .unwrap();

        assert_eq!(report.issues_closed, 1);
        assert_eq!(report.issues_reopened, 1);
        // Profile has no issue and none is created
        assert_eq!(report.skipped, 1);
        assert_eq!(tracker.issues().len(), 2);
        assert_eq!(
            tracker.state_changes(),
            vec![(1, IssueState::Closed), (2, IssueState::Open)]
        );
    }

    #[test]
    fn test_tracker_failure_is_counted_and_run_continues() {
        let fixture = ProjectFixture::new(config())
            .with_document("alpha.md", "### ✅ Login\n\n### ✅ Logout\n");
        let tracker = MockIssueTracker::new()
            .with_issue(1, "[Alpha] Login", IssueState::Open, &["phase-alpha"])
            .with_issue(2, "[Alpha] Logout", IssueState::Open, &["phase-alpha"])
            .with_failing_issue(1);

        let report = Reconciler::new(fixture.config(), fixture.root(), &tracker)
            .run(Direction::DocumentsToIssues)
            .unwrap();

        assert_eq!(report.failures, 1);
        assert_eq!(report.issues_closed, 1);
        assert_eq!(tracker.issue(2).unwrap().state, IssueState::Closed);
    }

    #[test]
    fn test_listing_failure_is_fatal() {
        let fixture = ProjectFixture::new(config());
        let tracker = MockIssueTracker::new().with_list_error("network down");

        let err = Reconciler::new(fixture.config(), fixture.root(), &tracker)
            .run(Direction::Both)
            .unwrap_err();
        assert!(err.to_string().contains("network down"));
    }

    #[test]
    fn test_both_directions_converge() {
        let fixture = ProjectFixture::new(config())
            .with_document("alpha.md", "### ☐ Login\n\n### ✅ Logout\n");
        let tracker = MockIssueTracker::new()
            .with_issue(1, "[Alpha] Login", IssueState::Closed, &["phase-alpha"])
            .with_issue(2, "[Alpha] Logout", IssueState::Open, &["phase-alpha"]);

        let reconciler = Reconciler::new(fixture.config(), fixture.root(), &tracker);
        let first = reconciler.run(Direction::Both).unwrap();
        assert_eq!(first.lines_updated, 1);
        assert_eq!(first.issues_closed, 1);
        assert_eq!(first.issues_reopened, 0);

        let second = reconciler.run(Direction::Both).unwrap();
        assert!(!second.has_changes());
    }

    #[test]
    fn test_both_directions_keep_closed_issue_with_body_status() {
        let fixture = ProjectFixture::new(config())
            .with_document("alpha.md", "### ☐ Login\n\n**状态**: ☐ 未开始\n");
        let tracker = MockIssueTracker::new().with_issue(
            1,
            "[Alpha] Login",
            IssueState::Closed,
            &["phase-alpha"],
        );

        let report = Reconciler::new(fixture.config(), fixture.root(), &tracker)
            .run(Direction::Both)
            .unwrap();

        assert_eq!(report.lines_updated, 1);
        assert_eq!(report.issues_reopened, 0);
        assert!(tracker.state_changes().is_empty());
        assert_eq!(tracker.issue(1).unwrap().state, IssueState::Closed);
        assert_eq!(
            fixture.read_document("alpha.md"),
            "### ✅ Login\n\n**状态**: ✅ 已完成\n"
        );
    }

    #[test]
    fn test_both_directions_dry_run_does_not_plan_reopen() {
        let fixture = ProjectFixture::new(config()).with_document("alpha.md", "### ☐ Login\n");
        let tracker = MockIssueTracker::new().with_issue(
            1,
            "[Alpha] Login",
            IssueState::Closed,
            &["phase-alpha"],
        );

        let report = Reconciler::new(fixture.config(), fixture.root(), &tracker)
            .with_dry_run(true)
            .run(Direction::Both)
            .unwrap();

        assert_eq!(report.lines_updated, 1);
        assert_eq!(report.issues_reopened, 0);
        assert_eq!(fixture.read_document("alpha.md"), "### ☐ Login\n");
    }
}
