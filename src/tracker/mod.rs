//! Issue tracker seam.
//!
//! The reconciler and the issue publisher only ever talk to an
//! [`IssueTracker`]. [`GhCliTracker`] implements it over the `gh` CLI; tests
//! use [`crate::testing::MockIssueTracker`].
//!
//! A task and its issue are linked by `(phase, title)`. The issue title is
//! `[<phase key>] <task title>` and the phase is carried by a
//! `<prefix><slug>` label, so both survive manual edits of the other.

pub mod gh;

pub use gh::GhCliTracker;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{PhaseMapping, SyncConfig};

// ============================================================================
// Issue Types
// ============================================================================

/// Open or closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    #[must_use]
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

impl std::fmt::Display for IssueState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Which issues to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateFilter {
    Open,
    Closed,
    #[default]
    All,
}

impl StateFilter {
    #[must_use]
    pub fn matches(self, state: IssueState) -> bool {
        match self {
            Self::Open => state == IssueState::Open,
            Self::Closed => state == IssueState::Closed,
            Self::All => true,
        }
    }
}

/// An issue as seen by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub id: u64,
    pub title: String,
    pub state: IssueState,
    pub labels: Vec<String>,
    /// Phase slug from the first phase label, if any
    pub phase: Option<String>,
}

impl IssueRef {
    /// Build an issue, deriving `phase` from labels carrying `phase_prefix`.
    #[must_use]
    pub fn new(
        id: u64,
        title: impl Into<String>,
        state: IssueState,
        labels: Vec<String>,
        phase_prefix: &str,
    ) -> Self {
        let phase = labels
            .iter()
            .find_map(|l| l.strip_prefix(phase_prefix))
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        Self {
            id,
            title: title.into(),
            state,
            labels,
            phase,
        }
    }

    /// Task part of the title, with any `[phase] ` prefix removed.
    #[must_use]
    pub fn task_title(&self) -> &str {
        split_issue_title(&self.title).1
    }
}

// ============================================================================
// Tracker Trait
// ============================================================================

/// Minimal issue tracker operations.
///
/// Implementations are synchronous; every call is a single request.
pub trait IssueTracker {
    /// List issues in the given state.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker cannot be reached.
    fn list_issues(&self, filter: StateFilter) -> Result<Vec<IssueRef>>;

    /// Create an open issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the tracker rejects the issue.
    fn create_issue(&self, title: &str, body: &str, labels: &[String]) -> Result<IssueRef>;

    /// Open or close an issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the issue does not exist or the call fails.
    fn set_issue_state(&self, id: u64, state: IssueState) -> Result<()>;

    /// Create the label if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the label cannot be created.
    fn ensure_label(&self, name: &str) -> Result<()>;
}

// ============================================================================
// Naming
// ============================================================================

const PRIORITY_MARKERS: [char; 3] = ['🔴', '🟡', '🟢'];

/// Phase name without priority markers or a trailing `[...]` note.
///
/// # Example
///
/// ```
/// use plansync::tracker::phase_key;
///
/// assert_eq!(phase_key("🔴 阶段一：认证系统完善 [进行中]"), "阶段一：认证系统完善");
/// assert_eq!(phase_key("Beta"), "Beta");
/// ```
#[must_use]
pub fn phase_key(phase: &str) -> String {
    let mut key = String::with_capacity(phase.len());
    let mut depth = 0usize;
    for c in phase.chars() {
        match c {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            _ if depth > 0 => {}
            _ if PRIORITY_MARKERS.contains(&c) => {}
            _ => key.push(c),
        }
    }
    key.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tracker-safe label text: lowercase, spaces and `/` become `-`, brackets
/// are dropped.
///
/// # Example
///
/// ```
/// use plansync::tracker::label_slug;
///
/// assert_eq!(label_slug("UI/UX Review"), "ui-ux-review");
/// assert_eq!(label_slug("[Beta] 2"), "beta-2");
/// ```
#[must_use]
pub fn label_slug(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '(' | ')'))
        .map(|c| if c == ' ' || c == '/' { '-' } else { c })
        .flat_map(char::to_lowercase)
        .collect()
}

/// Label linking an issue to `phase`.
#[must_use]
pub fn phase_label(prefix: &str, phase: &str) -> String {
    format!("{}{}", prefix, label_slug(&phase_key(phase)))
}

/// Issue title for a task, truncated to `max_len` characters.
///
/// # Example
///
/// ```
/// use plansync::tracker::issue_title;
///
/// assert_eq!(issue_title("🔴 Alpha", "Login", 250), "[Alpha] Login");
/// assert_eq!(issue_title("Alpha", "A very long title", 12), "[Alpha] A...");
/// ```
#[must_use]
pub fn issue_title(phase: &str, task_title: &str, max_len: usize) -> String {
    let title = format!("[{}] {}", phase_key(phase), task_title.trim());
    if title.chars().count() <= max_len {
        return title;
    }
    let mut truncated: String = title.chars().take(max_len.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}

/// Split `[key] rest` into `(Some(key), rest)`; other titles are `(None, title)`.
#[must_use]
pub fn split_issue_title(title: &str) -> (Option<&str>, &str) {
    let trimmed = title.trim();
    if let Some(rest) = trimmed.strip_prefix('[') {
        if let Some((key, task)) = rest.split_once("] ") {
            return (Some(key), task.trim());
        }
    }
    (None, trimmed)
}

/// Whitespace-collapsed title used for matching.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The configured phase an issue belongs to.
///
/// The phase label decides; issues without one fall back to the `[key]`
/// prefix of their title.
#[must_use]
pub fn phase_for_issue<'c>(config: &'c SyncConfig, issue: &IssueRef) -> Option<&'c PhaseMapping> {
    if let Some(slug) = &issue.phase {
        return config
            .phases
            .iter()
            .find(|p| label_slug(&phase_key(&p.name)) == *slug);
    }
    let (key, _) = split_issue_title(&issue.title);
    let key = key?;
    config.phases.iter().find(|p| phase_key(&p.name) == key)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(title: &str, labels: &[&str]) -> IssueRef {
        IssueRef::new(
            1,
            title,
            IssueState::Closed,
            labels.iter().map(|l| l.to_string()).collect(),
            "phase-",
        )
    }

    #[test]
    fn test_phase_from_labels() {
        let i = issue("[Alpha] Login", &["task", "phase-alpha", "phase-beta"]);
        assert_eq!(i.phase.as_deref(), Some("alpha"));
        assert!(issue("x", &["task"]).phase.is_none());
        assert!(issue("x", &["phase-"]).phase.is_none());
    }

    #[test]
    fn test_task_title_strips_prefix() {
        assert_eq!(issue("[Alpha] Login page", &[]).task_title(), "Login page");
        assert_eq!(issue("Plain title", &[]).task_title(), "Plain title");
        assert_eq!(issue("[unterminated", &[]).task_title(), "[unterminated");
    }

    #[test]
    fn test_phase_key_strips_markers() {
        assert_eq!(phase_key("🟡 阶段二：核心监控功能"), "阶段二：核心监控功能");
        assert_eq!(phase_key("Gamma [draft] [v2]"), "Gamma");
    }

    #[test]
    fn test_phase_label() {
        assert_eq!(phase_label("phase-", "🔴 阶段五：API 与数据流"), "phase-阶段五：api-与数据流");
        assert_eq!(phase_label("phase-", "Beta Rollout"), "phase-beta-rollout");
    }

    #[test]
    fn test_issue_title_truncation_counts_chars() {
        let title = issue_title("阶段", &"测".repeat(300), 250);
        assert_eq!(title.chars().count(), 250);
        assert!(title.ends_with("..."));
        assert!(title.starts_with("[阶段] "));
    }

    #[test]
    fn test_phase_for_issue_by_label_and_title() {
        let config = SyncConfig {
            phases: vec![
                PhaseMapping::new("🔴 Alpha Phase", "alpha.md"),
                PhaseMapping::new("Beta", "beta.md"),
            ],
            ..SyncConfig::default()
        };

        let by_label = issue("Login", &["phase-alpha-phase"]);
        assert_eq!(phase_for_issue(&config, &by_label).unwrap().document, "alpha.md");

        let by_title = issue("[Beta] Charts", &["task"]);
        assert_eq!(phase_for_issue(&config, &by_title).unwrap().document, "beta.md");

        assert!(phase_for_issue(&config, &issue("Charts", &[])).is_none());
        assert!(phase_for_issue(&config, &issue("x", &["phase-gamma"])).is_none());
    }

    #[test]
    fn test_state_filter() {
        assert!(StateFilter::All.matches(IssueState::Open));
        assert!(StateFilter::Closed.matches(IssueState::Closed));
        assert!(!StateFilter::Open.matches(IssueState::Closed));
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Login \t page "), "Login page");
    }
}
