//! Canonical task status and the surface spellings that map onto it.
//!
//! Phase documents spell status in several ways: emoji symbols in headings,
//! GitHub-style bracket checkboxes, and free text in a `**状态**:` body line.
//! All of them collapse to [`TaskStatus`] through one lookup table
//! ([`STATUS_SYMBOLS`]) and one vocabulary, so heading symbols and body lines
//! are normalized identically.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ============================================================================
// Task Status
// ============================================================================

/// Canonical status of a task.
///
/// When crossing into the issue tracker the four values collapse to a binary
/// done / not done (see [`TaskStatus::is_done`]); the tracker has no notion of
/// paused or in-progress work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskStatus {
    /// Work has not begun
    #[default]
    NotStarted,
    /// Work is underway
    InProgress,
    /// Work is paused or waiting on a decision
    Paused,
    /// Work is complete
    Done,
}

impl TaskStatus {
    /// All statuses in display order.
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Done,
        TaskStatus::InProgress,
        TaskStatus::Paused,
        TaskStatus::NotStarted,
    ];

    /// Canonical emoji symbol.
    #[must_use]
    pub fn symbol(&self) -> &'static str {
        match self {
            TaskStatus::Done => "✅",
            TaskStatus::InProgress => "🔄",
            TaskStatus::Paused => "⏸",
            TaskStatus::NotStarted => "☐",
        }
    }

    /// Canonical display label, e.g. `✅ 已完成`.
    ///
    /// This is the form written into the structured model.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Done => "✅ 已完成",
            TaskStatus::InProgress => "🔄 进行中",
            TaskStatus::Paused => "⏸ 暂停/待定",
            TaskStatus::NotStarted => "☐ 未开始",
        }
    }

    /// Whether this status counts as done when talking to the tracker.
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }

    /// Short slug used for tracker labels (`done`, `in-progress`, ...).
    #[must_use]
    pub fn slug(&self) -> &'static str {
        match self {
            TaskStatus::Done => "done",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Paused => "paused",
            TaskStatus::NotStarted => "pending",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Serialize for TaskStatus {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Never fails on content: hand-edited models may carry any spelling.
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(normalize_status).unwrap_or_default())
    }
}

// ============================================================================
// Symbol Table
// ============================================================================

/// Every recognized status marker and the status it encodes.
///
/// Longer spellings come before their prefixes (`⏸️` before `⏸`) so the
/// longest match wins when scanning.
pub const STATUS_SYMBOLS: &[(&str, TaskStatus)] = &[
    ("✅", TaskStatus::Done),
    ("✔️", TaskStatus::Done),
    ("✔", TaskStatus::Done),
    ("[x]", TaskStatus::Done),
    ("[X]", TaskStatus::Done),
    ("🔄", TaskStatus::InProgress),
    ("[~]", TaskStatus::InProgress),
    ("⏸️", TaskStatus::Paused),
    ("⏸", TaskStatus::Paused),
    ("☐", TaskStatus::NotStarted),
    ("[ ]", TaskStatus::NotStarted),
    ("[]", TaskStatus::NotStarted),
];

/// Match a status marker at the very start of `text`.
///
/// Returns the marker as written and the status it encodes.
///
/// # Example
///
/// ```
/// use plansync::tasks::status::{leading_symbol, TaskStatus};
///
/// assert_eq!(leading_symbol("[~] Wire up API"), Some(("[~]", TaskStatus::InProgress)));
/// assert_eq!(leading_symbol("Plain title"), None);
/// ```
#[must_use]
pub fn leading_symbol(text: &str) -> Option<(&'static str, TaskStatus)> {
    STATUS_SYMBOLS
        .iter()
        .find(|(symbol, _)| text.starts_with(symbol))
        .copied()
}

/// Strip every leading status marker (and the whitespace after each).
///
/// Headings such as `### ✅ [x] Title` carry redundant markers; all of them
/// are removed so only the title text remains.
#[must_use]
pub fn strip_status_markers(text: &str) -> &str {
    let mut rest = text.trim_start();
    while let Some((symbol, _)) = leading_symbol(rest) {
        rest = rest[symbol.len()..].trim_start();
    }
    rest
}

// ============================================================================
// Free-text Vocabulary
// ============================================================================

// Negative phrases are listed first: "未完成" contains "完成".
const VOCABULARY: &[(&str, TaskStatus)] = &[
    ("not started", TaskStatus::NotStarted),
    ("not-started", TaskStatus::NotStarted),
    ("not done", TaskStatus::NotStarted),
    ("incomplete", TaskStatus::NotStarted),
    ("未开始", TaskStatus::NotStarted),
    ("未完成", TaskStatus::NotStarted),
    ("in progress", TaskStatus::InProgress),
    ("in-progress", TaskStatus::InProgress),
    ("ongoing", TaskStatus::InProgress),
    ("进行中", TaskStatus::InProgress),
    ("pending decision", TaskStatus::Paused),
    ("pending-decision", TaskStatus::Paused),
    ("paused", TaskStatus::Paused),
    ("on hold", TaskStatus::Paused),
    ("暂停", TaskStatus::Paused),
    ("待定", TaskStatus::Paused),
    ("completed", TaskStatus::Done),
    ("complete", TaskStatus::Done),
    ("done", TaskStatus::Done),
    ("已完成", TaskStatus::Done),
    ("完成", TaskStatus::Done),
];

/// Map a raw status token to its canonical value.
///
/// Accepts a bare symbol, a symbol followed by a label (`🔄 进行中`), or free
/// text from the vocabulary. Anything unrecognized is `NotStarted`; this
/// function never fails.
///
/// # Example
///
/// ```
/// use plansync::tasks::status::{normalize_status, TaskStatus};
///
/// assert_eq!(normalize_status("✅ 已完成"), TaskStatus::Done);
/// assert_eq!(normalize_status("In Progress"), TaskStatus::InProgress);
/// assert_eq!(normalize_status("???"), TaskStatus::NotStarted);
/// ```
#[must_use]
pub fn normalize_status(raw: &str) -> TaskStatus {
    let trimmed = raw.trim();
    if let Some((_, status)) = leading_symbol(trimmed) {
        return status;
    }

    let lowered = trimmed.to_lowercase();
    VOCABULARY
        .iter()
        .find(|(word, _)| lowered.contains(word))
        .map(|(_, status)| *status)
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_map_to_each_status() {
        assert_eq!(normalize_status("✅"), TaskStatus::Done);
        assert_eq!(normalize_status("🔄"), TaskStatus::InProgress);
        assert_eq!(normalize_status("⏸"), TaskStatus::Paused);
        assert_eq!(normalize_status("⏸️"), TaskStatus::Paused);
        assert_eq!(normalize_status("☐"), TaskStatus::NotStarted);
    }

    #[test]
    fn test_bracket_aliases() {
        assert_eq!(normalize_status("[x]"), TaskStatus::Done);
        assert_eq!(normalize_status("[X]"), TaskStatus::Done);
        assert_eq!(normalize_status("[~]"), TaskStatus::InProgress);
        assert_eq!(normalize_status("[ ]"), TaskStatus::NotStarted);
        assert_eq!(normalize_status("[]"), TaskStatus::NotStarted);
    }

    #[test]
    fn test_canonical_labels_round_trip() {
        for status in TaskStatus::ALL {
            assert_eq!(normalize_status(status.label()), status);
        }
    }

    #[test]
    fn test_free_text_vocabulary() {
        assert_eq!(normalize_status("Completed"), TaskStatus::Done);
        assert_eq!(normalize_status("done"), TaskStatus::Done);
        assert_eq!(normalize_status("in progress"), TaskStatus::InProgress);
        assert_eq!(normalize_status("Pending decision"), TaskStatus::Paused);
        assert_eq!(normalize_status("not started"), TaskStatus::NotStarted);
        assert_eq!(normalize_status("进行中"), TaskStatus::InProgress);
    }

    #[test]
    fn test_negative_phrases_win_over_positive_substrings() {
        assert_eq!(normalize_status("未完成"), TaskStatus::NotStarted);
        assert_eq!(normalize_status("not done yet"), TaskStatus::NotStarted);
    }

    #[test]
    fn test_unknown_defaults_to_not_started() {
        assert_eq!(normalize_status(""), TaskStatus::NotStarted);
        assert_eq!(normalize_status("blocked by legal"), TaskStatus::NotStarted);
    }

    #[test]
    fn test_strip_status_markers_removes_stacked_markers() {
        assert_eq!(strip_status_markers("✅ [x] Build login"), "Build login");
        assert_eq!(strip_status_markers("⏸️ Wait"), "Wait");
        assert_eq!(strip_status_markers("✅"), "");
        assert_eq!(strip_status_markers("Title [x] inside"), "Title [x] inside");
    }

    #[test]
    fn test_serde_uses_display_label() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"🔄 进行中\"");

        let parsed: TaskStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, TaskStatus::Done);

        let unknown: TaskStatus = serde_json::from_str("\"whatever\"").unwrap();
        assert_eq!(unknown, TaskStatus::NotStarted);
    }

    #[test]
    fn test_is_done_collapses_to_binary() {
        assert!(TaskStatus::Done.is_done());
        assert!(!TaskStatus::InProgress.is_done());
        assert!(!TaskStatus::Paused.is_done());
        assert!(!TaskStatus::NotStarted.is_done());
    }
}
