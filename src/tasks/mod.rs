//! Task extraction from phase documents.
//!
//! - [`status`] - canonical [`TaskStatus`] and the symbol/vocabulary normalizer
//! - [`parsing`] - the two-pass Markdown task block parser
//! - [`progress`] - per-phase and overall progress roll-ups

pub mod parsing;
pub mod progress;
pub mod status;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use parsing::{
    parse_document, parse_file, resolve_block, split_blocks, Grammar, ParseOptions,
    ParsedDocument, RawTaskBlock,
};
pub use progress::{
    extract_percentage, format_percentage, overall_progress, round_one_decimal, PhaseProgress,
};
pub use status::{normalize_status, TaskStatus};

// ============================================================================
// Task Record
// ============================================================================

/// One parsed unit of work.
///
/// The detail fields are optional extras picked up from the task body; they
/// are omitted from the JSON model when empty. Keys this type does not know
/// about are kept in `extra` so a hand-edited model survives a rewrite.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    /// Title with every status marker and the `@done(...)` annotation removed
    #[serde(default, deserialize_with = "crate::model::null_as_default")]
    pub title: String,

    /// Canonical status, serialized as its display label
    #[serde(default)]
    pub status: TaskStatus,

    /// Date from an `@done(<date>)` annotation, carried as written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_date: Option<String>,

    /// When the merger extracted this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_logic: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_files: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Fields this crate does not own
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskRecord {
    /// Create a record with just a title and status.
    ///
    /// # Example
    ///
    /// ```
    /// use plansync::tasks::{TaskRecord, TaskStatus};
    ///
    /// let task = TaskRecord::new("Build login form", TaskStatus::Done);
    /// assert!(task.status.is_done());
    /// ```
    #[must_use]
    pub fn new(title: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            title: title.into(),
            status,
            ..Self::default()
        }
    }

    /// Attach a completion date.
    #[must_use]
    pub fn with_completion_date(mut self, date: impl Into<String>) -> Self {
        self.completion_date = Some(date.into());
        self
    }
}
