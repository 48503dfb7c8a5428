//! The authoritative structured model (`project-plan-structured.json`).
//!
//! Every type here carries a flattened `extra` map. Keys the crate does not
//! own are read into it and written back unchanged (and, with serde_json's
//! `preserve_order`, in their original position relative to each other), so
//! a rewrite never loses data another tool put there.
//!
//! Loading is forgiving about shape. Derived fields (`progress`,
//! `overallProgress`, `lastUpdated`, `lastSynced`) are recomputed on every
//! sync, so a value of the wrong type reads as absent, and `null` reads as
//! empty for the string fields.

pub mod persistence;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::tasks::{format_percentage, PhaseProgress, TaskRecord};

pub use persistence::{load_model, load_model_value, save_model};

// ============================================================================
// Field Deserializers
// ============================================================================

/// Read `null` as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Read a derived field, treating a value of the wrong shape as absent.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed derived field");
            Ok(None)
        }
    }
}

/// Read a stored percentage. A bare number becomes `"<n>%"`.
fn percentage_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => Some(text),
        Value::Number(n) => n.as_f64().map(format_percentage),
        _ => None,
    })
}

// ============================================================================
// Module
// ============================================================================

/// An architectural component of the project.
///
/// `status` is free text with an embedded percentage (`"42% done"`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Module {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Phase Detail
// ============================================================================

/// One delivery phase and its tasks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDetail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub phase: String,

    /// Relative path of the source document
    #[serde(default, deserialize_with = "null_as_default")]
    pub document: String,

    /// Tasks in document order
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub progress: Option<PhaseProgress>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub last_synced: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PhaseDetail {
    /// An empty phase entry pointing at `document`.
    #[must_use]
    pub fn new(phase: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            document: document.into(),
            ..Self::default()
        }
    }

    /// Number of done tasks.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.status.is_done()).count()
    }
}

// ============================================================================
// Project Model
// ============================================================================

/// Root of the persisted model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectModel {
    #[serde(default)]
    pub modules: Vec<Module>,

    #[serde(default)]
    pub phase_details: Vec<PhaseDetail>,

    /// Rendered as `"<pct>%"`
    #[serde(
        default,
        deserialize_with = "percentage_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub overall_progress: Option<String>,

    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectModel {
    /// Find a phase by name.
    #[must_use]
    pub fn phase(&self, name: &str) -> Option<&PhaseDetail> {
        self.phase_details.iter().find(|p| p.phase == name)
    }
}

// ============================================================================
// Tests
// ============================================================================
