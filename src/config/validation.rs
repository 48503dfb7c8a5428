//! Consistency checks across configuration, documents and the model.
//!
//! # Example
//!
//! ```rust,ignore
//! use plansync::config::{validate_consistency, SyncConfig};
//! use std::path::Path;
//!
//! let report = validate_consistency(&SyncConfig::default(), Path::new("."));
//! if !report.is_valid() {
//!     for error in &report.errors {
//!         eprintln!("Error: {}", error);
//!     }
//!     std::process::exit(report.exit_code());
//! }
//! ```

use std::path::{Path, PathBuf};

use super::SyncConfig;
use crate::model::load_model_value;

/// Top-level keys every model must carry.
pub const REQUIRED_MODEL_FIELDS: [&str; 3] = ["modules", "phaseDetails", "overallProgress"];

/// Result of a consistency check.
///
/// Errors make the project inconsistent; warnings are reported but do not.
#[derive(Debug, Clone, Default)]
pub struct ConsistencyReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Files that were looked at
    pub files_checked: Vec<PathBuf>,
}

impl ConsistencyReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no errors were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// 0 if valid, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.is_valid() {
            0
        } else {
            1
        }
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        match (self.errors.len(), self.warnings.len()) {
            (0, 0) => "Project data is consistent.".to_string(),
            (0, w) => format!("Project data is consistent with {} warning(s).", w),
            (e, _) => format!("Project data is inconsistent with {} error(s).", e),
        }
    }
}

/// Check a project against its configuration.
///
/// Never fails; every problem found lands in the report.
#[must_use]
pub fn validate_consistency(config: &SyncConfig, project_root: &Path) -> ConsistencyReport {
    let mut report = ConsistencyReport::new();

    let sum = config.weight_sum();
    if (sum - 1.0).abs() > config.weight_tolerance {
        report.errors.push(format!(
            "Module weights sum to {:.2}, expected 1.0 (tolerance {})",
            sum, config.weight_tolerance
        ));
    }

    for phase in &config.phases {
        let path = config.document_path(project_root, phase);
        if !path.is_file() {
            report.warnings.push(format!(
                "Phase document missing for '{}': {}",
                phase.name,
                path.display()
            ));
        }
        report.files_checked.push(path);
    }

    let model_path = config.model_path(project_root);
    match load_model_value(&model_path) {
        Ok(value) => {
            for field in REQUIRED_MODEL_FIELDS {
                if value.get(field).is_none() {
                    report
                        .errors
                        .push(format!("Model is missing required field '{}'", field));
                }
            }
        }
        Err(e) => report.errors.push(e.to_string()),
    }
    report.files_checked.push(model_path);

    tracing::debug!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "Consistency check finished"
    );
    report
}

// ============================================================================
// Tests
// ============================================================================
