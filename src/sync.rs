//! Markdown → authoritative model merge.
//!
//! A run loads the model (fatal on failure), folds every phase document into
//! it, recomputes all derived figures and writes the model back exactly once.
//! Nothing is written if loading fails, and a missing phase document leaves
//! that phase's stored tasks alone.

use std::path::Path;

use chrono::Utc;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::model::{load_model, save_model, PhaseDetail, ProjectModel};
use crate::tasks::{format_percentage, overall_progress, parse_file, PhaseProgress, TaskRecord};

/// What happened to one phase during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Tasks replaced with this many parsed tasks
    Replaced(usize),
    /// Document unavailable; stored tasks kept
    Kept,
    /// Phase has no configured document
    Unmapped,
}

/// Summary of a sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Phases appended because the model lacked them
    pub created: Vec<String>,
    /// `(phase, outcome)` in `phaseDetails` order
    pub phases: Vec<(String, PhaseOutcome)>,
    pub warnings: Vec<String>,
    /// Overall weighted progress after the merge
    pub overall_progress: f64,
    /// Whether the model was written
    pub written: bool,
}

impl SyncReport {
    /// Phases whose tasks were replaced.
    #[must_use]
    pub fn updated_count(&self) -> usize {
        self.phases
            .iter()
            .filter(|(_, o)| matches!(o, PhaseOutcome::Replaced(_)))
            .count()
    }
}

/// Folds parsed documents into a [`ProjectModel`].
///
/// All timestamps stamped during one merge are identical.
#[derive(Debug, Clone)]
pub struct Merger<'a> {
    config: &'a SyncConfig,
    now: String,
}

impl<'a> Merger<'a> {
    #[must_use]
    pub fn new(config: &'a SyncConfig) -> Self {
        Self {
            config,
            now: Utc::now().to_rfc3339(),
        }
    }

    /// Use a fixed timestamp instead of the current time.
    #[must_use]
    pub fn with_timestamp(mut self, now: impl Into<String>) -> Self {
        self.now = now.into();
        self
    }

    /// Append every configured phase the model lacks, in config order.
    ///
    /// Returns the names of the phases created.
    pub fn ensure_phases(&self, model: &mut ProjectModel) -> Vec<String> {
        let mut created = Vec::new();
        for mapping in &self.config.phases {
            if model.phase(&mapping.name).is_some() {
                continue;
            }
            let mut detail = PhaseDetail::new(&mapping.name, format!("./{}", mapping.document));
            detail.last_synced = Some(self.now.clone());
            model.phase_details.push(detail);
            tracing::info!(phase = %mapping.name, "Added missing phase to model");
            created.push(mapping.name.clone());
        }
        created
    }

    /// Merge one phase.
    ///
    /// `Some(tasks)` replaces the phase's tasks wholesale; `None` means the
    /// document was unavailable and the stored tasks stay as they are.
    pub fn merge_phase(
        &self,
        detail: &mut PhaseDetail,
        parsed: Option<Vec<TaskRecord>>,
    ) -> PhaseOutcome {
        match parsed {
            Some(mut tasks) => {
                for task in &mut tasks {
                    task.extracted_at = Some(self.now.clone());
                }
                let count = tasks.len();
                detail.tasks = tasks;
                detail.last_synced = Some(self.now.clone());
                PhaseOutcome::Replaced(count)
            }
            None => PhaseOutcome::Kept,
        }
    }

    /// Recompute every derived figure and stamp `lastUpdated`.
    ///
    /// Returns the overall progress.
    pub fn finalize(&self, model: &mut ProjectModel) -> f64 {
        for detail in &mut model.phase_details {
            detail.progress = Some(PhaseProgress::from_tasks(&detail.tasks));
        }
        let overall = overall_progress(&model.modules, &self.config.modules);
        model.overall_progress = Some(format_percentage(overall));
        model.last_updated = Some(self.now.clone());
        overall
    }

    /// Run a full merge of the project's phase documents into `model`.
    pub fn merge(&self, model: &mut ProjectModel, project_root: &Path) -> SyncReport {
        let mut report = SyncReport {
            created: self.ensure_phases(model),
            ..SyncReport::default()
        };

        for detail in &mut model.phase_details {
            let Some(mapping) = self.config.phase(&detail.phase) else {
                tracing::debug!(phase = %detail.phase, "Phase has no configured document");
                report.phases.push((detail.phase.clone(), PhaseOutcome::Unmapped));
                continue;
            };

            let document = parse_file(
                &self.config.document_path(project_root, mapping),
                &self.config.parser,
            );
            let parsed = match document.warning {
                Some(warning) => {
                    report.warnings.push(warning);
                    None
                }
                None => Some(document.tasks),
            };

            let outcome = self.merge_phase(detail, parsed);
            if let PhaseOutcome::Replaced(count) = outcome {
                tracing::info!(phase = %detail.phase, tasks = count, "Synchronized phase");
            }
            report.phases.push((detail.phase.clone(), outcome));
        }

        report.overall_progress = self.finalize(model);
        report
    }
}

/// Load the model, merge every phase document into it and write it back.
///
/// With `dry_run` the merge runs in memory only.
///
/// # Errors
///
/// Fails only if the model cannot be loaded or written. On a load failure
/// nothing is touched.
pub fn sync_from_markdown(
    config: &SyncConfig,
    project_root: &Path,
    dry_run: bool,
) -> Result<(ProjectModel, SyncReport)> {
    let model_path = config.model_path(project_root);
    let mut model = load_model(&model_path)?;

    let merger = Merger::new(config);
    let mut report = merger.merge(&mut model, project_root);

    if dry_run {
        tracing::info!("Dry run: model not written");
    } else {
        save_model(&model_path, &model)?;
        report.written = true;
    }
    Ok((model, report))
}

// ============================================================================
// Tests
// ============================================================================
