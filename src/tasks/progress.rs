//! Progress roll-ups.
//!
//! Per phase, in-progress work earns half credit:
//! `percentage = (completed + 0.5 * inProgress) / total * 100`.
//! Overall progress is a weighted sum of the percentages modules report about
//! themselves in their free-text `status` field.
//!
//! All percentages are rounded to one decimal, half away from zero
//! (`6.25 -> 6.3`, `-0.05 -> -0.1`).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{TaskRecord, TaskStatus};
use crate::config::ModuleWeight;
use crate::model::Module;

static PERCENTAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").expect("valid percentage regex"));

/// Round to one decimal place, half away from zero.
///
/// # Example
///
/// ```
/// use plansync::tasks::round_one_decimal;
///
/// assert_eq!(round_one_decimal(62.5), 62.5);
/// assert_eq!(round_one_decimal(6.25), 6.3);
/// assert_eq!(round_one_decimal(33.333), 33.3);
/// ```
#[must_use]
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Render a percentage the way the model stores it: `"62.5%"`.
#[must_use]
pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value)
}

// ============================================================================
// Phase Progress
// ============================================================================

/// Progress of one phase, derived from its task list.
///
/// Recomputed on every sync; a stored value is never used as input.
///
/// # Example
///
/// ```
/// use plansync::tasks::{PhaseProgress, TaskRecord, TaskStatus};
///
/// let tasks = vec![
///     TaskRecord::new("a", TaskStatus::Done),
///     TaskRecord::new("b", TaskStatus::Done),
///     TaskRecord::new("c", TaskStatus::InProgress),
///     TaskRecord::new("d", TaskStatus::NotStarted),
/// ];
/// let progress = PhaseProgress::from_tasks(&tasks);
/// assert_eq!(progress.percentage, 62.5);
/// assert_eq!(progress.pending, 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseProgress {
    #[serde(default)]
    pub completed: usize,
    #[serde(default)]
    pub in_progress: usize,
    /// Not started and paused tasks
    #[serde(default)]
    pub pending: usize,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub percentage: f64,
}

impl PhaseProgress {
    /// Compute progress for a task list.
    #[must_use]
    pub fn from_tasks(tasks: &[TaskRecord]) -> Self {
        let total = tasks.len();
        let completed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count();
        let in_progress = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .count();

        Self {
            completed,
            in_progress,
            pending: total - completed - in_progress,
            total,
            percentage: weighted_percentage(completed, in_progress, total),
        }
    }

    /// Whether the counts add up.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.completed + self.in_progress + self.pending == self.total
    }
}

/// Half-credit completion percentage; zero when there are no tasks.
#[must_use]
pub fn weighted_percentage(completed: usize, in_progress: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let earned = completed as f64 + 0.5 * in_progress as f64;
    round_one_decimal(earned / total as f64 * 100.0)
}

// ============================================================================
// Overall Progress
// ============================================================================

/// Extract the number immediately preceding a `%` sign.
///
/// # Example
///
/// ```
/// use plansync::tasks::extract_percentage;
///
/// assert_eq!(extract_percentage("42% done"), Some(42.0));
/// assert_eq!(extract_percentage("roughly 12.5%"), Some(12.5));
/// assert_eq!(extract_percentage("not started"), None);
/// ```
#[must_use]
pub fn extract_percentage(status: &str) -> Option<f64> {
    PERCENTAGE
        .captures(status)
        .and_then(|caps| caps[1].parse::<f64>().ok())
}

/// Weighted overall progress across modules.
///
/// Modules whose name is not in `weights` contribute nothing; a module whose
/// status carries no percentage contributes zero.
#[must_use]
pub fn overall_progress(modules: &[Module], weights: &[ModuleWeight]) -> f64 {
    let total: f64 = modules
        .iter()
        .filter_map(|module| {
            let weight = weights.iter().find(|w| w.name == module.name)?;
            let percentage = extract_percentage(&module.status).unwrap_or(0.0);
            Some(weight.weight * percentage)
        })
        .sum();
    round_one_decimal(total)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks(statuses: &[TaskStatus]) -> Vec<TaskRecord> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, s)| TaskRecord::new(format!("task {}", i), *s))
            .collect()
    }

    fn module(name: &str, status: &str) -> Module {
        Module {
            name: name.to_string(),
            status: status.to_string(),
            ..Module::default()
        }
    }

    fn weight(name: &str, weight: f64) -> ModuleWeight {
        ModuleWeight {
            name: name.to_string(),
            weight,
        }
    }

    #[test]
    fn test_half_credit_formula() {
        use TaskStatus::*;
        let progress = PhaseProgress::from_tasks(&tasks(&[Done, Done, InProgress, NotStarted]));
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.in_progress, 1);
        assert_eq!(progress.pending, 1);
        assert_eq!(progress.total, 4);
        assert_eq!(progress.percentage, 62.5);
        assert!(progress.is_consistent());
    }

    #[test]
    fn test_zero_tasks_is_zero_percent() {
        let progress = PhaseProgress::from_tasks(&[]);
        assert_eq!(progress.total, 0);
        assert_eq!(progress.percentage, 0.0);
        assert!(progress.is_consistent());
    }

    #[test]
    fn test_paused_counts_as_pending() {
        use TaskStatus::*;
        let progress = PhaseProgress::from_tasks(&tasks(&[Paused, Paused, Done]));
        assert_eq!(progress.pending, 2);
        assert_eq!(progress.percentage, 33.3);
    }

    #[test]
    fn test_rounding_is_half_away_from_zero() {
        use TaskStatus::*;
        // 1 / 16 = 6.25% exactly
        let mut statuses = vec![Done];
        statuses.extend(std::iter::repeat(NotStarted).take(15));
        let progress = PhaseProgress::from_tasks(&tasks(&statuses));
        assert_eq!(progress.percentage, 6.3);

        assert_eq!(round_one_decimal(0.05), 0.1);
        assert_eq!(round_one_decimal(-0.05), -0.1);
    }

    #[test]
    fn test_two_thirds() {
        assert_eq!(weighted_percentage(2, 0, 3), 66.7);
        assert_eq!(weighted_percentage(0, 1, 3), 16.7);
    }

    #[test]
    fn test_extract_percentage_variants() {
        assert_eq!(extract_percentage("85%"), Some(85.0));
        assert_eq!(extract_percentage("进度 40% 完成"), Some(40.0));
        assert_eq!(extract_percentage("40 %"), None);
        assert_eq!(extract_percentage(""), None);
    }

    #[test]
    fn test_overall_progress_weighted_sum() {
        let modules = vec![module("frontend", "40%"), module("backend", "60%")];
        let weights = vec![
            weight("frontend", 0.30),
            weight("backend", 0.30),
            weight("shared", 0.40),
        ];
        assert_eq!(overall_progress(&modules, &weights), 30.0);
    }

    #[test]
    fn test_overall_progress_ignores_unknown_and_unparseable() {
        let modules = vec![
            module("frontend", "in flight"),
            module("mystery", "100%"),
            module("backend", "50% done"),
        ];
        let weights = vec![weight("frontend", 0.5), weight("backend", 0.5)];
        assert_eq!(overall_progress(&modules, &weights), 25.0);
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(30.0), "30.0%");
        assert_eq!(format_percentage(62.5), "62.5%");
        assert_eq!(format_percentage(0.0), "0.0%");
    }
}
