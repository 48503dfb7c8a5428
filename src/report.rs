//! Plain-text progress summary of a model.

use crate::model::ProjectModel;
use crate::tasks::{format_percentage, PhaseProgress};

/// Longest module description shown before it is cut.
pub const DESCRIPTION_WIDTH: usize = 50;

fn shorten(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let mut short: String = text.chars().take(width).collect();
        short.push_str("...");
        short
    } else {
        text.to_string()
    }
}

/// Render the summary: overall progress, then modules, then phases.
///
/// Phase figures are computed from the tasks, not read from the stored
/// `progress`.
#[must_use]
pub fn render_summary(model: &ProjectModel) -> String {
    let rule = "=".repeat(50);
    let mut lines = vec![
        "Project progress summary".to_string(),
        rule.clone(),
        format!(
            "Overall progress: {}",
            model.overall_progress.as_deref().unwrap_or("0.0%")
        ),
        String::new(),
        "Modules:".to_string(),
    ];

    for module in &model.modules {
        lines.push(format!(
            "  • {}: {} - {}",
            module.name,
            module.status,
            shorten(&module.description, DESCRIPTION_WIDTH)
        ));
    }

    lines.push(String::new());
    lines.push("Phases:".to_string());
    for detail in &model.phase_details {
        let progress = PhaseProgress::from_tasks(&detail.tasks);
        lines.push(format!(
            "  • {}: {} ({}/{} tasks done)",
            detail.phase,
            format_percentage(progress.percentage),
            progress.completed,
            progress.total
        ));
    }

    lines.push(rule);
    lines.join("\n")
}
