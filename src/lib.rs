//! plansync - keep phase documents, the project model and issues in step
//!
//! A project plan lives in three places: human-edited Markdown phase
//! documents, a structured JSON model (`project-plan-structured.json`) and
//! an issue tracker with one issue per task. This crate extracts tasks from
//! the documents, rolls them up into progress figures, merges them into the
//! model and reconciles task status with the tracker in both directions.
//!
//! # Architecture
//!
//! - [`tasks`] - task parsing, status normalization and progress roll-ups
//! - [`model`] - the authoritative model and its persistence
//! - [`sync`] - merging parsed documents into the model
//! - [`tracker`] - the issue tracker seam and its `gh` implementation
//! - [`reconcile`] - documents ↔ issues reconciliation
//! - [`issues`] - publishing model tasks as issues
//! - [`report`] - plain-text progress summary
//! - [`config`] - layered configuration and consistency checks
//! - [`error`] - error types
//! - [`testing`] - test doubles (mock tracker, fixtures)
//!
//! # Example
//!
//! ```rust,ignore
//! use plansync::config::ConfigLoader;
//! use plansync::sync::sync_from_markdown;
//! use std::path::Path;
//!
//! let root = Path::new(".");
//! let (config, _sources) = ConfigLoader::new().load(root)?;
//! let (model, report) = sync_from_markdown(&config, root, false)?;
//! println!("overall progress: {}", model.overall_progress.unwrap_or_default());
//! ```

pub mod config;
pub mod error;
pub mod issues;
pub mod model;
pub mod reconcile;
pub mod report;
pub mod sync;
pub mod tasks;
pub mod testing;
pub mod tracker;

// Re-export commonly used types
pub use error::{IntoSyncError, Result, SyncError};

pub use config::{
    validate_consistency, ConfigLoader, ConsistencyReport, ModuleWeight, PhaseMapping, SyncConfig,
};
pub use issues::{IssuePublisher, Priority, PublishReport};
pub use model::{load_model, save_model, Module, PhaseDetail, ProjectModel};
pub use reconcile::{retarget_marker, Direction, ReconcileReport, Reconciler};
pub use sync::{sync_from_markdown, Merger, SyncReport};
pub use tasks::{parse_document, parse_file, PhaseProgress, TaskRecord, TaskStatus};
pub use tracker::{GhCliTracker, IssueRef, IssueState, IssueTracker, StateFilter};

pub use testing::MockIssueTracker;
