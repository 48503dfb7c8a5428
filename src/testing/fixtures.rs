//! Test fixtures for plansync.
//!
//! Provides throwaway project trees (phase documents plus a model file) for
//! consistent testing.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::SyncConfig;

/// A temporary project directory with its configuration.
///
/// Automatically cleaned up when dropped.
pub struct ProjectFixture {
    temp_dir: TempDir,
    config: SyncConfig,
}

impl ProjectFixture {
    /// Create an empty project using `config`.
    ///
    /// # Panics
    ///
    /// Panics if the temp directory cannot be created.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::create_dir_all(config.docs_path(temp_dir.path()))
            .expect("Failed to create docs dir");
        Self { temp_dir, config }
    }

    /// Write a phase document (name relative to the docs directory).
    #[must_use]
    pub fn with_document(self, name: &str, content: &str) -> Self {
        std::fs::write(self.document_path(name), content).expect("Failed to write document");
        self
    }

    /// Write the model file verbatim.
    #[must_use]
    pub fn with_model(self, json: &str) -> Self {
        let path = self.model_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create model dir");
        }
        std::fs::write(path, json).expect("Failed to write model");
        self
    }

    /// Get the project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.config.model_path(self.root())
    }

    #[must_use]
    pub fn document_path(&self, name: &str) -> PathBuf {
        self.config.docs_path(self.root()).join(name)
    }

    /// Read a phase document back.
    #[must_use]
    pub fn read_document(&self, name: &str) -> String {
        std::fs::read_to_string(self.document_path(name)).expect("Failed to read document")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_layout() {
        let fixture = ProjectFixture::new(SyncConfig::default())
            .with_document("a.md", "### ☐ A\n")
            .with_model("{}");

        assert!(fixture.root().join("docs").is_dir());
        assert!(fixture.model_path().is_file());
        assert_eq!(fixture.read_document("a.md"), "### ☐ A\n");
    }
}
