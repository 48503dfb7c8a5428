//! Loading and saving the authoritative model.
//!
//! Loading is strict: a missing or malformed file is an error and the caller
//! must stop before mutating anything. Saving replaces the file atomically
//! (temp file in the same directory, then rename) so an interrupted write
//! leaves the previous contents intact.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use super::ProjectModel;
use crate::error::{Result, SyncError};

fn read_model_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            SyncError::ModelMissing {
                path: path.to_path_buf(),
            }
        } else {
            SyncError::ModelRead {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

/// Load the model from `path`.
///
/// # Errors
///
/// [`SyncError::ModelMissing`] if the file does not exist,
/// [`SyncError::ModelRead`] if it cannot be read, and
/// [`SyncError::ModelParse`] if it is not a valid model.
pub fn load_model(path: &Path) -> Result<ProjectModel> {
    let json = read_model_text(path)?;
    let model = serde_json::from_str(&json).map_err(|source| SyncError::ModelParse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "Loaded authoritative model");
    Ok(model)
}

/// Load the model as untyped JSON, for structural checks.
///
/// # Errors
///
/// Same as [`load_model`].
pub fn load_model_value(path: &Path) -> Result<serde_json::Value> {
    let json = read_model_text(path)?;
    serde_json::from_str(&json).map_err(|source| SyncError::ModelParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically write `data` to `path`.
///
/// # Errors
///
/// Returns an IO error if the temp file cannot be created, written or renamed.
pub fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Serialize the model (2-space indent, UTF-8, trailing newline) and write it.
///
/// # Errors
///
/// [`SyncError::ModelWrite`] if serialization or the write fails.
pub fn save_model(path: &Path, model: &ProjectModel) -> Result<()> {
    let mut json = serde_json::to_string_pretty(model).map_err(|e| SyncError::ModelWrite {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    json.push('\n');

    atomic_write(path, json.as_bytes()).map_err(|e| SyncError::ModelWrite {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    tracing::debug!(path = %path.display(), "Saved authoritative model");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
