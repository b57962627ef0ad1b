// crates/merge-pilot-core/src/runtime/artifacts.rs
// ============================================================================
// Module: Merge Pilot Artifact Layout
// Description: Per-run artifact directory layout and canonical writers.
// Purpose: Flush plans, state, and reports as byte-stable files.
// Dependencies: crate::core::canonical, thiserror
// ============================================================================

//! ## Overview
//! Every run writes into a caller-provided output directory:
//! `plan.json`, `state.json`, and `report.json` as canonical JSON,
//! `report.md` as the human rendering, and per-gate stream files under
//! `items/<item>/gates/<gate>/`. Partial artifacts are still flushed when a
//! run fails or is cancelled.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::core::EncodingError;
use crate::core::GateName;
use crate::core::ItemName;
use crate::core::canonical;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Artifact layout errors.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Filesystem operation failed.
    #[error("artifact io failed at {path}: {reason}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },
    /// Canonical encoding failed.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

// ============================================================================
// SECTION: Artifact Layout
// ============================================================================

/// Artifact directory layout rooted at the caller's output directory.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    /// Output directory root for this run.
    root: PathBuf,
}

impl ArtifactLayout {
    /// Creates a layout rooted at the output directory, creating the root.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Io`] when the root cannot be created.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| ArtifactError::Io {
            path: root.clone(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            root,
        })
    }

    /// Returns the layout root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the canonical consumed plan.
    #[must_use]
    pub fn plan_path(&self) -> PathBuf {
        self.root.join("plan.json")
    }

    /// Path of the canonical execution state snapshot.
    #[must_use]
    pub fn state_path(&self) -> PathBuf {
        self.root.join("state.json")
    }

    /// Path of the canonical report.
    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.root.join("report.json")
    }

    /// Path of the Markdown report rendering.
    #[must_use]
    pub fn report_markdown_path(&self) -> PathBuf {
        self.root.join("report.md")
    }

    /// Directory holding one gate's stream files and matched artifacts.
    #[must_use]
    pub fn gate_dir(&self, item: &ItemName, gate: &GateName) -> PathBuf {
        self.root.join("items").join(item.as_str()).join("gates").join(gate.as_str())
    }

    /// Writes a value as a canonical JSON artifact.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] when encoding or writing fails.
    pub fn write_canonical<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        value: &T,
    ) -> Result<(), ArtifactError> {
        let bytes = canonical::encode(value)?;
        write_bytes(path, &bytes)
    }

    /// Writes a text artifact verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Io`] when writing fails.
    pub fn write_text(&self, path: &Path, text: &str) -> Result<(), ArtifactError> {
        write_bytes(path, text.as_bytes())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Writes bytes, creating parent directories as needed.
fn write_bytes(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| ArtifactError::Io {
            path: parent.to_path_buf(),
            reason: err.to_string(),
        })?;
    }
    fs::write(path, bytes).map_err(|err| ArtifactError::Io {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}
