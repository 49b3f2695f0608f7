//! Session path configuration.
//!
//! A session needs three filesystem paths: the compiled story artifact, the
//! default bookmark shipped with the game, and the player's save file. The
//! artifacts themselves are opaque to this layer — produced and consumed
//! exclusively by the story engine — so this module only manages path
//! resolution and existence checks.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RuntimeResult;

/// Resolved absolute paths for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    /// The compiled story artifact.
    pub story: PathBuf,
    /// The default bookmark to fall back to when no save exists.
    pub bookmark: PathBuf,
    /// The player's save file.
    pub save: PathBuf,
    /// Where generated constants should be written, if anywhere.
    pub codegen: Option<PathBuf>,
}

impl SessionPaths {
    /// Create session paths with no codegen target.
    pub fn new(
        story: impl Into<PathBuf>,
        bookmark: impl Into<PathBuf>,
        save: impl Into<PathBuf>,
    ) -> Self {
        Self {
            story: story.into(),
            bookmark: bookmark.into(),
            save: save.into(),
            codegen: None,
        }
    }

    /// Set the codegen target.
    pub fn with_codegen(mut self, path: impl Into<PathBuf>) -> Self {
        self.codegen = Some(path.into());
        self
    }
}

/// Persistent settings holding paths relative to host-defined base
/// directories.
///
/// The story and default bookmark live under the host's data directory
/// (shipped assets); the save file lives under its persistent directory
/// (player state survives reinstalls).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Compiled story path, relative to the data directory.
    pub story_path: String,
    /// Default bookmark path, relative to the data directory.
    pub bookmark_path: String,
    /// Save file path, relative to the persistent directory.
    pub save_path: String,
    /// Generated-constants path, relative to the data directory.
    pub codegen_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            story_path: "kataru/story.json".to_string(),
            bookmark_path: "kataru/bookmark.json".to_string(),
            save_path: "kataru/save.json".to_string(),
            codegen_path: None,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> RuntimeResult<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Save settings as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> RuntimeResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Resolve relative paths against the host's base directories.
    pub fn resolve(&self, data_dir: &Path, persistent_dir: &Path) -> SessionPaths {
        let mut paths = SessionPaths::new(
            data_dir.join(&self.story_path),
            data_dir.join(&self.bookmark_path),
            persistent_dir.join(&self.save_path),
        );
        if let Some(codegen) = &self.codegen_path {
            paths = paths.with_codegen(data_dir.join(codegen));
        }
        paths
    }
}
