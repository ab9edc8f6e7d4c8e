//! Unified path management for siteline files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/siteline/          # Config directory
//! └── config.toml              # Configuration
//!
//! ~/.local/share/siteline/     # Data directory
//! └── store/                   # File backend (one JSON file per key)
//! ```

use std::path::PathBuf;

const APP_NAME: &str = "siteline";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for siteline_core::SitelineError {
    fn from(err: PathError) -> Self {
        siteline_core::SitelineError::io(err.to_string())
    }
}

pub struct SitelinePaths;

impl SitelinePaths {
    /// Returns the siteline configuration directory (e.g. `~/.config/siteline/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the siteline data directory (e.g. `~/.local/share/siteline/`).
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_NAME))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the directory used by the file storage backend.
    pub fn store_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("store"))
    }
}
