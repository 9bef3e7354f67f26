use crate::core::config::data::{path_display, Settings};
use directories::ProjectDirs;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors that can occur when reading or writing files under the config and
/// data directories.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No home directory could be determined for this platform.
    #[error("Could not determine a configuration directory for this platform")]
    NoProjectDirs,

    /// Failed to read a file from disk.
    #[error("Failed to read {}: {source}", path_display(.path))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a file's contents.
    #[error("Failed to parse {}: {message}", path_display(.path))]
    Parse { path: PathBuf, message: String },

    /// Failed to serialize or write a file.
    #[error("Failed to write {}: {message}", path_display(.path))]
    Write { path: PathBuf, message: String },
}

pub(crate) fn project_dirs() -> Result<ProjectDirs, ConfigError> {
    ProjectDirs::from("org", "causette", "causette").ok_or(ConfigError::NoProjectDirs)
}

/// Write `contents` to `path` atomically (temp file in the same directory,
/// then rename).
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), ConfigError> {
    let write_err = |message: String| ConfigError::Write {
        path: path.to_path_buf(),
        message,
    };

    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir).map_err(|e| write_err(e.to_string()))?;
    }

    let mut temp_file = match parent {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
    .map_err(|e| write_err(e.to_string()))?;

    temp_file
        .write_all(contents)
        .map_err(|e| write_err(e.to_string()))?;
    temp_file
        .as_file_mut()
        .sync_all()
        .map_err(|e| write_err(e.to_string()))?;
    temp_file
        .persist(path)
        .map_err(|e| write_err(e.to_string()))?;
    Ok(())
}

impl Settings {
    pub fn load_from_path(path: &Path) -> Result<Settings, ConfigError> {
        if !path.exists() {
            return Ok(Settings::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self).map_err(|err| ConfigError::Write {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        write_atomically(path, contents.as_bytes())
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(project_dirs()?.config_dir().join("settings.toml"))
    }

    pub fn load() -> Result<Settings, ConfigError> {
        Self::load_from_path(&Self::default_path()?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::default_path()?)
    }
}
