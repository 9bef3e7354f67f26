use std::fs;
use std::path::{Path, PathBuf};

use crate::core::collaborators::Persistence;
use crate::core::config::io::{project_dirs, write_atomically};
use crate::core::config::{ConfigError, Settings};
use crate::core::conversation::Conversation;

/// Conversations as pretty JSON under the data dir, settings as TOML
/// under the config dir.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    conversations_path: PathBuf,
    settings_path: PathBuf,
}

impl FilePersistence {
    pub fn new(conversations_path: PathBuf, settings_path: PathBuf) -> Self {
        Self {
            conversations_path,
            settings_path,
        }
    }

    /// Platform locations (`ProjectDirs`).
    pub fn from_project_dirs() -> Result<Self, ConfigError> {
        let dirs = project_dirs()?;
        Ok(Self::new(
            dirs.data_dir().join("conversations.json"),
            dirs.config_dir().join("settings.toml"),
        ))
    }

    /// Both files inside one directory; handy for tests and portable setups.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("conversations.json"), dir.join("settings.toml"))
    }

    pub fn conversations_path(&self) -> &Path {
        &self.conversations_path
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }
}

impl Persistence for FilePersistence {
    fn load_conversations(&self) -> Result<Vec<Conversation>, ConfigError> {
        let path = &self.conversations_path;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents).map_err(|err| ConfigError::Parse {
            path: path.clone(),
            message: err.to_string(),
        })
    }

    fn save_conversations(&self, conversations: &[Conversation]) -> Result<(), ConfigError> {
        let contents =
            serde_json::to_vec_pretty(conversations).map_err(|err| ConfigError::Write {
                path: self.conversations_path.clone(),
                message: err.to_string(),
            })?;
        write_atomically(&self.conversations_path, &contents)
    }

    fn load_settings(&self) -> Result<Settings, ConfigError> {
        Settings::load_from_path(&self.settings_path)
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), ConfigError> {
        settings.save_to_path(&self.settings_path)
    }
}
