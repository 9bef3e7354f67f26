use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How much history accompanies a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MemoryWindowRepr", into = "MemoryWindowRepr")]
pub enum MemoryWindow {
    /// Only the newest message (stored as `0`).
    LatestOnly,
    /// The entire conversation (stored as `"all"`).
    All,
    /// The newest `n` messages.
    Last(usize),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MemoryWindowRepr {
    Count(i64),
    Keyword(String),
}

impl MemoryWindow {
    /// Trailing slice of `messages` selected by this window.
    pub fn select<T>(self, messages: &[T]) -> &[T] {
        let keep = match self {
            MemoryWindow::All => messages.len(),
            MemoryWindow::LatestOnly | MemoryWindow::Last(0) => 1,
            MemoryWindow::Last(n) => n,
        };
        &messages[messages.len().saturating_sub(keep)..]
    }
}

impl TryFrom<MemoryWindowRepr> for MemoryWindow {
    type Error = String;

    fn try_from(value: MemoryWindowRepr) -> Result<Self, Self::Error> {
        match value {
            MemoryWindowRepr::Count(0) => Ok(MemoryWindow::LatestOnly),
            MemoryWindowRepr::Count(n) if n > 0 => Ok(MemoryWindow::Last(n as usize)),
            MemoryWindowRepr::Count(n) => Err(format!(
                "memory_window must be 0, a positive count, or \"all\" (got {n})"
            )),
            MemoryWindowRepr::Keyword(word) => word.parse(),
        }
    }
}

impl From<MemoryWindow> for MemoryWindowRepr {
    fn from(value: MemoryWindow) -> Self {
        match value {
            MemoryWindow::LatestOnly => MemoryWindowRepr::Count(0),
            MemoryWindow::All => MemoryWindowRepr::Keyword("all".to_string()),
            MemoryWindow::Last(n) => MemoryWindowRepr::Count(n as i64),
        }
    }
}

impl FromStr for MemoryWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "all" => Ok(MemoryWindow::All),
            "latest" => Ok(MemoryWindow::LatestOnly),
            _ => match trimmed.parse::<usize>() {
                Ok(0) => Ok(MemoryWindow::LatestOnly),
                Ok(n) => Ok(MemoryWindow::Last(n)),
                Err(_) => Err(format!(
                    "invalid memory window '{trimmed}' (expected a count, 'latest', or 'all')"
                )),
            },
        }
    }
}

impl fmt::Display for MemoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryWindow::LatestOnly => f.write_str("0 (latest only)"),
            MemoryWindow::All => f.write_str("all"),
            MemoryWindow::Last(n) => write!(f, "{n}"),
        }
    }
}

/// Request shape sent to the inference server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    /// `POST /api/generate` with a flattened `prompt`.
    #[default]
    Generate,
    /// `POST /api/chat` with role-tagged `messages`.
    Chat,
}

impl ApiMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiMode::Generate => "generate",
            ApiMode::Chat => "chat",
        }
    }
}

impl FromStr for ApiMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generate" => Ok(ApiMode::Generate),
            "chat" => Ok(ApiMode::Chat),
            other => Err(format!(
                "invalid api mode '{other}' (expected 'generate' or 'chat')"
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Number of trailing messages sent as context
    pub memory_window: MemoryWindow,
    /// Model used by conversations that have not picked one
    pub default_model: String,
    /// System prompt used by conversations without an override; empty disables it
    pub system_prompt: String,
    /// Ask the server to stream its answer
    pub streaming: bool,
    /// Render assistant replies as markdown (read by front ends only)
    pub markdown: bool,
    /// Play an audio cue when a generation completes
    pub sound: bool,
    /// Base URL of the inference server
    pub base_url: String,
    pub api_mode: ApiMode,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
