use crate::core::config::data::{ApiMode, MemoryWindow, Settings};
use crate::utils::url::parse_base_url;

pub const DEFAULT_MEMORY_WINDOW: usize = 20;
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful, friendly assistant. Provide concise and accurate responses.";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

impl Default for Settings {
    fn default() -> Self {
        Self {
            memory_window: MemoryWindow::Last(DEFAULT_MEMORY_WINDOW),
            default_model: String::new(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            streaming: true,
            markdown: true,
            sound: false,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_mode: ApiMode::default(),
        }
    }
}

/// Keys accepted by `causette set` / `causette unset`.
pub const SETTING_KEYS: &[&str] = &[
    "memory-window",
    "default-model",
    "system-prompt",
    "streaming",
    "markdown",
    "sound",
    "base-url",
    "api-mode",
];

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected on/off, got '{other}'")),
    }
}

impl Settings {
    /// Apply `causette set <key> <value>`.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "memory-window" => self.memory_window = value.parse()?,
            "default-model" => self.default_model = value.trim().to_string(),
            "system-prompt" => self.system_prompt = value.to_string(),
            "streaming" => self.streaming = parse_bool(value)?,
            "markdown" => self.markdown = parse_bool(value)?,
            "sound" => self.sound = parse_bool(value)?,
            "base-url" => self.base_url = parse_base_url(value)?,
            "api-mode" => self.api_mode = value.parse()?,
            _ => return Err(format!("unknown setting '{key}'")),
        }
        Ok(())
    }

    /// Apply `causette unset <key>`, restoring the default.
    pub fn unset_value(&mut self, key: &str) -> Result<(), String> {
        let defaults = Settings::default();
        match key {
            "memory-window" => self.memory_window = defaults.memory_window,
            "default-model" => self.default_model = defaults.default_model,
            "system-prompt" => self.system_prompt = defaults.system_prompt,
            "streaming" => self.streaming = defaults.streaming,
            "markdown" => self.markdown = defaults.markdown,
            "sound" => self.sound = defaults.sound,
            "base-url" => self.base_url = defaults.base_url,
            "api-mode" => self.api_mode = defaults.api_mode,
            _ => return Err(format!("unknown setting '{key}'")),
        }
        Ok(())
    }

    /// Model for a conversation, falling back to the default model.
    pub fn effective_model<'a>(&'a self, conversation_model: &'a str) -> &'a str {
        if conversation_model.trim().is_empty() {
            &self.default_model
        } else {
            conversation_model
        }
    }

    /// System prompt for a conversation; `None` when both sources are empty.
    pub fn effective_system_prompt<'a>(&'a self, conversation_prompt: Option<&'a str>) -> Option<&'a str> {
        conversation_prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .or(Some(self.system_prompt.as_str()))
            .filter(|prompt| !prompt.trim().is_empty())
    }
}
