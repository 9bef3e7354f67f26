use super::data::{path_display, ApiMode, MemoryWindow, Settings};
use super::defaults::{DEFAULT_BASE_URL, DEFAULT_SYSTEM_PROMPT, SETTING_KEYS};
use super::io::ConfigError;
use tempfile::TempDir;

#[test]
fn test_load_nonexistent_settings() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("nonexistent_settings.toml");

    let settings = Settings::load_from_path(&path).expect("Failed to load settings");

    assert_eq!(settings, Settings::default());
    assert_eq!(settings.memory_window, MemoryWindow::Last(20));
    assert_eq!(settings.system_prompt, DEFAULT_SYSTEM_PROMPT);
    assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    assert!(settings.streaming);
    assert!(settings.markdown);
    assert!(!settings.sound);
}

#[test]
fn test_settings_persistence_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("nested").join("settings.toml");

    let mut settings = Settings::default();
    settings.set_value("default-model", "llama3").unwrap();
    settings.set_value("memory-window", "all").unwrap();
    settings.set_value("sound", "on").unwrap();
    settings.set_value("api-mode", "chat").unwrap();
    settings.save_to_path(&path).expect("Failed to save settings");

    let loaded = Settings::load_from_path(&path).expect("Failed to load settings");
    assert_eq!(loaded.default_model, "llama3");
    assert_eq!(loaded.memory_window, MemoryWindow::All);
    assert!(loaded.sound);
    assert_eq!(loaded.api_mode, ApiMode::Chat);

    let mut updated = loaded;
    updated.unset_value("memory-window").unwrap();
    updated.unset_value("default-model").unwrap();
    updated.save_to_path(&path).expect("Failed to save settings");

    let reloaded = Settings::load_from_path(&path).expect("Failed to load settings");
    assert_eq!(reloaded.memory_window, MemoryWindow::Last(20));
    assert!(reloaded.default_model.is_empty());
    assert!(reloaded.sound);
}

#[test]
fn partial_files_fill_in_defaults() {
    let settings: Settings = toml::from_str("memory_window = 0\nsound = true\n").unwrap();
    assert_eq!(settings.memory_window, MemoryWindow::LatestOnly);
    assert!(settings.sound);
    assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    assert_eq!(settings.api_mode, ApiMode::Generate);
}

#[test]
fn memory_window_accepts_counts_and_keywords() {
    let all: Settings = toml::from_str("memory_window = \"all\"").unwrap();
    assert_eq!(all.memory_window, MemoryWindow::All);

    let three: Settings = toml::from_str("memory_window = 3").unwrap();
    assert_eq!(three.memory_window, MemoryWindow::Last(3));

    assert!(toml::from_str::<Settings>("memory_window = -2").is_err());
    assert!(toml::from_str::<Settings>("memory_window = \"lots\"").is_err());

    assert_eq!("latest".parse::<MemoryWindow>(), Ok(MemoryWindow::LatestOnly));
    assert_eq!("0".parse::<MemoryWindow>(), Ok(MemoryWindow::LatestOnly));
    assert_eq!(" 7 ".parse::<MemoryWindow>(), Ok(MemoryWindow::Last(7)));
}

#[test]
fn memory_window_selects_trailing_messages() {
    let messages: Vec<u32> = (1..=10).collect();
    assert_eq!(MemoryWindow::Last(3).select(&messages), &[8, 9, 10]);
    assert_eq!(MemoryWindow::LatestOnly.select(&messages), &[10]);
    assert_eq!(MemoryWindow::All.select(&messages).len(), 10);
    assert_eq!(MemoryWindow::Last(50).select(&messages).len(), 10);

    let empty: Vec<u32> = Vec::new();
    assert!(MemoryWindow::LatestOnly.select(&empty).is_empty());
}

#[test]
fn malformed_settings_report_parse_errors() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("settings.toml");
    std::fs::write(&path, "streaming = \"sometimes\"").unwrap();

    match Settings::load_from_path(&path) {
        Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn unreadable_settings_name_the_path() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    // A directory exists but cannot be read as a file.
    let err = Settings::load_from_path(temp_dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
    let prefix = format!("Failed to read {}: ", path_display(temp_dir.path()));
    assert!(err.to_string().starts_with(&prefix), "{err}");
}

#[test]
fn set_rejects_unknown_keys_and_bad_values() {
    let mut settings = Settings::default();
    assert!(settings.set_value("colour", "blue").is_err());
    assert!(settings.set_value("streaming", "maybe").is_err());
    assert!(settings.set_value("base-url", "localhost:11434").is_err());
    assert!(settings.set_value("api-mode", "completions").is_err());
    assert_eq!(settings, Settings::default());

    for key in SETTING_KEYS {
        settings.unset_value(key).expect("every listed key can be unset");
    }
}

#[test]
fn any_spelling_of_zero_means_latest_only() {
    let mut settings = Settings::default();
    for zero in ["0", "00", " 000 ", "latest"] {
        settings.set_value("memory-window", zero).unwrap();
        assert_eq!(settings.memory_window, MemoryWindow::LatestOnly, "{zero:?}");
    }
    let messages = [1, 2, 3];
    assert_eq!(settings.memory_window.select(&messages), &[3]);
    assert_eq!(MemoryWindow::Last(0).select(&messages), &[3]);

    let saved = toml::to_string(&settings).unwrap();
    let reloaded: Settings = toml::from_str(&saved).unwrap();
    assert_eq!(reloaded.memory_window, MemoryWindow::LatestOnly);
}

#[test]
fn effective_values_fall_back_to_settings() {
    let mut settings = Settings::default();
    settings.default_model = "mistral".to_string();

    assert_eq!(settings.effective_model(""), "mistral");
    assert_eq!(settings.effective_model("llama3"), "llama3");

    assert_eq!(
        settings.effective_system_prompt(Some("Be terse.")),
        Some("Be terse.")
    );
    assert_eq!(
        settings.effective_system_prompt(None),
        Some(DEFAULT_SYSTEM_PROMPT)
    );
    assert_eq!(
        settings.effective_system_prompt(Some("  ")),
        Some(DEFAULT_SYSTEM_PROMPT)
    );

    settings.system_prompt.clear();
    assert_eq!(settings.effective_system_prompt(None), None);
}

#[test]
fn render_all_lists_every_setting() {
    let rendered = Settings::default().render_all();
    for key in SETTING_KEYS {
        assert!(rendered.contains(key), "missing {key} in:\n{rendered}");
    }
    assert!(rendered.contains("default-model: (unset)"));
}
