//! CLI settings (JSON file in the user data directory).

use std::fs;
use std::path::{Path, PathBuf};

use aocr_core::config::{ENV_BACKEND, ENV_LIB_FILE};
use serde::{Deserialize, Serialize};

pub const ENV_SETTINGS: &str = "AOCR_SETTINGS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct CliSettings {
    /// Engine library to load in place of the bundled one.
    pub lib_file: Option<String>,
    pub language: String,
    pub speed: String,
    pub pdf_text_visible: bool,
    /// Where PDF output goes. Current directory when unset.
    pub output_dir: Option<PathBuf>,
    pub backend: String,
}

impl Default for CliSettings {
    fn default() -> Self {
        Self {
            lib_file: None,
            language: "eng".into(),
            speed: "fastest".into(),
            pdf_text_visible: true,
            output_dir: None,
            backend: "native".into(),
        }
    }
}

impl CliSettings {
    pub fn normalize(&mut self) {
        self.lib_file = self
            .lib_file
            .as_ref()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty());
        self.language = normalize_language(&self.language);
        self.speed = normalize_speed(&self.speed);
        self.backend = normalize_backend(&self.backend);
        self.output_dir = self
            .output_dir
            .take()
            .filter(|d| !d.as_os_str().is_empty());
    }
}

pub fn normalize_language(raw: &str) -> String {
    let lang = raw.trim().to_ascii_lowercase();
    if lang.is_empty() {
        "eng".into()
    } else {
        lang
    }
}

pub fn normalize_speed(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "fast" => "fast".into(),
        "slow" | "accurate" => "slow".into(),
        _ => "fastest".into(),
    }
}

pub fn normalize_backend(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "stub" | "echo" => "stub".into(),
        _ => "native".into(),
    }
}

/// Export settings as loader environment, leaving variables already set alone.
pub fn apply_runtime_env_from_settings(settings: &CliSettings) {
    if std::env::var_os(ENV_LIB_FILE).is_none() {
        if let Some(file) = settings.lib_file.as_ref() {
            std::env::set_var(ENV_LIB_FILE, file);
        }
    }
    if std::env::var_os(ENV_BACKEND).is_none() {
        std::env::set_var(ENV_BACKEND, &settings.backend);
    }
}

pub fn settings_path() -> PathBuf {
    std::env::var_os(ENV_SETTINGS)
        .map(PathBuf::from)
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(default_settings_path)
}

pub fn default_settings_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aocr")
            .join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
                    .join(".local")
                    .join("share")
            })
            .join("aocr")
            .join("settings.json")
    }
}

/// Missing or unreadable files yield defaults.
pub fn load_settings(path: &Path) -> CliSettings {
    let mut settings = fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<CliSettings>(&raw).ok())
        .unwrap_or_default();
    settings.normalize();
    settings
}
