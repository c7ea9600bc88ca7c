//! Persistent application settings (JSON file in the platform data directory).

use std::fs;
use std::path::{Path, PathBuf};

use handsfree_core::{ControlConfig, HttpRecognizerConfig};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the settings file location.
pub const SETTINGS_PATH_ENV: &str = "HANDSFREE_SETTINGS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognizerKind {
    /// OpenAI-compatible transcription endpoint.
    Http,
    /// Recognises nothing; voice segments are captured and logged only.
    Stub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    pub control: ControlConfig,
    /// Helper process printing one JSON landmark frame per line.
    /// Receives `--camera <index> --width <w> --height <h>` on its command line.
    pub landmark_command: Vec<String>,
    pub recognizer: RecognizerKind,
    /// Used when `recognizer` is `http`. A missing API key falls back to
    /// the `OPENAI_API_KEY` environment variable.
    pub transcription: HttpRecognizerConfig,
    pub preferred_input_device: Option<String>,
    pub voice_enabled_at_start: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            control: ControlConfig::default(),
            landmark_command: vec!["handsfree-landmarks".into()],
            recognizer: RecognizerKind::Http,
            transcription: HttpRecognizerConfig::default(),
            preferred_input_device: None,
            voice_enabled_at_start: true,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        let defaults = Self::default();
        self.control.normalize();
        self.landmark_command = self
            .landmark_command
            .iter()
            .map(|arg| arg.trim().to_string())
            .filter(|arg| !arg.is_empty())
            .collect();
        if self.landmark_command.is_empty() {
            self.landmark_command = defaults.landmark_command;
        }
        let t = &mut self.transcription;
        t.endpoint = t.endpoint.trim().to_string();
        if t.endpoint.is_empty() {
            t.endpoint = defaults.transcription.endpoint;
        }
        t.model = t.model.trim().to_string();
        if t.model.is_empty() {
            t.model = defaults.transcription.model;
        }
        t.language = trimmed(t.language.take()).map(|l| l.to_ascii_lowercase());
        t.api_key = trimmed(t.api_key.take());
        t.timeout_secs = t.timeout_secs.clamp(1, 120);
        self.preferred_input_device = trimmed(self.preferred_input_device.take());
    }

    /// Transcription settings with the API key resolved from the
    /// environment when the file has none.
    pub fn resolved_transcription(&self) -> HttpRecognizerConfig {
        let mut config = self.transcription.clone();
        if config.api_key.is_none() {
            config.api_key = trimmed(std::env::var("OPENAI_API_KEY").ok());
        }
        config
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn default_settings_path() -> PathBuf {
    if let Some(path) = std::env::var_os(SETTINGS_PATH_ENV) {
        return PathBuf::from(path);
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("Library")
            .join("Application Support")
            .join("handsfree")
            .join("settings.json")
    }
    #[cfg(not(target_os = "macos"))]
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
            .join("handsfree")
            .join("settings.json")
    }
}

/// Read and normalise settings. A missing or unreadable file yields the
/// defaults; the bool is `true` when the file did not exist.
pub fn load_settings(path: &Path) -> (AppSettings, bool) {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return (AppSettings::default(), true),
    };
    let mut settings = match serde_json::from_str::<AppSettings>(&raw) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(path = %path.display(), "settings unreadable, using defaults: {e}");
            AppSettings::default()
        }
    };
    settings.normalize();
    (settings, false)
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
