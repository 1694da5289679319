// Application settings
// Loaded from ~/.config/landforge/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Background flush tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveSettings {
    /// Inactivity window (ms) before a changed document is written
    pub debounce_ms: u64,

    /// Distinct pending documents that force an immediate flush of all
    pub pending_threshold: usize,

    /// Maximum simultaneous flushes across documents
    pub max_parallel_flushes: usize,

    /// Consecutive failed writes before a persistent warning
    pub retry_warn_threshold: u32,
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 2000,
            pending_threshold: 50,
            max_parallel_flushes: 16,
            retry_warn_threshold: 5,
        }
    }
}

/// Undo/redo history tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Maximum retained history entries; older entries are absorbed into
    /// the working base
    pub capacity: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self { capacity: 50 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub autosave: AutosaveSettings,
    pub history: HistorySettings,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("landforge");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults.
    /// Never fails: a missing or unreadable file means defaults.
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("Error parsing settings.json: {}", e);
                    eprintln!("Using default settings");
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading settings.json: {}", e);
                Self::default()
            }
        }
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_path();

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        fs::write(&path, json).map_err(|e| e.to_string())
    }
}
