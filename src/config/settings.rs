//! Bridge settings (resolver limits)
//!
//! Stored as JSON next to the bridge install. Every field is optional in the
//! file; env vars override the file; values are clamped to safe ranges after
//! loading. A broken file never stops the resolver, it just falls back to
//! defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::constants::{app, limits};

/// Clamp ranges for [`BridgeSettings`]
mod bounds {
    pub const ARCHIVES: (usize, usize) = (1, 200);
    pub const TEXT_CHARS: (usize, usize) = (1024, 50_000_000);
    pub const PRESET_DOCUMENTS: (usize, usize) = (1, 256);
    pub const NAMESPACE_SUBSTITUTIONS: (usize, usize) = (0, 16);
    pub const TEMP_FILES: (usize, usize) = (1, 5000);
    pub const SCAN_DEPTH: (usize, usize) = (1, 6);
}

/// Tunable limits for one resolution call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Newest archives examined by the archive scan
    pub max_archives: usize,
    /// Characters kept from any decoded text file
    pub max_text_chars: usize,
    /// Per-filament preset documents read from one archive
    pub max_preset_documents: usize,
    /// Default-namespace declarations stripped from a model part
    pub max_namespace_substitutions: usize,
    /// Config files examined in the slicer temp directory
    pub max_temp_files: usize,
    /// Depth walked below each preset root
    pub preset_scan_depth: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            max_archives: limits::MAX_ARCHIVES,
            max_text_chars: limits::MAX_TEXT_CHARS,
            max_preset_documents: limits::MAX_PRESET_DOCUMENTS,
            max_namespace_substitutions: limits::MAX_NAMESPACE_SUBSTITUTIONS,
            max_temp_files: limits::MAX_TEMP_FILES,
            preset_scan_depth: limits::PRESET_SCAN_DEPTH,
        }
    }
}

impl BridgeSettings {
    /// Default settings file location
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(app::CONFIG_DIR);
        path.push(app::CONFIG_FILENAME);
        path
    }

    /// Load from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load from `path`; missing or broken files yield defaults
    pub fn load_from(path: &Path) -> Self {
        let mut settings = match fs::read_to_string(path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(settings) => {
                    info!(path = %path.display(), "Loaded bridge settings");
                    settings
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to parse settings file, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "No settings file found, using defaults");
                Self::default()
            }
        };

        settings.apply_env_overrides();
        settings.validate_and_clamp();
        settings
    }

    /// Load from a path the user asked for explicitly; unlike [`load_from`],
    /// a missing or broken file is an error
    ///
    /// [`load_from`]: Self::load_from
    pub fn load_explicit(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let mut settings = Self::from_json(&contents)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        settings.apply_env_overrides();
        settings.validate_and_clamp();
        Ok(settings)
    }

    /// Parse settings JSON (unknown keys are ignored, missing keys defaulted)
    pub fn from_json(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse bridge settings JSON")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize bridge settings")?;
        fs::write(path, contents)
            .context(format!("Failed to write settings file to {}", path.display()))?;
        Ok(())
    }

    /// Write default settings to `path` unless a file is already there;
    /// returns whether a file was written
    pub fn init_at(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save_to(path)?;
        info!(path = %path.display(), "Wrote default settings");
        Ok(true)
    }

    fn parse_env(var: &str) -> Option<usize> {
        let raw = env::var(var).ok()?;
        raw.trim()
            .parse()
            .inspect_err(|e| error!(var = %var, error = ?e, "failed to parse env var"))
            .ok()
    }

    fn apply_env_overrides(&mut self) {
        if let Some(max_archives) = Self::parse_env("SLICER_BRIDGE_MAX_ARCHIVES") {
            self.max_archives = max_archives;
        }
        if let Some(max_text_chars) = Self::parse_env("SLICER_BRIDGE_MAX_TEXT_CHARS") {
            self.max_text_chars = max_text_chars;
        }
    }

    /// Clamp every limit into its supported range
    pub fn validate_and_clamp(&mut self) {
        clamp_field("max_archives", &mut self.max_archives, bounds::ARCHIVES);
        clamp_field("max_text_chars", &mut self.max_text_chars, bounds::TEXT_CHARS);
        clamp_field("max_preset_documents", &mut self.max_preset_documents, bounds::PRESET_DOCUMENTS);
        clamp_field(
            "max_namespace_substitutions",
            &mut self.max_namespace_substitutions,
            bounds::NAMESPACE_SUBSTITUTIONS,
        );
        clamp_field("max_temp_files", &mut self.max_temp_files, bounds::TEMP_FILES);
        clamp_field("preset_scan_depth", &mut self.preset_scan_depth, bounds::SCAN_DEPTH);
    }
}

fn clamp_field(field: &str, value: &mut usize, (min, max): (usize, usize)) {
    if *value < min {
        warn!(field, value = *value, min, "setting below minimum, clamping");
        *value = min;
    } else if *value > max {
        warn!(field, value = *value, max, "setting exceeds maximum, clamping");
        *value = max;
    }
}
