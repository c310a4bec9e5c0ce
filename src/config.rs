//! Application configuration
//!
//! Stored as pretty JSON at `<config dir>/runbook-gen/config.json`. A missing
//! file means defaults; nothing is written until the user saves.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::llm::LlmConfig;
use crate::processor::{PatternSpec, Workflow};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub processing: ProcessingConfig,
    pub llm: LlmConfig,
}

/// Tuning for the local pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Repeats further apart than this are kept
    pub dedup_time_gap_secs: u64,
    /// Pause that starts a new runbook step
    pub group_time_gap_secs: u64,
    pub strict_redaction: bool,
    pub ai_timeout_secs: u64,
    /// Extra redaction rules, applied after the built-in ones
    pub custom_patterns: Vec<PatternSpec>,
    /// Extra workflows, matched after the built-in ones
    pub custom_workflows: Vec<Workflow>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            dedup_time_gap_secs: 30,
            group_time_gap_secs: 60,
            strict_redaction: false,
            ai_timeout_secs: 60,
            custom_patterns: Vec::new(),
            custom_workflows: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        write_private(path, content.as_bytes())
            .with_context(|| format!("Failed to write config file {}", path.display()))?;

        tracing::debug!(path = %path.display(), "saved config");
        Ok(())
    }

    pub fn config_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| anyhow!("Cannot determine config directory"))?;
        Ok(config_dir.join("runbook-gen").join("config.json"))
    }
}

/// Write a file readable only by its owner
pub fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults_without_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runbook-gen").join("config.json");

        let config = AppConfig::load_from(&path).unwrap();

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.processing.dedup_time_gap_secs, 30);
        assert_eq!(config.processing.group_time_gap_secs, 60);
        assert_eq!(config.processing.ai_timeout_secs, 60);
        assert!(!path.exists());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.processing.strict_redaction = true;
        config.processing.custom_workflows.push(Workflow::new(
            "release",
            &["make release"],
            "Cut a release",
        ));
        config.llm.set_api_key("claude", "sk-ant-test".to_string());
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        AppConfig::default().save_to(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"processing": {"group_time_gap_secs": 120, "custom_patterns": [{"name": "itk", "matcher": "itk_[a-z0-9]+", "replacement": "<REDACTED>"}]}}"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.processing.group_time_gap_secs, 120);
        assert_eq!(config.processing.dedup_time_gap_secs, 30);
        assert_eq!(config.processing.custom_patterns[0].name, "itk");
        assert!(config.llm.providers.is_empty());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }
}
