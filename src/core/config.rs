//! Configuration management for Phasekit.
//!
//! Handles loading and saving tool configuration from TOML files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Local config filename, looked up in the project root.
pub const LOCAL_CONFIG_FILE: &str = ".phasekit.toml";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Version-control settings
    pub git: GitConfig,

    /// Milestone archival settings
    pub milestone: MilestoneConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Planning directory, relative to the project root
    pub planning_dir: String,
}

/// Version-control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Timeout for each git invocation, in seconds
    pub timeout_secs: u64,

    /// Prefix for milestone tags (`{prefix}/{version}`)
    pub tag_prefix: String,

    /// Tag written into pause stash messages (`{tag}:pause -- ...`)
    pub stash_tag: String,
}

/// Milestone archival settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MilestoneConfig {
    /// Whether to deep-copy the phases directory on archive
    pub archive_phases: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { planning_dir: ".planning".to_string() }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self { timeout_secs: 30, tag_prefix: "milestone".to_string(), stash_tag: "mz".to_string() }
    }
}

impl Default for MilestoneConfig {
    fn default() -> Self {
        Self { archive_phases: true }
    }
}

impl Config {
    /// Load configuration for a project root.
    ///
    /// Looks for config in:
    /// 1. `.phasekit.toml` in `root`
    /// 2. `~/.config/phasekit/config.toml`
    /// 3. Falls back to defaults
    pub fn load(root: &Path) -> anyhow::Result<Self> {
        let local_config = root.join(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config at {}: {e}", path.display()))?;
        tracing::debug!(path = ?path, "Loaded config");
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the global config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("phasekit"))
    }

    /// Resolve the planning directory for a project root.
    pub fn planning_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.general.planning_dir)
    }

    /// Timeout applied to each git invocation.
    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.planning_dir, ".planning");
        assert_eq!(config.git.timeout_secs, 30);
        assert_eq!(config.git.tag_prefix, "milestone");
        assert!(config.milestone.archive_phases);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str("[git]\ntimeout_secs = 5\n").unwrap();
        assert_eq!(config.git.timeout_secs, 5);
        assert_eq!(config.git.stash_tag, "mz");
        assert_eq!(config.general.planning_dir, ".planning");
    }

    #[test]
    fn test_load_prefers_local_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(LOCAL_CONFIG_FILE),
            "[general]\nplanning_dir = \"plans\"\n",
        )
        .unwrap();

        let config = Config::load(temp.path()).unwrap();
        assert_eq!(config.planning_dir(temp.path()), temp.path().join("plans"));
    }

    #[test]
    fn test_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.milestone.archive_phases = false;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert!(!loaded.milestone.archive_phases);
    }

    #[test]
    fn test_invalid_toml_names_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "[git\n").unwrap();

        let err = Config::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
