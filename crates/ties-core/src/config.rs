use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::policy::VisibilityPolicy;

/// Directory holding the store, journal, and config of a project.
pub const PROJECT_DIR: &str = ".ties";

/// Config file name inside [`PROJECT_DIR`].
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub profiles: ProfileConfig,
    #[serde(default)]
    pub events: EventConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Who may view a full profile when no block is in place.
    #[serde(default)]
    pub visibility: VisibilityPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    /// Append every event to `.ties/events.jsonl`.
    #[serde(default = "default_true")]
    pub journal: bool,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            journal: default_true(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl StorageConfig {
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Load `.ties/config.toml` under `project_root`, or defaults if absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write `config` to `.ties/config.toml` under `project_root`.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_project_config(project_root: &Path, config: &ProjectConfig) -> Result<()> {
    let dir = project_root.join(PROJECT_DIR);
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
}

const fn default_true() -> bool {
    true
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_uses_defaults() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.profiles.visibility, VisibilityPolicy::Public);
        assert!(cfg.events.journal);
        assert_eq!(cfg.storage.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let dir = root.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(CONFIG_FILE_NAME),
            "[profiles]\nvisibility = \"mutuals\"\n\n[events]\njournal = false\n",
        )
        .unwrap();

        let cfg = load_project_config(root.path()).expect("load should succeed");
        assert_eq!(cfg.profiles.visibility, VisibilityPolicy::Mutuals);
        assert!(!cfg.events.journal);
        assert_eq!(cfg.storage.busy_timeout_ms, 5_000);
    }

    #[test]
    fn unknown_visibility_is_a_parse_error() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let dir = root.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE_NAME), "[profiles]\nvisibility = \"friends\"\n").unwrap();

        let err = load_project_config(root.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn saved_config_loads_back() {
        let root = tempfile::tempdir().expect("temp dir must be created");
        let mut cfg = ProjectConfig::default();
        cfg.profiles.visibility = VisibilityPolicy::Followers;
        cfg.storage.busy_timeout_ms = 250;

        save_project_config(root.path(), &cfg).unwrap();
        assert_eq!(load_project_config(root.path()).unwrap(), cfg);
    }
}
