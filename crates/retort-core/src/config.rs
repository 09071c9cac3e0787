//! Configuration system for retort.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RetortError, RetortResult};

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory for all durable state (lexicons, cooldowns, overrides).
    pub data_dir: PathBuf,
    /// Fold full-width punctuation (【】（）｛｝：) to half-width before a
    /// pattern is inserted into a lexicon.
    pub fold_punctuation: bool,
    /// Quiet period for the debounced cooldown flush, in milliseconds.
    /// Successive cooldown sets within this window batch into one write.
    pub cooldown_flush_quiet_ms: u64,
    /// Maximum number of rules shown by a list command before the output is
    /// truncated with a "+N more" suffix.
    pub list_display_cap: usize,
    /// Scope ids whose messages are ignored entirely.
    pub ignore_scopes: HashSet<String>,
    /// User ids whose messages are ignored entirely.
    pub ignore_users: HashSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".retort"))
            .unwrap_or_else(|| PathBuf::from(".retort"));

        Self {
            data_dir,
            fold_punctuation: false,
            cooldown_flush_quiet_ms: 1000,
            list_display_cap: 20,
            ignore_scopes: HashSet::new(),
            ignore_users: HashSet::new(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration rooted at the given data directory.
    pub fn with_data_dir(path: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: path.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> RetortResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| RetortError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| RetortError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| RetortError::Configuration(e.to_string())),
            _ => Err(RetortError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Create config from environment variables.
    ///
    /// Reads:
    /// - `RETORT_DATA_DIR` (default: `~/.retort`)
    /// - `RETORT_FOLD_PUNCTUATION` (default: false)
    /// - `RETORT_COOLDOWN_FLUSH_QUIET_MS` (default: 1000)
    /// - `RETORT_LIST_DISPLAY_CAP` (default: 20)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("RETORT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if std::env::var("RETORT_FOLD_PUNCTUATION").is_ok() {
            config.fold_punctuation = true;
        }

        if let Ok(quiet) = std::env::var("RETORT_COOLDOWN_FLUSH_QUIET_MS") {
            if let Ok(ms) = quiet.parse() {
                config.cooldown_flush_quiet_ms = ms;
            }
        }

        if let Ok(cap) = std::env::var("RETORT_LIST_DISPLAY_CAP") {
            if let Ok(cap) = cap.parse() {
                config.list_display_cap = cap;
            }
        }

        config
    }

    /// Enable full-width punctuation folding on pattern insertion.
    pub fn with_fold_punctuation(mut self) -> Self {
        self.fold_punctuation = true;
        self
    }

    /// Set the debounce quiet period for cooldown flushes.
    pub fn with_cooldown_flush_quiet(mut self, quiet: Duration) -> Self {
        self.cooldown_flush_quiet_ms = quiet.as_millis() as u64;
        self
    }

    /// Set the list display cap.
    pub fn with_list_display_cap(mut self, cap: usize) -> Self {
        self.list_display_cap = cap.max(1);
        self
    }

    /// Ignore messages from the given scope.
    pub fn ignore_scope(mut self, scope_id: impl Into<String>) -> Self {
        self.ignore_scopes.insert(scope_id.into());
        self
    }

    /// Ignore messages from the given user.
    pub fn ignore_user(mut self, user_id: impl Into<String>) -> Self {
        self.ignore_users.insert(user_id.into());
        self
    }

    /// Debounce quiet period as a [`Duration`].
    pub fn cooldown_flush_quiet(&self) -> Duration {
        Duration::from_millis(self.cooldown_flush_quiet_ms)
    }

    /// Directory holding lexicon documents.
    pub fn lexicon_dir(&self) -> PathBuf {
        self.data_dir.join("lexicon")
    }

    /// Directory holding cooldown tables.
    pub fn cooling_dir(&self) -> PathBuf {
        self.data_dir.join("cooling")
    }

    /// Directory holding point-in-time lexicon backups.
    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    /// Local media cache directory for non-URL image directives.
    pub fn media_cache_dir(&self) -> PathBuf {
        self.data_dir.join("filecache")
    }

    /// Path of the per-scope lexicon override file.
    pub fn scope_override_path(&self) -> PathBuf {
        self.data_dir.join("switch.txt")
    }

    /// Path of the per-user lexicon override file.
    pub fn user_override_path(&self) -> PathBuf {
        self.data_dir.join("select.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert!(!config.fold_punctuation);
        assert_eq!(config.cooldown_flush_quiet_ms, 1000);
        assert_eq!(config.list_display_cap, 20);
        assert!(config.ignore_scopes.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::with_data_dir("/tmp/retort")
            .with_fold_punctuation()
            .with_cooldown_flush_quiet(Duration::from_millis(250))
            .with_list_display_cap(5)
            .ignore_scope("12345")
            .ignore_user("777");

        assert_eq!(config.data_dir, PathBuf::from("/tmp/retort"));
        assert!(config.fold_punctuation);
        assert_eq!(config.cooldown_flush_quiet_ms, 250);
        assert_eq!(config.list_display_cap, 5);
        assert!(config.ignore_scopes.contains("12345"));
        assert!(config.ignore_users.contains("777"));
    }

    #[test]
    fn test_config_paths_derive_from_data_dir() {
        let config = EngineConfig::with_data_dir("/srv/retort");
        assert_eq!(config.lexicon_dir(), PathBuf::from("/srv/retort/lexicon"));
        assert_eq!(config.cooling_dir(), PathBuf::from("/srv/retort/cooling"));
        assert_eq!(
            config.scope_override_path(),
            PathBuf::from("/srv/retort/switch.txt")
        );
    }

    #[test]
    fn test_list_display_cap_minimum() {
        let config = EngineConfig::default().with_list_display_cap(0);
        assert_eq!(config.list_display_cap, 1);
    }
}
