//! Scope/user lexicon override maps, persisted as `key=value` line files.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::error;

/// A mutable `key=value` mapping backed by a newline-delimited file
/// (`switch.txt` for scope overrides, `select.txt` for user overrides).
#[derive(Debug)]
pub struct OverrideMap {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl OverrideMap {
    /// Load the map from its file. A missing file yields an empty map;
    /// read failures are logged and degrade to empty as well.
    pub async fn load(path: PathBuf) -> Self {
        let mut entries = HashMap::new();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                for line in content.lines() {
                    let line = line.trim();
                    if let Some((key, value)) = line.split_once('=') {
                        entries.insert(key.trim().to_string(), value.trim().to_string());
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read override file");
            }
        }
        Self { path, entries }
    }

    /// Look up an override. Empty values count as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Insert or replace an override. Call [`OverrideMap::save`] to persist.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Number of entries, including empty-valued ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist the map. Write failures are logged, not raised; the
    /// in-memory state keeps the new values either way.
    pub async fn save(&self) {
        let mut lines: Vec<String> = self
            .entries
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        lines.sort();
        if let Err(e) = tokio::fs::write(&self.path, lines.join("\n")).await {
            error!(path = %self.path.display(), error = %e, "Failed to write override file");
        }
    }
}
