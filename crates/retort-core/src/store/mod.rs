//! Lexicon storage: per-scope rule documents with an in-memory cache.
//!
//! Documents live as flat JSON files under `<data_dir>/lexicon/<id>.json`.
//! Reads degrade to an empty document on any storage fault so that a
//! corrupt file never blocks matching in other scopes; writes are
//! last-writer-wins with the cache updated whether or not the disk write
//! succeeded.

mod overrides;

pub use overrides::OverrideMap;

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Local;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::error::{RetortError, RetortResult};
use crate::types::{Document, Rule, Visibility};

/// Id of the fixed built-in document. Always first in match search order
/// and never user-editable.
pub const BUILTIN_LEXICON_ID: &str = "builtin_default";

/// Version tag written into the builtin document's metadata; bumping it
/// recreates the document on next startup.
const BUILTIN_VERSION: u64 = 1;

/// Loads, caches, and saves lexicon documents, and resolves which document
/// a given (scope, user) pair should use.
pub struct LexiconStore {
    config: EngineConfig,
    documents: RwLock<HashMap<String, Document>>,
    scope_overrides: RwLock<OverrideMap>,
    user_overrides: RwLock<OverrideMap>,
}

impl LexiconStore {
    /// Create a store rooted at the configured data directory, loading the
    /// override maps and seeding the builtin document.
    pub async fn new(config: EngineConfig) -> RetortResult<Self> {
        for dir in [
            config.data_dir.clone(),
            config.lexicon_dir(),
            config.cooling_dir(),
            config.backups_dir(),
            config.media_cache_dir(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }

        let scope_overrides = OverrideMap::load(config.scope_override_path()).await;
        let user_overrides = OverrideMap::load(config.user_override_path()).await;
        debug!(
            scope_overrides = scope_overrides.len(),
            user_overrides = user_overrides.len(),
            "Loaded lexicon override maps"
        );

        let store = Self {
            config,
            documents: RwLock::new(HashMap::new()),
            scope_overrides: RwLock::new(scope_overrides),
            user_overrides: RwLock::new(user_overrides),
        };
        store.ensure_builtin().await;
        Ok(store)
    }

    /// The default lexicon id for a scope: the scope id itself, or a
    /// per-user private id for direct messages.
    pub fn default_lexicon_id(scope_id: &str, user_id: &str) -> String {
        if scope_id.is_empty() {
            format!("private_{}", user_id)
        } else {
            scope_id.to_string()
        }
    }

    /// Resolve which lexicon a (scope, user) pair uses.
    ///
    /// Precedence: the user's selected lexicon, then the scope's forced
    /// lexicon, then the scope default.
    pub async fn resolve_lexicon_id(&self, scope_id: &str, user_id: &str) -> String {
        if !user_id.is_empty() {
            if let Some(id) = self.user_overrides.read().await.get(user_id) {
                return id.to_string();
            }
        }
        if !scope_id.is_empty() {
            if let Some(id) = self.scope_overrides.read().await.get(scope_id) {
                return id.to_string();
            }
        }
        Self::default_lexicon_id(scope_id, user_id)
    }

    fn document_path(&self, lexicon_id: &str) -> PathBuf {
        self.config.lexicon_dir().join(format!("{}.json", lexicon_id))
    }

    /// Load a document, from cache if present, otherwise from disk.
    ///
    /// An absent or unreadable file yields an empty document; parse and
    /// read faults are logged and never propagate.
    pub async fn load(&self, lexicon_id: &str) -> Document {
        if let Some(doc) = self.documents.read().await.get(lexicon_id) {
            return doc.clone();
        }

        let doc = self.read_document(lexicon_id).await;
        self.documents
            .write()
            .await
            .insert(lexicon_id.to_string(), doc.clone());
        doc
    }

    async fn read_document(&self, lexicon_id: &str) -> Document {
        let path = self.document_path(lexicon_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(doc) => doc,
                Err(e) => {
                    error!(lexicon_id, error = %e, "Failed to parse lexicon document");
                    Document::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::new(),
            Err(e) => {
                error!(lexicon_id, error = %e, "Failed to read lexicon document");
                Document::new()
            }
        }
    }

    /// Save a document to the cache and to disk. Write failures are logged,
    /// not raised; the cache reflects the save attempt regardless.
    pub async fn save(&self, lexicon_id: &str, doc: Document) {
        self.documents
            .write()
            .await
            .insert(lexicon_id.to_string(), doc.clone());

        let path = self.document_path(lexicon_id);
        match serde_json::to_string_pretty(&doc) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(&path, json).await {
                    error!(lexicon_id, error = %e, "Failed to write lexicon document");
                }
            }
            Err(e) => {
                error!(lexicon_id, error = %e, "Failed to serialize lexicon document");
            }
        }
    }

    /// Seed the builtin document if missing or version-tagged differently.
    async fn ensure_builtin(&self) {
        let existing = self.read_document(BUILTIN_LEXICON_ID).await;
        let version = existing
            .metadata
            .as_ref()
            .and_then(|m| m.get("version"))
            .and_then(|v| v.as_u64());

        if version == Some(BUILTIN_VERSION) {
            self.documents
                .write()
                .await
                .insert(BUILTIN_LEXICON_ID.to_string(), existing);
            return;
        }

        let doc = Document {
            metadata: Some(serde_json::json!({
                "builtin": true,
                "version": BUILTIN_VERSION,
            })),
            rules: Vec::new(),
        };
        self.save(BUILTIN_LEXICON_ID, doc).await;
        info!(version = BUILTIN_VERSION, "Seeded builtin lexicon document");
    }

    fn guard_builtin(lexicon_id: &str) -> RetortResult<()> {
        if lexicon_id == BUILTIN_LEXICON_ID {
            return Err(RetortError::validation("内置词库不可修改"));
        }
        Ok(())
    }

    /// Fold visually similar full-width punctuation to half-width, when the
    /// config flag is set.
    fn sanitize_pattern(&self, pattern: &str) -> String {
        if !self.config.fold_punctuation {
            return pattern.to_string();
        }
        pattern
            .chars()
            .map(|c| match c {
                '【' => '[',
                '】' => ']',
                '（' => '(',
                '）' => ')',
                '｛' => '{',
                '｝' => '}',
                '：' => ':',
                other => other,
            })
            .collect()
    }

    /// Add a rule to the document resolved for (scope, user).
    ///
    /// Rejects duplicate patterns within the document.
    pub async fn add_rule(
        &self,
        scope_id: &str,
        user_id: &str,
        pattern: &str,
        response: &str,
        visibility: Visibility,
    ) -> RetortResult<()> {
        let lexicon_id = self.resolve_lexicon_id(scope_id, user_id).await;
        Self::guard_builtin(&lexicon_id)?;

        let pattern = self.sanitize_pattern(pattern);
        let mut doc = self.load(&lexicon_id).await;
        if doc.contains_pattern(&pattern) {
            return Err(RetortError::validation("词条已存在"));
        }

        doc.rules.push(Rule::new(pattern, response, visibility));
        self.save(&lexicon_id, doc).await;
        Ok(())
    }

    /// Remove a rule (and all its responses) by pattern.
    pub async fn remove_rule(
        &self,
        scope_id: &str,
        user_id: &str,
        pattern: &str,
    ) -> RetortResult<()> {
        let lexicon_id = self.resolve_lexicon_id(scope_id, user_id).await;
        Self::guard_builtin(&lexicon_id)?;

        let mut doc = self.load(&lexicon_id).await;
        let before = doc.rules.len();
        doc.rules.retain(|rule| rule.pattern != pattern);
        if doc.rules.len() == before {
            return Err(RetortError::not_found("词条不存在"));
        }

        self.save(&lexicon_id, doc).await;
        Ok(())
    }

    /// Append a response template to an existing rule.
    pub async fn add_response_to_rule(
        &self,
        scope_id: &str,
        user_id: &str,
        pattern: &str,
        response: &str,
    ) -> RetortResult<()> {
        let lexicon_id = self.resolve_lexicon_id(scope_id, user_id).await;
        Self::guard_builtin(&lexicon_id)?;

        let mut doc = self.load(&lexicon_id).await;
        let Some(rule) = doc.find_rule_mut(pattern) else {
            return Err(RetortError::not_found("词条不存在"));
        };
        rule.responses.push(response.to_string());

        self.save(&lexicon_id, doc).await;
        Ok(())
    }

    /// Remove one response template from a rule. Removing the last response
    /// deletes the whole rule.
    pub async fn remove_response_from_rule(
        &self,
        scope_id: &str,
        user_id: &str,
        pattern: &str,
        response: &str,
    ) -> RetortResult<()> {
        let lexicon_id = self.resolve_lexicon_id(scope_id, user_id).await;
        Self::guard_builtin(&lexicon_id)?;

        let mut doc = self.load(&lexicon_id).await;
        let Some(rule) = doc.find_rule_mut(pattern) else {
            return Err(RetortError::not_found("词条或回复不存在"));
        };
        let before = rule.responses.len();
        rule.responses.retain(|r| r != response);
        if rule.responses.len() == before {
            return Err(RetortError::not_found("词条或回复不存在"));
        }
        if rule.responses.is_empty() {
            doc.rules.retain(|r| r.pattern != pattern);
        }

        self.save(&lexicon_id, doc).await;
        Ok(())
    }

    /// List rules of the resolved document as display lines, optionally
    /// filtered by a pattern substring.
    pub async fn list_rules(&self, scope_id: &str, user_id: &str, filter: &str) -> Vec<String> {
        let lexicon_id = self.resolve_lexicon_id(scope_id, user_id).await;
        let doc = self.load(&lexicon_id).await;

        doc.rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| filter.is_empty() || rule.pattern.contains(filter))
            .map(|(idx, rule)| {
                format!(
                    "{}. {} ({}) - {}个回复",
                    idx + 1,
                    rule.pattern,
                    rule.visibility.label(),
                    rule.responses.len()
                )
            })
            .collect()
    }

    /// Fetch a rule of the resolved document by 1-based display index.
    pub async fn get_rule_detail(
        &self,
        scope_id: &str,
        user_id: &str,
        index: usize,
    ) -> Option<Rule> {
        let lexicon_id = self.resolve_lexicon_id(scope_id, user_id).await;
        let doc = self.load(&lexicon_id).await;
        if index >= 1 && index <= doc.rules.len() {
            Some(doc.rules[index - 1].clone())
        } else {
            None
        }
    }

    /// Replace the resolved document with an empty one.
    pub async fn clear_document(&self, scope_id: &str, user_id: &str) -> RetortResult<()> {
        let lexicon_id = self.resolve_lexicon_id(scope_id, user_id).await;
        Self::guard_builtin(&lexicon_id)?;
        self.save(&lexicon_id, Document::new()).await;
        Ok(())
    }

    /// Write a point-in-time copy of the resolved document to the backups
    /// directory, returning the backup path.
    pub async fn backup_document(&self, scope_id: &str, user_id: &str) -> RetortResult<PathBuf> {
        let lexicon_id = self.resolve_lexicon_id(scope_id, user_id).await;
        let doc = self.load(&lexicon_id).await;

        let stamp = Local::now().format("%Y%m%d%H%M%S");
        let path = self
            .config
            .backups_dir()
            .join(format!("{}_{}.json", lexicon_id, stamp));
        let json = serde_json::to_string_pretty(&doc)?;
        tokio::fs::write(&path, json).await?;
        info!(lexicon_id, path = %path.display(), "Backed up lexicon document");
        Ok(path)
    }

    /// Set (and persist) the user's selected lexicon.
    pub async fn set_user_lexicon(&self, user_id: &str, lexicon_id: &str) {
        let mut overrides = self.user_overrides.write().await;
        overrides.set(user_id, lexicon_id);
        overrides.save().await;
    }

    /// Set (and persist) a scope's forced lexicon.
    pub async fn set_scope_lexicon(&self, scope_id: &str, lexicon_id: &str) {
        let mut overrides = self.scope_overrides.write().await;
        overrides.set(scope_id, lexicon_id);
        overrides.save().await;
    }

    /// The engine configuration this store was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
