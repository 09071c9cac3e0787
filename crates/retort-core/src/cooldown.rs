//! Cooldown bookkeeping: per-(user, rule) expiry tracking with debounced
//! batched persistence.
//!
//! In-memory state is the source of truth; durable writes are deferred
//! behind a quiet period so rapid successive triggers batch into one disk
//! write. Entries set shortly before a crash may be lost; cooldowns are an
//! anti-spam heuristic, not a correctness-critical ledger.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Result of a cooldown query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    /// No active cooldown; the rule may fire.
    Clear,
    /// Cooling down; the rule may fire again after this many seconds.
    Cooling(u64),
}

/// One persisted cooldown record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CooldownRecord {
    user_id: String,
    item_index: usize,
    expire_time: f64,
}

/// Per-lexicon table: (user_id, rule_index) -> absolute expiry (unix secs).
type Table = HashMap<(String, usize), f64>;

struct LedgerInner {
    /// Loaded tables, keyed by lexicon id.
    tables: HashMap<String, Table>,
    /// Lexicon ids with unflushed changes.
    dirty: HashSet<String>,
    /// The pending debounced flush, if any. A new save request aborts and
    /// replaces it.
    pending_flush: Option<JoinHandle<()>>,
}

/// Tracks active cooldowns per (user, rule) keyed by lexicon id.
///
/// All table mutation happens under one exclusive lock so concurrent
/// triggers cannot fire a rule twice before its cooldown becomes visible.
pub struct CooldownLedger {
    dir: PathBuf,
    quiet: Duration,
    inner: Arc<Mutex<LedgerInner>>,
}

impl CooldownLedger {
    /// Create a ledger persisting under `dir` with the given debounce
    /// quiet period.
    pub fn new(dir: PathBuf, quiet: Duration) -> Self {
        Self {
            dir,
            quiet,
            inner: Arc::new(Mutex::new(LedgerInner {
                tables: HashMap::new(),
                dirty: HashSet::new(),
                pending_flush: None,
            })),
        }
    }

    fn now() -> f64 {
        let now = Utc::now();
        now.timestamp() as f64 + f64::from(now.timestamp_subsec_millis()) / 1000.0
    }

    /// Query the cooldown for (user, rule) in a lexicon.
    ///
    /// Loads the lexicon's table on first access. Expired entries are
    /// lazily evicted and report [`CooldownState::Clear`].
    pub async fn check(&self, user_id: &str, lexicon_id: &str, rule_index: usize) -> CooldownState {
        let mut inner = self.inner.lock().await;
        self.ensure_loaded(&mut inner, lexicon_id).await;

        let now = Self::now();
        let key = (user_id.to_string(), rule_index);
        let table = inner.tables.entry(lexicon_id.to_string()).or_default();

        match table.get(&key) {
            Some(&expire) if now < expire => {
                let remaining = (expire - now) as u64;
                if remaining == 0 {
                    CooldownState::Clear
                } else {
                    CooldownState::Cooling(remaining)
                }
            }
            Some(_) => {
                table.remove(&key);
                CooldownState::Clear
            }
            None => CooldownState::Clear,
        }
    }

    /// Record a cooldown of `seconds` for (user, rule), overwriting any
    /// existing entry, and schedule a debounced save.
    pub async fn set(&self, user_id: &str, lexicon_id: &str, rule_index: usize, seconds: u64) {
        let mut inner = self.inner.lock().await;
        self.ensure_loaded(&mut inner, lexicon_id).await;

        let expire = Self::now() + seconds as f64;
        inner
            .tables
            .entry(lexicon_id.to_string())
            .or_default()
            .insert((user_id.to_string(), rule_index), expire);
        inner.dirty.insert(lexicon_id.to_string());

        self.schedule_flush(&mut inner);
    }

    /// Write all dirty tables immediately, cancelling any pending
    /// debounced save. Intended for shutdown and tests.
    pub async fn flush_now(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(handle) = inner.pending_flush.take() {
            handle.abort();
        }
        Self::flush_dirty(&mut inner, &self.dir).await;
    }

    /// Reset the debounce: abort the pending flush task and start a new
    /// quiet period.
    fn schedule_flush(&self, inner: &mut LedgerInner) {
        if let Some(handle) = inner.pending_flush.take() {
            handle.abort();
        }

        let shared = self.inner.clone();
        let dir = self.dir.clone();
        let quiet = self.quiet;
        inner.pending_flush = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let mut inner = shared.lock().await;
            inner.pending_flush = None;
            Self::flush_dirty(&mut inner, &dir).await;
        }));
    }

    /// Persist every dirty table, dropping already-expired entries first.
    async fn flush_dirty(inner: &mut LedgerInner, dir: &PathBuf) {
        let now = Self::now();
        let dirty: Vec<String> = inner.dirty.drain().collect();

        for lexicon_id in dirty {
            let Some(table) = inner.tables.get_mut(&lexicon_id) else {
                continue;
            };
            table.retain(|_, &mut expire| expire > now);

            let mut records: Vec<CooldownRecord> = table
                .iter()
                .map(|((user_id, item_index), &expire_time)| CooldownRecord {
                    user_id: user_id.clone(),
                    item_index: *item_index,
                    expire_time,
                })
                .collect();
            records.sort_by(|a, b| {
                (&a.user_id, a.item_index).cmp(&(&b.user_id, b.item_index))
            });

            let json = match serde_json::to_string_pretty(&records) {
                Ok(json) => json,
                Err(e) => {
                    error!(lexicon_id, error = %e, "Failed to serialize cooldown table");
                    continue;
                }
            };

            // Write-then-rename keeps a concurrent abort from leaving a
            // truncated table behind.
            let path = dir.join(format!("{}.json", lexicon_id));
            let tmp = dir.join(format!("{}.json.tmp", lexicon_id));
            let result = async {
                tokio::fs::write(&tmp, json).await?;
                tokio::fs::rename(&tmp, &path).await
            }
            .await;

            match result {
                Ok(()) => debug!(lexicon_id, "Flushed cooldown table"),
                Err(e) => error!(lexicon_id, error = %e, "Failed to write cooldown table"),
            }
        }
    }

    /// Load a lexicon's table on first access: the JSON format, falling
    /// back to the legacy `uid=index=expire` line format. Storage faults
    /// degrade to an empty table.
    async fn ensure_loaded(&self, inner: &mut LedgerInner, lexicon_id: &str) {
        if inner.tables.contains_key(lexicon_id) {
            return;
        }

        let mut table = Table::new();
        let json_path = self.dir.join(format!("{}.json", lexicon_id));
        match tokio::fs::read_to_string(&json_path).await {
            Ok(content) => match serde_json::from_str::<Vec<CooldownRecord>>(&content) {
                Ok(records) => {
                    for record in records {
                        table.insert((record.user_id, record.item_index), record.expire_time);
                    }
                }
                Err(e) => {
                    error!(lexicon_id, error = %e, "Failed to parse cooldown table");
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::load_legacy(&self.dir.join(format!("{}.txt", lexicon_id)), &mut table).await;
            }
            Err(e) => {
                error!(lexicon_id, error = %e, "Failed to read cooldown table");
            }
        }

        inner.tables.insert(lexicon_id.to_string(), table);
    }

    async fn load_legacy(path: &PathBuf, table: &mut Table) {
        let Ok(content) = tokio::fs::read_to_string(path).await else {
            return;
        };
        for line in content.lines() {
            let mut parts = line.trim().split('=');
            let (Some(user), Some(index), Some(expire)) =
                (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let (Ok(index), Ok(expire)) = (index.parse::<usize>(), expire.parse::<f64>()) else {
                continue;
            };
            table.insert((user.to_string(), index), expire);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(dir: &tempfile::TempDir, quiet_ms: u64) -> CooldownLedger {
        CooldownLedger::new(dir.path().to_path_buf(), Duration::from_millis(quiet_ms))
    }

    #[tokio::test]
    async fn test_set_then_check_reports_remaining() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir, 50);

        ledger.set("u1", "g1", 0, 60).await;
        match ledger.check("u1", "g1", 0).await {
            CooldownState::Cooling(secs) => assert!((1..=60).contains(&secs)),
            other => panic!("expected cooling, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir, 50);

        // Zero seconds expires immediately
        ledger.set("u1", "g1", 0, 0).await;
        assert_eq!(ledger.check("u1", "g1", 0).await, CooldownState::Clear);
        // And stays clear on repeat queries
        assert_eq!(ledger.check("u1", "g1", 0).await, CooldownState::Clear);
    }

    #[tokio::test]
    async fn test_distinct_rules_and_users_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir, 50);

        ledger.set("u1", "g1", 3, 60).await;
        assert_eq!(ledger.check("u1", "g1", 4).await, CooldownState::Clear);
        assert_eq!(ledger.check("u2", "g1", 3).await, CooldownState::Clear);
        assert!(matches!(
            ledger.check("u1", "g1", 3).await,
            CooldownState::Cooling(_)
        ));
    }

    #[tokio::test]
    async fn test_debounced_flush_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir, 20);

        ledger.set("u1", "g1", 0, 60).await;
        ledger.set("u1", "g1", 1, 60).await;
        ledger.set("u2", "g1", 0, 60).await;

        tokio::time::sleep(Duration::from_millis(200)).await;

        let content = tokio::fs::read_to_string(dir.path().join("g1.json"))
            .await
            .unwrap();
        let records: Vec<CooldownRecord> = serde_json::from_str(&content).unwrap();
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn test_flush_now_filters_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir, 1000);

        ledger.set("u1", "g1", 0, 0).await;
        ledger.set("u1", "g1", 1, 600).await;
        ledger.flush_now().await;

        let content = tokio::fs::read_to_string(dir.path().join("g1.json"))
            .await
            .unwrap();
        let records: Vec<CooldownRecord> = serde_json::from_str(&content).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].item_index, 1);
    }

    #[tokio::test]
    async fn test_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let ledger = ledger(&dir, 10);
            ledger.set("u1", "g1", 2, 3600).await;
            ledger.flush_now().await;
        }
        let ledger = ledger(&dir, 10);
        assert!(matches!(
            ledger.check("u1", "g1", 2).await,
            CooldownState::Cooling(_)
        ));
    }

    #[tokio::test]
    async fn test_legacy_txt_format_loads() {
        let dir = tempfile::tempdir().unwrap();
        let future = Utc::now().timestamp() as f64 + 500.0;
        tokio::fs::write(
            dir.path().join("g1.txt"),
            format!("u1=0={}\nmalformed line\n", future),
        )
        .await
        .unwrap();

        let ledger = ledger(&dir, 10);
        assert!(matches!(
            ledger.check("u1", "g1", 0).await,
            CooldownState::Cooling(_)
        ));
    }

    #[tokio::test]
    async fn test_corrupt_table_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("g1.json"), "{oops").await.unwrap();

        let ledger = ledger(&dir, 10);
        assert_eq!(ledger.check("u1", "g1", 0).await, CooldownState::Clear);
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = ledger(&dir, 50);

        ledger.set("u1", "g1", 0, 5000).await;
        ledger.set("u1", "g1", 0, 10).await;
        match ledger.check("u1", "g1", 0).await {
            CooldownState::Cooling(secs) => assert!(secs <= 10),
            other => panic!("expected cooling, got {:?}", other),
        }
    }
}
