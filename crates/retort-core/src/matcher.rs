//! Lexicon search: document order, match-type priority, wildcard patterns.
//!
//! Search order over lexicon ids is `builtin_default`, then the id resolved
//! for the (scope, user) pair, then the scope's own default id when it
//! differs, so a user with a custom-selected lexicon still falls back to the
//! scope's native one. The first satisfying (document, rule) pair wins; no
//! scoring, no longest-match preference.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use tracing::error;

use crate::store::{LexiconStore, BUILTIN_LEXICON_ID};
use crate::types::{MatchKind, MatchResult, Visibility, CAPTURE_SLOTS};

/// Wildcard placeholder in a raw pattern: `[n.K]`.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[n\.(\d+)\]").unwrap());

/// The same placeholder after `regex::escape` has been applied to the
/// pattern: `\[n\.K\]`.
static ESCAPED_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\\[n\\\.(\d+)\\\]").unwrap());

/// Search all documents visible to (scope, user) for the first rule that
/// matches `text`. Returns `None` when nothing matches.
pub async fn search(
    store: &LexiconStore,
    text: &str,
    scope_id: &str,
    user_id: &str,
    is_privileged: bool,
) -> Option<MatchResult> {
    let resolved = store.resolve_lexicon_id(scope_id, user_id).await;
    let scope_default = LexiconStore::default_lexicon_id(scope_id, user_id);

    let mut order: Vec<&str> = vec![BUILTIN_LEXICON_ID, &resolved];
    if scope_default != resolved {
        order.push(&scope_default);
    }
    order.dedup();

    for lexicon_id in order {
        let doc = store.load(lexicon_id).await;
        for (rule_index, rule) in doc.rules.iter().enumerate() {
            if rule.visibility == Visibility::Admin && !is_privileged {
                continue;
            }
            let Some(response) = rule.responses.choose(&mut rand::thread_rng()) else {
                continue;
            };

            if rule.is_wildcard() {
                if let Some(captures) = match_wildcard(&rule.pattern, text) {
                    return Some(MatchResult {
                        kind: MatchKind::Wildcard,
                        response: response.clone(),
                        captures,
                        lexicon_id: lexicon_id.to_string(),
                        rule_index,
                        pattern: rule.pattern.clone(),
                    });
                }
            }

            if rule.visibility == Visibility::Exact && rule.pattern == text {
                return Some(MatchResult {
                    kind: MatchKind::Exact,
                    response: response.clone(),
                    captures: MatchResult::empty_captures(),
                    lexicon_id: lexicon_id.to_string(),
                    rule_index,
                    pattern: rule.pattern.clone(),
                });
            }

            if rule.visibility == Visibility::Fuzzy && text.contains(&rule.pattern) {
                return Some(MatchResult {
                    kind: MatchKind::Fuzzy,
                    response: response.clone(),
                    captures: MatchResult::empty_captures(),
                    lexicon_id: lexicon_id.to_string(),
                    rule_index,
                    pattern: rule.pattern.clone(),
                });
            }
        }
    }

    None
}

/// Match a wildcard pattern against the full text, anchored at both ends.
///
/// Each `[n.K]` placeholder becomes a non-greedy one-or-more capture;
/// literal characters are matched exactly. Captures are assigned to slots
/// 1..=5 by placeholder suffix in order of appearance (a repeated suffix
/// keeps the last occurrence's capture; suffixes outside the slot range are
/// silently ignored). Compile failures are logged and treated as a
/// non-match.
pub fn match_wildcard(pattern: &str, text: &str) -> Option<[String; CAPTURE_SLOTS]> {
    let escaped = regex::escape(pattern);
    let compiled = ESCAPED_PLACEHOLDER.replace_all(&escaped, "(.+?)");

    let re = match Regex::new(&format!("^{}$", compiled)) {
        Ok(re) => re,
        Err(e) => {
            error!(pattern, error = %e, "Failed to compile wildcard pattern");
            return None;
        }
    };
    let caps = re.captures(text)?;

    let mut slots: [String; CAPTURE_SLOTS] = Default::default();
    for (group, placeholder) in PLACEHOLDER.captures_iter(pattern).enumerate() {
        let Ok(slot) = placeholder[1].parse::<usize>() else {
            continue;
        };
        if slot >= CAPTURE_SLOTS {
            continue;
        }
        if let Some(m) = caps.get(group + 1) {
            slots[slot] = m.as_str().to_string();
        }
    }
    Some(slots)
}
