//! Lexicon rules and documents.
//!
//! A [`Document`] is an ordered collection of [`Rule`]s, serialized in the
//! flat-file wire format `{ "_metadata"?: {...}, "work": [ { "<pattern>":
//! { "r": [responses...], "s": visibility } } ] }`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Marker that makes a pattern a wildcard pattern.
pub(crate) const WILDCARD_MARKER: &str = "[n.";

/// Match visibility of a rule.
///
/// The numeric tag doubles as the match mode: fuzzy rules substring-match,
/// exact rules require the whole message, admin rules fuzzy-match but are
/// invisible to non-privileged senders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Pattern matches as a substring of the message (tag 0).
    #[default]
    Fuzzy,
    /// Pattern must equal the message verbatim (tag 1).
    Exact,
    /// Only visible to privileged senders (tag 10).
    Admin,
}

impl Visibility {
    /// Decode a stored tag. Unknown tags degrade to [`Visibility::Fuzzy`].
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            1 => Self::Exact,
            10 => Self::Admin,
            _ => Self::Fuzzy,
        }
    }

    /// The numeric tag written to storage.
    pub fn tag(self) -> u8 {
        match self {
            Self::Fuzzy => 0,
            Self::Exact => 1,
            Self::Admin => 10,
        }
    }

    /// Human-readable label used by the list command.
    pub fn label(self) -> &'static str {
        match self {
            Self::Fuzzy => "模糊",
            Self::Exact => "精准",
            Self::Admin => "管理",
        }
    }
}

/// A single keyword rule: a pattern plus one or more response templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// The trigger pattern, unique within its document.
    pub pattern: String,
    /// Response templates; one is chosen uniformly at random on a hit.
    pub responses: Vec<String>,
    /// Visibility / match-mode tag.
    pub visibility: Visibility,
}

impl Rule {
    /// Create a rule with a single response.
    pub fn new(
        pattern: impl Into<String>,
        response: impl Into<String>,
        visibility: Visibility,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            responses: vec![response.into()],
            visibility,
        }
    }

    /// Whether the pattern contains wildcard placeholders (`[n.K]`).
    pub fn is_wildcard(&self) -> bool {
        self.pattern.contains(WILDCARD_MARKER)
    }
}

/// An ordered lexicon document.
///
/// A document with zero rules is valid (empty lexicon).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "DocumentWire", into = "DocumentWire")]
pub struct Document {
    /// Optional opaque metadata (`_metadata` on the wire), preserved
    /// round-trip. The builtin document carries its version tag here.
    pub metadata: Option<serde_json::Value>,
    /// Rules in insertion order.
    pub rules: Vec<Rule>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a rule by its pattern.
    pub fn find_rule(&self, pattern: &str) -> Option<(usize, &Rule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.pattern == pattern)
    }

    /// Find a rule by its pattern, mutably.
    pub fn find_rule_mut(&mut self, pattern: &str) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|rule| rule.pattern == pattern)
    }

    /// Whether a rule with this pattern already exists.
    pub fn contains_pattern(&self, pattern: &str) -> bool {
        self.find_rule(pattern).is_some()
    }
}

/// Wire representation of one rule body.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RuleBodyWire {
    /// Response templates.
    #[serde(default)]
    r: Vec<String>,
    /// Visibility tag.
    #[serde(default)]
    s: u8,
}

/// Wire representation of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentWire {
    #[serde(rename = "_metadata", default, skip_serializing_if = "Option::is_none")]
    metadata: Option<serde_json::Value>,
    #[serde(default)]
    work: Vec<BTreeMap<String, RuleBodyWire>>,
}

impl From<DocumentWire> for Document {
    fn from(wire: DocumentWire) -> Self {
        let mut rules = Vec::with_capacity(wire.work.len());
        for entry in wire.work {
            for (pattern, body) in entry {
                rules.push(Rule {
                    pattern,
                    responses: body.r,
                    visibility: Visibility::from_tag(body.s),
                });
            }
        }
        Self {
            metadata: wire.metadata,
            rules,
        }
    }
}

impl From<Document> for DocumentWire {
    fn from(doc: Document) -> Self {
        let work = doc
            .rules
            .into_iter()
            .map(|rule| {
                let mut entry = BTreeMap::new();
                entry.insert(
                    rule.pattern,
                    RuleBodyWire {
                        r: rule.responses,
                        s: rule.visibility.tag(),
                    },
                );
                entry
            })
            .collect();
        Self {
            metadata: doc.metadata,
            work,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_tags_round_trip() {
        for vis in [Visibility::Fuzzy, Visibility::Exact, Visibility::Admin] {
            assert_eq!(Visibility::from_tag(vis.tag()), vis);
        }
        // Unknown tags degrade to fuzzy
        assert_eq!(Visibility::from_tag(7), Visibility::Fuzzy);
    }

    #[test]
    fn test_wildcard_detection() {
        assert!(Rule::new("[n.1]多少好感", "x", Visibility::Fuzzy).is_wildcard());
        assert!(!Rule::new("你好", "x", Visibility::Fuzzy).is_wildcard());
    }

    #[test]
    fn test_document_wire_format() {
        let doc = Document {
            metadata: None,
            rules: vec![
                Rule::new("你好", "hello", Visibility::Exact),
                Rule::new("帮助", "help", Visibility::Fuzzy),
            ],
        };

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["work"][0]["你好"]["r"][0], "hello");
        assert_eq!(json["work"][0]["你好"]["s"], 1);
        assert_eq!(json["work"][1]["帮助"]["s"], 0);

        let back: Document = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_document_parses_metadata_and_missing_fields() {
        let json = r#"{"_metadata": {"builtin": true, "version": 1},
                       "work": [{"签到": {"r": ["ok"]}}]}"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.metadata.as_ref().unwrap()["version"], 1);
        // Missing "s" defaults to fuzzy
        assert_eq!(doc.rules[0].visibility, Visibility::Fuzzy);
    }

    #[test]
    fn test_empty_document_is_valid() {
        let doc: Document = serde_json::from_str(r#"{"work": []}"#).unwrap();
        assert!(doc.rules.is_empty());
        assert!(!doc.contains_pattern("anything"));
    }
}
