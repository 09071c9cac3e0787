//! Transient result of a lexicon search.

/// Number of wildcard capture slots. Slot 0 is unused; responses reference
/// slots 1..=5 as `[n.1]`..`[n.5]`.
pub const CAPTURE_SLOTS: usize = 6;

/// How a rule matched the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Pattern with `[n.K]` placeholders matched the whole text.
    Wildcard,
    /// Pattern equalled the text verbatim.
    Exact,
    /// Pattern occurred as a substring of the text.
    Fuzzy,
}

/// A successful lexicon match. Not persisted.
#[derive(Debug, Clone)]
pub struct MatchResult {
    /// How the rule matched.
    pub kind: MatchKind,
    /// The response template chosen (uniformly at random) from the rule.
    pub response: String,
    /// Wildcard capture slots, positionally indexed 1..=5; unmapped slots
    /// are empty strings.
    pub captures: [String; CAPTURE_SLOTS],
    /// Id of the document the rule came from.
    pub lexicon_id: String,
    /// Index of the rule within its document.
    pub rule_index: usize,
    /// The rule's original pattern.
    pub pattern: String,
}

impl MatchResult {
    /// Empty capture array for non-wildcard matches.
    pub fn empty_captures() -> [String; CAPTURE_SLOTS] {
        Default::default()
    }
}
