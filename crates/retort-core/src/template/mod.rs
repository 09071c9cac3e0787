//! Template engine: expands a matched response template into typed
//! content segments.
//!
//! The pipeline applies, in order: wildcard substitution, context
//! variables, randomization, time variables, arithmetic, the cooldown
//! directive, conditional suppression, and directive segmentation. Every
//! step degrades to "leave text as-is and continue" except the conditional
//! pass, whose false branch suppresses the whole response.

mod arith;
mod passes;
mod segments;

pub use arith::evaluate as evaluate_arithmetic;

use std::path::PathBuf;

use tracing::debug;

use crate::types::{MatchResult, MessageContext, Segment};

/// A fully rendered response.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Ordered segments handed to the message-sending collaborator.
    pub segments: Vec<Segment>,
    /// Cooldown requested by the template, in seconds. Reported out-of-band
    /// so the caller commits it only after the reply is delivered.
    pub cooldown_secs: Option<u64>,
}

/// Expands matched response templates.
pub struct TemplateEngine {
    media_dir: PathBuf,
}

impl TemplateEngine {
    /// Create an engine resolving local media against `media_dir`.
    pub fn new(media_dir: PathBuf) -> Self {
        Self { media_dir }
    }

    /// Render the chosen response template of a match.
    ///
    /// Returns `None` when the response is suppressed by a false
    /// conditional block, meaning: send nothing.
    pub fn render(&self, result: &MatchResult, ctx: &MessageContext) -> Option<Rendered> {
        let text = passes::substitute_captures(&result.response, &result.captures);
        let text = passes::substitute_context(&text, ctx);
        let text = passes::expand_random(&text);
        let text = passes::expand_time(&text);
        let text = passes::expand_arithmetic(&text);
        let (text, cooldown_secs) = passes::extract_cooldown(&text);

        let Some(text) = passes::apply_conditional(&text) else {
            debug!(
                pattern = %result.pattern,
                lexicon_id = %result.lexicon_id,
                "Response suppressed by conditional block"
            );
            return None;
        };

        Some(Rendered {
            segments: segments::split_segments(&text, &self.media_dir, ctx),
            cooldown_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchKind, CAPTURE_SLOTS};

    fn engine() -> TemplateEngine {
        TemplateEngine::new(PathBuf::from("/cache"))
    }

    fn hit(response: &str) -> MatchResult {
        MatchResult {
            kind: MatchKind::Exact,
            response: response.to_string(),
            captures: MatchResult::empty_captures(),
            lexicon_id: "g1".to_string(),
            rule_index: 0,
            pattern: "p".to_string(),
        }
    }

    fn ctx() -> MessageContext {
        MessageContext::group("g1", "u1", "p")
            .with_display_name("Ann")
            .with_message_id("m1")
            .with_self_id("bot")
    }

    #[test]
    fn test_full_pipeline() {
        let rendered = engine()
            .render(&hit("{5>3}[name]掷出(2-2)点,总分(+1+1)(60~)"), &ctx())
            .unwrap();
        assert_eq!(rendered.cooldown_secs, Some(60));
        assert_eq!(rendered.segments, vec![Segment::text("Ann掷出2点,总分2")]);
    }

    #[test]
    fn test_suppression() {
        assert!(engine().render(&hit("{3>5}ok"), &ctx()).is_none());
    }

    #[test]
    fn test_wildcard_captures_flow_through() {
        let mut result = hit("[n.1]的好感度是(1-1)");
        result.kind = MatchKind::Wildcard;
        let mut captures: [String; CAPTURE_SLOTS] = Default::default();
        captures[1] = "小明".to_string();
        result.captures = captures;

        let rendered = engine().render(&result, &ctx()).unwrap();
        assert_eq!(rendered.segments, vec![Segment::text("小明的好感度是1")]);
    }

    #[test]
    fn test_failed_arithmetic_left_verbatim() {
        let rendered = engine().render(&hit("值(+1/0)"), &ctx()).unwrap();
        assert_eq!(rendered.segments, vec![Segment::text("值(+1/0)")]);
    }

    #[test]
    fn test_media_directives_become_segments() {
        let rendered = engine()
            .render(&hit("[图片.https://x/p.png][at]"), &ctx())
            .unwrap();
        assert_eq!(rendered.segments.len(), 2);
        assert!(matches!(rendered.segments[0], Segment::ImageUrl { .. }));
        assert_eq!(
            rendered.segments[1],
            Segment::At {
                user_id: "u1".to_string()
            }
        );
    }

    #[test]
    fn test_no_cooldown_by_default() {
        let rendered = engine().render(&hit("plain"), &ctx()).unwrap();
        assert_eq!(rendered.cooldown_secs, None);
    }
}
