//! Directive parsing: split the expanded response into typed segments.
//!
//! Bracketed tokens (`[...]`) not consumed by earlier passes are parsed as
//! media/mention directives; the key before the first `.` selects the
//! directive family, the remaining dot-separated parts are its arguments.
//! Unrecognized or malformed directives are emitted as literal text.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{MessageContext, Segment};

static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").unwrap());

/// Split the rendered text into an ordered segment sequence.
pub fn split_segments(text: &str, media_dir: &Path, ctx: &MessageContext) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for token in BRACKETED.find_iter(text) {
        push_text(&mut segments, &text[cursor..token.start()]);
        segments.extend(parse_directive(token.as_str(), media_dir, ctx));
        cursor = token.end();
    }
    push_text(&mut segments, &text[cursor..]);

    segments
}

fn push_text(segments: &mut Vec<Segment>, part: &str) {
    if !part.trim().is_empty() {
        segments.push(Segment::text(part));
    }
}

fn parse_directive(token: &str, media_dir: &Path, ctx: &MessageContext) -> Option<Segment> {
    let inner = &token[1..token.len() - 1];
    let mut parts = inner.split('.');
    let key = parts.next().unwrap_or_default().to_lowercase();
    let args: Vec<&str> = parts.collect();

    let segment = match key.as_str() {
        "image" | "图片" => {
            let target = args.join(".");
            if target.is_empty() {
                return literal(token);
            }
            if target.starts_with("http://") || target.starts_with("https://") {
                Segment::ImageUrl { url: target }
            } else {
                Segment::ImagePath {
                    path: media_dir.join(target),
                }
            }
        }
        "at" | "艾特" => {
            let target = args.first().copied().unwrap_or_default();
            Segment::At {
                user_id: if target.is_empty() {
                    ctx.sender_id.clone()
                } else {
                    target.to_string()
                },
            }
        }
        "face" | "表情" => match args.first().copied().filter(|id| !id.is_empty()) {
            Some(id) => Segment::Face { id: id.to_string() },
            None => return literal(token),
        },
        "reply" | "回复" => {
            let target = args.first().copied().unwrap_or_default();
            Segment::Reply {
                message_id: if target.is_empty() {
                    ctx.message_id.clone()
                } else {
                    target.to_string()
                },
            }
        }
        "record" | "语音" => {
            let target = args.join(".");
            if target.is_empty() {
                return literal(token);
            }
            Segment::Record { url: target }
        }
        "poke" => match (args.first(), args.get(1)) {
            (Some(&target), Some(&scope)) if !target.is_empty() => Segment::Poke {
                target_id: target.to_string(),
                scope_id: scope.to_string(),
            },
            _ => return literal(token),
        },
        _ => return literal(token),
    };
    Some(segment)
}

fn literal(token: &str) -> Option<Segment> {
    Some(Segment::text(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx() -> MessageContext {
        MessageContext::group("g1", "u1", "hi").with_message_id("m42")
    }

    fn split(text: &str) -> Vec<Segment> {
        split_segments(text, &PathBuf::from("/cache"), &ctx())
    }

    #[test]
    fn test_plain_text_only() {
        assert_eq!(split("hello"), vec![Segment::text("hello")]);
    }

    #[test]
    fn test_image_url_and_local() {
        assert_eq!(
            split("[图片.https://x.y/a.png]"),
            vec![Segment::ImageUrl {
                url: "https://x.y/a.png".to_string()
            }]
        );
        assert_eq!(
            split("[image.cat.jpg]"),
            vec![Segment::ImagePath {
                path: PathBuf::from("/cache/cat.jpg")
            }]
        );
    }

    #[test]
    fn test_at_with_default_target() {
        assert_eq!(
            split("[艾特.999]"),
            vec![Segment::At {
                user_id: "999".to_string()
            }]
        );
        assert_eq!(
            split("[at]"),
            vec![Segment::At {
                user_id: "u1".to_string()
            }]
        );
    }

    #[test]
    fn test_reply_defaults_to_current_message() {
        assert_eq!(
            split("[回复]"),
            vec![Segment::Reply {
                message_id: "m42".to_string()
            }]
        );
        assert_eq!(
            split("[reply.m7]"),
            vec![Segment::Reply {
                message_id: "m7".to_string()
            }]
        );
    }

    #[test]
    fn test_face_record_poke() {
        assert_eq!(
            split("[表情.123]"),
            vec![Segment::Face {
                id: "123".to_string()
            }]
        );
        assert_eq!(
            split("[语音.http://a/b.mp3]"),
            vec![Segment::Record {
                url: "http://a/b.mp3".to_string()
            }]
        );
        assert_eq!(
            split("[poke.42.g1]"),
            vec![Segment::Poke {
                target_id: "42".to_string(),
                scope_id: "g1".to_string()
            }]
        );
    }

    #[test]
    fn test_unknown_directive_is_literal() {
        assert_eq!(split("[whatever.x]"), vec![Segment::text("[whatever.x]")]);
        assert_eq!(split("[just brackets]"), vec![Segment::text("[just brackets]")]);
    }

    #[test]
    fn test_malformed_directive_is_literal() {
        assert_eq!(split("[图片]"), vec![Segment::text("[图片]")]);
        assert_eq!(split("[poke.42]"), vec![Segment::text("[poke.42]")]);
    }

    #[test]
    fn test_mixed_sequence_keeps_order() {
        let segments = split("看这个[图片.https://x/p.png]如何[表情.1]");
        assert_eq!(segments.len(), 4);
        assert_eq!(segments[0], Segment::text("看这个"));
        assert!(matches!(segments[1], Segment::ImageUrl { .. }));
        assert_eq!(segments[2], Segment::text("如何"));
        assert!(matches!(segments[3], Segment::Face { .. }));
    }

    #[test]
    fn test_whitespace_runs_are_dropped() {
        let segments = split("  [表情.1]  ");
        assert_eq!(segments.len(), 1);
    }
}
