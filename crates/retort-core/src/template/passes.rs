//! Text-transform passes of the template pipeline.
//!
//! Each pass is a pure function over the response string, applied in the
//! fixed order defined by [`super::TemplateEngine::render`]. Every pass
//! degrades to "leave text as-is" on anything it cannot handle; only the
//! conditional pass may abort the whole render.

use chrono::{Days, Local};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use tracing::warn;

use crate::template::arith;
use crate::types::{MessageContext, CAPTURE_SLOTS};

static RANDOM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d+)-(\d+)\)").unwrap());
static ARITHMETIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\+([^)]+)\)").unwrap());
static COOLDOWN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d+)~\)").unwrap());
static CONDITIONAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{(.*?)([><=])(.*?)\}").unwrap());

/// First contiguous "safe" run inside a capture, used by `[n.K.t]`.
static SAFE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\w/.:?=&-]+").unwrap());

/// Substitute wildcard captures: `[n.K]` with the captured group, `[n.K.t]`
/// with its first safe run. Empty captures leave their directives in place.
pub fn substitute_captures(text: &str, captures: &[String; CAPTURE_SLOTS]) -> String {
    let mut out = text.to_string();
    for (slot, capture) in captures.iter().enumerate().skip(1) {
        if capture.is_empty() {
            continue;
        }
        out = out.replace(&format!("[n.{}]", slot), capture);
        if let Some(run) = SAFE_RUN.find(capture) {
            out = out.replace(&format!("[n.{}.t]", slot), run.as_str());
        }
    }
    out
}

/// Substitute context variables. Plain literal replacements, applied once
/// across the whole string.
pub fn substitute_context(text: &str, ctx: &MessageContext) -> String {
    text.replace("[qq]", &ctx.sender_id)
        .replace("[group]", &ctx.scope_id)
        .replace("[ai]", &ctx.self_id)
        .replace("[name]", &ctx.display_name)
        .replace("[card]", &ctx.display_name)
        .replace("[id]", &ctx.message_id)
        .replace("[消息id]", &ctx.message_id)
}

/// Expand `(A-B)` tokens, left to right, each with a freshly drawn uniform
/// integer in `[A, B]`. Inverted or unparsable ranges stop the pass with
/// the token left in place.
pub fn expand_random(text: &str) -> String {
    let mut out = text.to_string();
    while let Some(caps) = RANDOM.captures(&out) {
        let token = caps.get(0).unwrap().as_str().to_string();
        let (Ok(lo), Ok(hi)) = (caps[1].parse::<u64>(), caps[2].parse::<u64>()) else {
            warn!(token = %token, "Unparsable random range");
            break;
        };
        if lo > hi {
            warn!(token = %token, "Inverted random range");
            break;
        }
        let drawn = rand::thread_rng().gen_range(lo..=hi);
        out = out.replacen(&token, &drawn.to_string(), 1);
    }
    out
}

/// Expand `(Y) (M) (D) (h) (m) (s)` to the current local time components.
pub fn expand_time(text: &str) -> String {
    use chrono::{Datelike, Timelike};

    let now = Local::now();
    text.replace("(Y)", &now.year().to_string())
        .replace("(M)", &now.month().to_string())
        .replace("(D)", &now.day().to_string())
        .replace("(h)", &now.hour().to_string())
        .replace("(m)", &now.minute().to_string())
        .replace("(s)", &now.second().to_string())
}

/// Evaluate `(+EXPR)` tokens left to right. A failing expression leaves its
/// token untouched and halts the pass.
pub fn expand_arithmetic(text: &str) -> String {
    let mut out = text.to_string();
    while let Some(caps) = ARITHMETIC.captures(&out) {
        let token = caps.get(0).unwrap().as_str().to_string();
        match arith::evaluate(&caps[1]) {
            Ok(result) => {
                out = out.replacen(&token, &result, 1);
            }
            Err(e) => {
                warn!(token = %token, error = %e, "Arithmetic expansion failed");
                break;
            }
        }
    }
    out
}

/// Extract the cooldown directive `(N~)`.
///
/// The first directive determines the duration (`N = 0` means "until the
/// next local midnight"); all `(\d+~)` shapes are stripped from the text.
/// The duration is reported out-of-band so the caller can commit it only
/// after the reply is actually delivered.
pub fn extract_cooldown(text: &str) -> (String, Option<u64>) {
    let Some(caps) = COOLDOWN.captures(text) else {
        return (text.to_string(), None);
    };
    let Ok(mut seconds) = caps[1].parse::<u64>() else {
        warn!(token = &caps[0], "Unparsable cooldown directive");
        return (text.to_string(), None);
    };
    if seconds == 0 {
        seconds = seconds_until_midnight();
    }
    let stripped = COOLDOWN.replace_all(text, "").into_owned();
    (stripped, Some(seconds))
}

fn seconds_until_midnight() -> u64 {
    let now = Local::now().naive_local();
    let midnight = now
        .date()
        .checked_add_days(Days::new(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(now);
    (midnight - now).num_seconds().max(0) as u64
}

/// Evaluate the first `{A OP B}` block (OP in `>`, `<`, `=`).
///
/// Purely numeric operands compare as integers, anything else as raw
/// strings; mixed `>`/`<` comparisons are false. Returns the text with all
/// comparison blocks stripped when the condition holds, or `None` to
/// suppress the whole response.
pub fn apply_conditional(text: &str) -> Option<String> {
    let Some(caps) = CONDITIONAL.captures(text) else {
        return Some(text.to_string());
    };
    let (lhs, op, rhs) = (&caps[1], &caps[2], &caps[3]);

    let holds = match op {
        ">" => compare_ordered(lhs, rhs, |o| o == std::cmp::Ordering::Greater),
        "<" => compare_ordered(lhs, rhs, |o| o == std::cmp::Ordering::Less),
        _ => canonical(lhs) == canonical(rhs),
    };

    if holds {
        Some(CONDITIONAL.replace_all(text, "").into_owned())
    } else {
        None
    }
}

fn parse_numeric(value: &str) -> Option<i64> {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        value.parse().ok()
    } else {
        None
    }
}

/// Normalized form for `=` comparison: numeric operands collapse leading
/// zeros, everything else compares verbatim.
fn canonical(value: &str) -> String {
    match parse_numeric(value) {
        Some(n) => n.to_string(),
        None => value.to_string(),
    }
}

fn compare_ordered(lhs: &str, rhs: &str, check: impl Fn(std::cmp::Ordering) -> bool) -> bool {
    match (parse_numeric(lhs), parse_numeric(rhs)) {
        (Some(a), Some(b)) => check(a.cmp(&b)),
        (None, None) => check(lhs.cmp(rhs)),
        // Mixed numeric/string comparison has no defined order
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captures(pairs: &[(usize, &str)]) -> [String; CAPTURE_SLOTS] {
        let mut slots: [String; CAPTURE_SLOTS] = Default::default();
        for (slot, value) in pairs {
            slots[*slot] = value.to_string();
        }
        slots
    }

    #[test]
    fn test_capture_substitution() {
        let slots = captures(&[(1, "小明"), (2, "B")]);
        assert_eq!(
            substitute_captures("[n.1]对[n.2]说[n.1]", &slots),
            "小明对B说小明"
        );
    }

    #[test]
    fn test_empty_capture_leaves_directive() {
        let slots = captures(&[(1, "x")]);
        assert_eq!(substitute_captures("[n.2]!", &slots), "[n.2]!");
    }

    #[test]
    fn test_safe_run_filter() {
        let slots = captures(&[(1, "看 https://a.b/c?d=1 吧")]);
        let out = substitute_captures("[n.1.t]", &slots);
        assert_eq!(out, "https://a.b/c?d=1");
    }

    #[test]
    fn test_safe_run_without_match_leaves_directive() {
        let slots = captures(&[(1, "！！！")]);
        assert_eq!(substitute_captures("[n.1.t]", &slots), "[n.1.t]");
    }

    #[test]
    fn test_context_substitution() {
        let ctx = MessageContext::group("g9", "u7", "hi")
            .with_display_name("Ann")
            .with_message_id("m1")
            .with_self_id("bot");
        let out = substitute_context("[name]([qq])在[group]对[ai]说,id=[id]/[消息id]", &ctx);
        assert_eq!(out, "Ann(u7)在g9对bot说,id=m1/m1");
    }

    #[test]
    fn test_random_fixed_range() {
        assert_eq!(expand_random("roll (10-10)!"), "roll 10!");
    }

    #[test]
    fn test_random_range_bounds() {
        for _ in 0..50 {
            let out = expand_random("(1-3)");
            assert!(["1", "2", "3"].contains(&out.as_str()), "got {}", out);
        }
    }

    #[test]
    fn test_random_independent_draws() {
        let out = expand_random("(0-9)(0-9)(0-9)(0-9)");
        assert_eq!(out.len(), 4);
        assert!(out.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_random_inverted_range_left_in_place() {
        assert_eq!(expand_random("(9-1)"), "(9-1)");
    }

    #[test]
    fn test_time_expansion() {
        use chrono::Datelike;
        let out = expand_time("year=(Y)");
        assert_eq!(out, format!("year={}", Local::now().year()));
        assert!(!expand_time("(h):(m):(s)").contains('('));
    }

    #[test]
    fn test_arithmetic_expansion() {
        assert_eq!(expand_arithmetic("result (+2+3*4)"), "result 14");
    }

    #[test]
    fn test_arithmetic_failure_halts_pass() {
        // The failing first token also shields the later valid one
        assert_eq!(expand_arithmetic("(+1/0) and (+1+1)"), "(+1/0) and (+1+1)");
    }

    #[test]
    fn test_cooldown_extraction() {
        let (text, secs) = extract_cooldown("答案(3600~)");
        assert_eq!(text, "答案");
        assert_eq!(secs, Some(3600));
    }

    #[test]
    fn test_cooldown_strips_all_occurrences() {
        let (text, secs) = extract_cooldown("a(60~)b(120~)c");
        assert_eq!(text, "abc");
        assert_eq!(secs, Some(60));
    }

    #[test]
    fn test_cooldown_zero_means_until_midnight() {
        let (_, secs) = extract_cooldown("(0~)");
        let secs = secs.unwrap();
        assert!(secs > 0 && secs <= 86_400);
    }

    #[test]
    fn test_no_cooldown_directive() {
        let (text, secs) = extract_cooldown("plain");
        assert_eq!(text, "plain");
        assert_eq!(secs, None);
    }

    #[test]
    fn test_conditional_true_strips_block() {
        assert_eq!(apply_conditional("{5>3}ok").unwrap(), "ok");
        assert_eq!(apply_conditional("{1<2}yes").unwrap(), "yes");
        assert_eq!(apply_conditional("{a=a}eq").unwrap(), "eq");
    }

    #[test]
    fn test_conditional_false_suppresses() {
        assert!(apply_conditional("{3>5}ok").is_none());
        assert!(apply_conditional("{a=b}ok").is_none());
    }

    #[test]
    fn test_conditional_numeric_not_lexicographic() {
        assert_eq!(apply_conditional("{10>9}ok").unwrap(), "ok");
    }

    #[test]
    fn test_conditional_numeric_equality_normalizes() {
        assert_eq!(apply_conditional("{05=5}ok").unwrap(), "ok");
    }

    #[test]
    fn test_conditional_mixed_ordering_is_false() {
        assert!(apply_conditional("{abc>5}ok").is_none());
    }

    #[test]
    fn test_no_conditional_passes_through() {
        assert_eq!(apply_conditional("plain").unwrap(), "plain");
    }
}
