//! Core types for retort.

mod context;
mod match_result;
mod rule;
mod segment;

pub use context::MessageContext;
pub use match_result::{MatchKind, MatchResult, CAPTURE_SLOTS};
pub use rule::{Document, Rule, Visibility};
pub use segment::Segment;
