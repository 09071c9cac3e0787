//! Outgoing message segments.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One unit of an outgoing composite message.
///
/// The ordered segment sequence is handed to the host adapter, which renders
/// it with whatever the target platform supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text.
    Text { text: String },
    /// Remote image, fetched by URL.
    ImageUrl { url: String },
    /// Local image, resolved against the media cache directory.
    ImagePath { path: PathBuf },
    /// Mention a user.
    At { user_id: String },
    /// Platform emoji/face by numeric id.
    Face { id: String },
    /// Reply-quote an earlier message.
    Reply { message_id: String },
    /// Audio clip by URL.
    Record { url: String },
    /// Poke/nudge a user within a scope.
    Poke { target_id: String, scope_id: String },
}

impl Segment {
    /// Create a plain-text segment.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text of this segment, if it is plain text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}
