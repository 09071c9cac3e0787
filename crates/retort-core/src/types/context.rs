//! Incoming message context supplied by the host messaging collaborator.

/// Context for one incoming message event.
///
/// The host adapter supplies all identity and privilege information; the
/// engine performs no authentication of its own.
#[derive(Debug, Clone, Default)]
pub struct MessageContext {
    /// Sender's user id.
    pub sender_id: String,
    /// Conversational scope (group/channel) id; empty for direct messages.
    pub scope_id: String,
    /// Sender's display name.
    pub display_name: String,
    /// Id of the incoming message.
    pub message_id: String,
    /// The bot's own id.
    pub self_id: String,
    /// Plain text of the incoming message.
    pub raw_text: String,
    /// Whether the sender holds admin privilege.
    pub is_privileged: bool,
}

impl MessageContext {
    /// Create a context for a group message.
    pub fn group(
        scope_id: impl Into<String>,
        sender_id: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            scope_id: scope_id.into(),
            sender_id: sender_id.into(),
            raw_text: raw_text.into(),
            ..Default::default()
        }
    }

    /// Create a context for a direct (one-to-one) message.
    pub fn direct(sender_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            raw_text: raw_text.into(),
            ..Default::default()
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Set the message id.
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = id.into();
        self
    }

    /// Set the bot's own id.
    pub fn with_self_id(mut self, id: impl Into<String>) -> Self {
        self.self_id = id.into();
        self
    }

    /// Mark the sender as privileged.
    pub fn privileged(mut self) -> Self {
        self.is_privileged = true;
        self
    }

    /// Whether this message arrived outside any group scope.
    pub fn is_direct(&self) -> bool {
        self.scope_id.is_empty()
    }
}
