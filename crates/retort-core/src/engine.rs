//! Engine facade: one entry point per incoming message event.
//!
//! Wires the store, matcher, template engine, and cooldown ledger together.
//! The host adapter calls [`Engine::handle_message`] per event and acts on
//! the returned [`Outcome`]; cooldowns are committed separately so a failed
//! delivery never burns the user's cooldown.

use crate::commands::AdminCommand;
use crate::config::EngineConfig;
use crate::cooldown::{CooldownLedger, CooldownState};
use crate::error::RetortResult;
use crate::matcher;
use crate::store::LexiconStore;
use crate::template::TemplateEngine;
use crate::types::{MessageContext, Segment};

use tracing::debug;

/// A cooldown to commit once the reply has actually been delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCooldown {
    pub user_id: String,
    pub lexicon_id: String,
    pub rule_index: usize,
    pub seconds: u64,
}

/// What the host should do with one incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No rule matched, or the sender/scope is ignored. Send nothing.
    Ignored,
    /// An admin command ran; send its status line back.
    AdminReply(String),
    /// The matched rule is cooling down for this many more seconds.
    CoolingDown(u64),
    /// A rule matched but its conditional block suppressed the response.
    Suppressed,
    /// Send these segments, then commit the pending cooldown if present.
    Reply {
        segments: Vec<Segment>,
        pending_cooldown: Option<PendingCooldown>,
    },
}

/// The keyword-response engine.
pub struct Engine {
    config: EngineConfig,
    store: LexiconStore,
    ledger: CooldownLedger,
    template: TemplateEngine,
}

impl Engine {
    /// Build an engine rooted at the configured data directory.
    pub async fn new(config: EngineConfig) -> RetortResult<Self> {
        let store = LexiconStore::new(config.clone()).await?;
        let ledger = CooldownLedger::new(config.cooling_dir(), config.cooldown_flush_quiet());
        let template = TemplateEngine::new(config.media_cache_dir());
        Ok(Self {
            config,
            store,
            ledger,
            template,
        })
    }

    /// Process one incoming message event.
    pub async fn handle_message(&self, ctx: &MessageContext) -> Outcome {
        if self.config.ignore_scopes.contains(&ctx.scope_id)
            || self.config.ignore_users.contains(&ctx.sender_id)
        {
            return Outcome::Ignored;
        }

        let text = ctx.raw_text.trim();
        if text.is_empty() {
            return Outcome::Ignored;
        }

        if ctx.is_privileged {
            if let Some(command) = AdminCommand::parse(text) {
                return Outcome::AdminReply(command.execute(&self.store, ctx).await);
            }
        }

        let Some(hit) = matcher::search(
            &self.store,
            text,
            &ctx.scope_id,
            &ctx.sender_id,
            ctx.is_privileged,
        )
        .await
        else {
            return Outcome::Ignored;
        };

        if let CooldownState::Cooling(remaining) = self
            .ledger
            .check(&ctx.sender_id, &hit.lexicon_id, hit.rule_index)
            .await
        {
            debug!(
                user_id = %ctx.sender_id,
                lexicon_id = %hit.lexicon_id,
                rule_index = hit.rule_index,
                remaining,
                "Matched rule is cooling down"
            );
            return Outcome::CoolingDown(remaining);
        }

        let Some(rendered) = self.template.render(&hit, ctx) else {
            return Outcome::Suppressed;
        };

        let pending_cooldown = rendered.cooldown_secs.map(|seconds| PendingCooldown {
            user_id: ctx.sender_id.clone(),
            lexicon_id: hit.lexicon_id.clone(),
            rule_index: hit.rule_index,
            seconds,
        });

        Outcome::Reply {
            segments: rendered.segments,
            pending_cooldown,
        }
    }

    /// Commit a cooldown after the reply was delivered.
    pub async fn commit_cooldown(&self, pending: PendingCooldown) {
        self.ledger
            .set(
                &pending.user_id,
                &pending.lexicon_id,
                pending.rule_index,
                pending.seconds,
            )
            .await;
    }

    /// Flush pending durable state. Call on shutdown.
    pub async fn shutdown(&self) {
        self.ledger.flush_now().await;
    }

    /// The lexicon store backing this engine.
    pub fn store(&self) -> &LexiconStore {
        &self.store
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
