//! retort-core - Core library for retort.
//!
//! This crate provides the keyword-triggered response engine: per-scope
//! lexicon documents, exact/fuzzy/wildcard matching, template expansion
//! into typed message segments, and per-user cooldown tracking.
//!
//! # Example
//!
//! ```ignore
//! use retort_core::{Engine, EngineConfig, MessageContext, Outcome};
//!
//! let config = EngineConfig::with_data_dir("/var/lib/retort");
//! let engine = Engine::new(config).await?;
//!
//! // Handle an incoming message
//! let ctx = MessageContext::group("group42", "user7", "你好");
//! match engine.handle_message(&ctx).await {
//!     Outcome::Reply { segments, pending_cooldown } => {
//!         // send segments, then:
//!         if let Some(pending) = pending_cooldown {
//!             engine.commit_cooldown(pending).await;
//!         }
//!     }
//!     _ => {}
//! }
//! ```

pub mod commands;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod store;
pub mod template;
pub mod types;

// Re-export commonly used types
pub use commands::AdminCommand;
pub use config::EngineConfig;
pub use cooldown::{CooldownLedger, CooldownState};
pub use engine::{Engine, Outcome, PendingCooldown};
pub use error::{RetortError, RetortResult};
pub use store::{LexiconStore, BUILTIN_LEXICON_ID};
pub use template::{Rendered, TemplateEngine};
pub use types::{
    Document, MatchKind, MatchResult, MessageContext, Rule, Segment, Visibility, CAPTURE_SLOTS,
};
