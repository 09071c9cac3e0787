//! Admin text-command surface.
//!
//! Privileged senders manage lexicons through free-text commands evaluated
//! ahead of generic matching. Every command resolves against the same
//! lexicon the sender would match against, and every outcome is reported as
//! a short human-readable status line rather than an error.

use tracing::{error, info};

use crate::error::RetortError;
use crate::store::LexiconStore;
use crate::types::{MessageContext, Visibility};

/// A parsed admin command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// 精准问答: add a rule that fires only on an exact text match.
    AddExact { pattern: String, response: String },
    /// 模糊问答: add a rule that fires on a substring match.
    AddFuzzy { pattern: String, response: String },
    /// 加选项: append another response template to an existing rule.
    AppendResponse { pattern: String, response: String },
    /// 删词: remove a rule and all its responses.
    RemoveRule { pattern: String },
    /// 查词: list rules, optionally filtered by a pattern substring.
    ListRules { filter: String },
    /// 词库清空: replace the resolved document with an empty one.
    ClearLexicon,
    /// 词库备份: write a point-in-time copy of the resolved document.
    BackupLexicon,
    /// 切换词库: set and persist this user's lexicon override.
    SwitchLexicon { name: String },
}

impl AdminCommand {
    /// Parse a message as an admin command. Returns `None` when the text is
    /// not command-shaped, so it falls through to generic matching.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();

        if let Some(rest) = text.strip_prefix("精准问答") {
            let (pattern, response) = split_pattern_response(rest)?;
            return Some(Self::AddExact { pattern, response });
        }
        if let Some(rest) = text.strip_prefix("模糊问答") {
            let (pattern, response) = split_pattern_response(rest)?;
            return Some(Self::AddFuzzy { pattern, response });
        }
        if let Some(rest) = text.strip_prefix("加选项") {
            let (pattern, response) = split_pattern_response(rest)?;
            return Some(Self::AppendResponse { pattern, response });
        }
        if let Some(rest) = text.strip_prefix("删词") {
            let pattern = rest.trim();
            if pattern.is_empty() {
                return None;
            }
            return Some(Self::RemoveRule {
                pattern: pattern.to_string(),
            });
        }
        if let Some(rest) = text.strip_prefix("查词") {
            return Some(Self::ListRules {
                filter: rest.trim().to_string(),
            });
        }
        if text == "词库清空" {
            return Some(Self::ClearLexicon);
        }
        if text == "词库备份" {
            return Some(Self::BackupLexicon);
        }
        if let Some(rest) = text.strip_prefix("切换词库") {
            let name = rest.trim();
            if name.is_empty() {
                return None;
            }
            return Some(Self::SwitchLexicon {
                name: name.to_string(),
            });
        }

        None
    }

    /// Run the command against the store, returning the status line to send
    /// back. User-input faults come back as their message text.
    pub async fn execute(self, store: &LexiconStore, ctx: &MessageContext) -> String {
        let scope = ctx.scope_id.as_str();
        let user = ctx.sender_id.as_str();

        match self {
            Self::AddExact { pattern, response } => {
                match store
                    .add_rule(scope, user, &pattern, &response, Visibility::Exact)
                    .await
                {
                    Ok(()) => {
                        info!(user_id = %user, pattern = %pattern, "Added exact rule");
                        "添加成功".to_string()
                    }
                    Err(e) => fault_status(e),
                }
            }
            Self::AddFuzzy { pattern, response } => {
                match store
                    .add_rule(scope, user, &pattern, &response, Visibility::Fuzzy)
                    .await
                {
                    Ok(()) => {
                        info!(user_id = %user, pattern = %pattern, "Added fuzzy rule");
                        "添加成功".to_string()
                    }
                    Err(e) => fault_status(e),
                }
            }
            Self::AppendResponse { pattern, response } => {
                match store
                    .add_response_to_rule(scope, user, &pattern, &response)
                    .await
                {
                    Ok(()) => "添加成功".to_string(),
                    Err(e) => fault_status(e),
                }
            }
            Self::RemoveRule { pattern } => match store.remove_rule(scope, user, &pattern).await {
                Ok(()) => "删除成功".to_string(),
                Err(e) => fault_status(e),
            },
            Self::ListRules { filter } => {
                let lines = store.list_rules(scope, user, &filter).await;
                if lines.is_empty() {
                    return "未找到相关关键词".to_string();
                }
                let cap = store.config().list_display_cap;
                let mut out = String::from("关键词列表：");
                for line in lines.iter().take(cap) {
                    out.push('\n');
                    out.push_str(line);
                }
                if lines.len() > cap {
                    out.push_str(&format!("\n...还有 {} 个词条", lines.len() - cap));
                }
                out
            }
            Self::ClearLexicon => {
                // Too destructive for a group chat keystroke
                if !ctx.is_direct() {
                    return "请在私聊中使用此指令".to_string();
                }
                match store.clear_document(scope, user).await {
                    Ok(()) => "词库已清空".to_string(),
                    Err(e) => fault_status(e),
                }
            }
            Self::BackupLexicon => match store.backup_document(scope, user).await {
                Ok(path) => format!("备份完成: {}", path.display()),
                Err(e) => format!("备份失败: {}", e),
            },
            Self::SwitchLexicon { name } => {
                store.set_user_lexicon(user, &name).await;
                format!("已切换到词库: {}", name)
            }
        }
    }
}

/// Status text for a failed store operation: user-input faults surface
/// their message verbatim, anything else is logged and reported generically.
fn fault_status(e: RetortError) -> String {
    match e.user_message() {
        Some(message) => message.to_string(),
        None => {
            error!(error = %e, "Admin command failed");
            "操作失败".to_string()
        }
    }
}

/// Split `" <pattern> <response...>"` on the first whitespace run, keeping
/// the rest of the line as the response verbatim.
fn split_pattern_response(rest: &str) -> Option<(String, String)> {
    let rest = rest.trim_start();
    let mut parts = rest.splitn(2, char::is_whitespace);
    let pattern = parts.next()?.trim();
    let response = parts.next()?.trim();
    if pattern.is_empty() || response.is_empty() {
        return None;
    }
    Some((pattern.to_string(), response.to_string()))
}
