//! Access gate for messages sent to the bot.
//!
//! Only users on the allow-list get answers to their commands. Everyone else receives a denial
//! when they issue a command, and is otherwise ignored.

use crate::client::BotClient;
use crate::config::Config;
use crate::errors::Result;
use crate::metrics_defs::GATE_MESSAGES;
use crate::types::{Message, Update};
use shared::counter;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;

pub const WELCOME_TEXT: &str = "👋 Здравствуйте! Этот бот пересылает в чат заявки с сайта.";
pub const HELP_TEXT: &str = "Доступные команды:\n/start - приветствие\n/help - список команд";
pub const ACCESS_DENIED_TEXT: &str = "⛔ Доступ запрещён.";

const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    Deny,
    Welcome,
    Help,
    Ignore,
}

impl GateDecision {
    pub const fn as_str(&self) -> &'static str {
        match self {
            GateDecision::Deny => "deny",
            GateDecision::Welcome => "welcome",
            GateDecision::Help => "help",
            GateDecision::Ignore => "ignore",
        }
    }

    pub const fn reply_text(&self) -> Option<&'static str> {
        match self {
            GateDecision::Deny => Some(ACCESS_DENIED_TEXT),
            GateDecision::Welcome => Some(WELCOME_TEXT),
            GateDecision::Help => Some(HELP_TEXT),
            GateDecision::Ignore => None,
        }
    }
}

/// Extracts the command name from `/name@bot args`.
fn parse_command(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('/')?;
    let token = rest.split_whitespace().next().unwrap_or_default();
    token.split('@').next().filter(|name| !name.is_empty())
}

pub struct AccessGate {
    client: BotClient,
    authorized: HashSet<i64>,
    poll_timeout_secs: u64,
    retry_delay: Duration,
}

impl AccessGate {
    /// Returns `None` when the allow-list is empty, which disables the gate.
    pub fn new(client: BotClient, config: &Config) -> Option<Self> {
        if !config.gate_enabled() {
            return None;
        }

        Some(AccessGate {
            client,
            authorized: config.authorized_users.iter().copied().collect(),
            poll_timeout_secs: config.poll_timeout_secs,
            retry_delay: POLL_RETRY_DELAY,
        })
    }

    pub fn decide(&self, message: &Message) -> GateDecision {
        let text = message.text.as_deref().unwrap_or_default();
        let sender = message.from.as_ref().map(|user| user.id);

        match sender {
            Some(id) if self.authorized.contains(&id) => match parse_command(text) {
                Some("start") => GateDecision::Welcome,
                Some("help") => GateDecision::Help,
                _ => GateDecision::Ignore,
            },
            Some(_) if text.starts_with('/') => GateDecision::Deny,
            _ => GateDecision::Ignore,
        }
    }

    pub async fn handle_update(&self, update: &Update) -> Result<GateDecision> {
        let Some(message) = &update.message else {
            return Ok(GateDecision::Ignore);
        };

        let decision = self.decide(message);
        counter!(GATE_MESSAGES, "decision" => decision.as_str()).increment(1);

        if decision == GateDecision::Deny {
            tracing::warn!(
                user_id = message.from.as_ref().map(|u| u.id),
                chat_id = message.chat.id,
                "Rejected command from unauthorized user"
            );
        }

        if let Some(text) = decision.reply_text() {
            self.client
                .reply(
                    &message.chat.id.to_string(),
                    text,
                    None,
                    Some(message.message_id),
                )
                .await?;
        }

        Ok(decision)
    }

    /// Polls for updates until the task is dropped. Failures are logged and retried.
    pub async fn run(self) {
        tracing::info!(
            authorized_users = self.authorized.len(),
            "Access gate listening for messages"
        );

        let mut offset: Option<i64> = None;

        loop {
            let updates = match self
                .client
                .get_updates(offset, self.poll_timeout_secs)
                .await
            {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to poll for updates");
                    sleep(self.retry_delay).await;
                    continue;
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);
                if let Err(e) = self.handle_update(&update).await {
                    tracing::error!(
                        update_id = update.update_id,
                        error = %e,
                        "Failed to answer message"
                    );
                }
            }
        }
    }
}
