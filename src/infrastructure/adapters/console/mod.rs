//! Console adapter for development/testing
//!
//! Reads lines from stdin and feeds them to the dispatcher as if they were
//! chat messages. Lines starting with `:` change who is talking and where:
//! `:as <user> [member|admin|owner]`, `:group <id>`, `:private`, `:quit`.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::application::errors::BotError;
use crate::application::messaging::MessageDispatcher;
use crate::domain::entities::{GroupRole, User};
use crate::domain::traits::{Bot, BotInfo};
use crate::infrastructure::config::ConsoleConfig;

/// The simulated sender and chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub role: GroupRole,
    pub group_id: Option<String>,
}

impl From<&ConsoleConfig> for Session {
    fn from(config: &ConsoleConfig) -> Self {
        Self {
            user_id: config.user_id.clone(),
            role: config.role,
            group_id: config.group_id.clone(),
        }
    }
}

impl Session {
    fn chat_id(&self) -> String {
        self.group_id
            .clone()
            .unwrap_or_else(|| format!("private:{}", self.user_id))
    }

    fn describe(&self) -> String {
        match &self.group_id {
            Some(group) => format!("user {} ({}) in group {}", self.user_id, self.role, group),
            None => format!("user {} in a private chat", self.user_id),
        }
    }
}

/// What to do with one console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Reply(String),
    Silent,
    Quit,
}

/// Console bot adapter for local development
pub struct ConsoleAdapter {
    info: BotInfo,
    dispatcher: Arc<MessageDispatcher>,
    session: Mutex<Session>,
}

impl ConsoleAdapter {
    pub fn new(name: impl Into<String>, dispatcher: Arc<MessageDispatcher>, session: Session) -> Self {
        Self {
            info: BotInfo {
                id: "console".to_string(),
                name: name.into(),
                username: "console".to_string(),
            },
            dispatcher,
            session: Mutex::new(session),
        }
    }

    pub fn session(&self) -> Result<Session, BotError> {
        self.session
            .lock()
            .map(|s| s.clone())
            .map_err(|_| BotError::Internal("Lock poisoned".to_string()))
    }

    /// Handle one input line: a meta-command or a chat message
    pub fn handle_line(&self, line: &str) -> Result<LineOutcome, BotError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(LineOutcome::Silent);
        }

        if let Some(meta) = line.strip_prefix(':') {
            return self.handle_meta(meta);
        }

        let session = self.session()?;
        let sender = User::new(session.user_id.clone()).with_role(session.role);
        let reply = self.dispatcher.process_text(
            session.chat_id(),
            line,
            Some(sender),
            session.group_id.as_deref(),
        )?;

        Ok(reply.map_or(LineOutcome::Silent, LineOutcome::Reply))
    }

    fn handle_meta(&self, meta: &str) -> Result<LineOutcome, BotError> {
        let mut session = self.session
            .lock()
            .map_err(|_| BotError::Internal("Lock poisoned".to_string()))?;
        let parts: Vec<&str> = meta.split_whitespace().collect();

        match parts.as_slice() {
            ["quit"] | ["exit"] => return Ok(LineOutcome::Quit),
            ["as", user] => {
                session.user_id = user.to_string();
                session.role = GroupRole::Member;
            }
            ["as", user, role] => {
                let Some(role) = GroupRole::parse(role) else {
                    return Ok(LineOutcome::Reply(format!("Unknown role: {}", role)));
                };
                session.user_id = user.to_string();
                session.role = role;
            }
            ["group", id] => session.group_id = Some(id.to_string()),
            ["private"] => session.group_id = None,
            ["whoami"] => {}
            _ => {
                return Ok(LineOutcome::Reply(
                    "Meta commands: :as <user> [member|admin|owner], :group <id>, :private, :whoami, :quit".to_string(),
                ))
            }
        }

        Ok(LineOutcome::Reply(format!("Now {}", session.describe())))
    }
}

#[async_trait]
impl Bot for ConsoleAdapter {
    async fn start(&self) -> Result<(), BotError> {
        tracing::info!("Starting console bot (dev mode)");
        println!("{} console. Type :quit to leave.", self.info.name);
        println!("Now {}", self.session()?.describe());

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| BotError::Adapter(format!("Failed to read stdin: {}", e)))?
        {
            match self.handle_line(&line) {
                Ok(LineOutcome::Reply(text)) => {
                    let chat_id = self.session()?.chat_id();
                    self.send_message(&chat_id, &text).await?;
                }
                Ok(LineOutcome::Silent) => {}
                Ok(LineOutcome::Quit) => break,
                Err(e) => tracing::error!("Error handling line: {}", e),
            }
        }

        tracing::info!("Console closed");
        Ok(())
    }

    async fn send_message(&self, _chat_id: &str, text: &str) -> Result<String, BotError> {
        println!("[BOT] {}", text);
        Ok("console_msg".to_string())
    }

    fn bot_info(&self) -> BotInfo {
        self.info.clone()
    }
}
