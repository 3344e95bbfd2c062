use super::User;
use chrono::{DateTime, Utc};

/// Type of message content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    Text,
    Command,
    Other(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Text => "text",
            MessageType::Command => "command",
            MessageType::Other(s) => s,
        }
    }
}

/// Message content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Command { name: String, args: Vec<String> },
    Empty,
}

impl Content {
    pub fn text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_command(&self) -> bool {
        matches!(self, Content::Command { .. })
    }

    /// Command arguments, empty for non-command content
    pub fn args(&self) -> &[String] {
        match self {
            Content::Command { args, .. } => args,
            _ => &[],
        }
    }
}

/// Represents an incoming or outgoing message
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    /// Set when the message was posted in a group chat
    pub group_id: Option<String>,
    pub sender: Option<User>,
    pub content: Content,
    pub message_type: MessageType,
    pub timestamp: DateTime<Utc>,
    pub platform: String,
}

impl Message {
    pub fn new(chat_id: impl Into<String>, content: Content) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            group_id: None,
            sender: None,
            content,
            message_type: MessageType::Text,
            timestamp: Utc::now(),
            platform: "unknown".to_string(),
        }
    }

    pub fn from_text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(chat_id, Content::Text(text.into()))
    }

    pub fn from_command(chat_id: impl Into<String>, name: impl Into<String>, args: Vec<String>) -> Self {
        let mut msg = Self::new(chat_id, Content::Command { name: name.into(), args });
        msg.message_type = MessageType::Command;
        msg
    }

    /// Mark the message as posted in `group_id`; the chat becomes the group
    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        let group_id = group_id.into();
        self.chat_id = group_id.clone();
        self.group_id = Some(group_id);
        self
    }

    pub fn with_sender(mut self, user: User) -> Self {
        self.sender = Some(user);
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn is_group(&self) -> bool {
        self.group_id.is_some()
    }

    /// Sender id, falling back to the chat id for private chats without sender info
    pub fn sender_id(&self) -> &str {
        self.sender
            .as_ref()
            .map(|u| u.id.as_str())
            .unwrap_or(&self.chat_id)
    }
}
