//! Message parser - Parses raw messages into structured messages

use crate::domain::entities::{Content, Message, MessageType, User};

/// Parses incoming messages into structured Message objects
pub struct MessageParser {
    command_prefix: String,
}

impl MessageParser {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            command_prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.command_prefix
    }

    /// Parse a text message
    pub fn parse(
        &self,
        chat_id: impl Into<String>,
        text: impl Into<String>,
        sender: Option<User>,
        group_id: Option<&str>,
    ) -> Message {
        let text = text.into();
        let trimmed = text.trim();

        let mut message = match self.strip_prefix(trimmed) {
            Some(cmd_text) => Self::parse_command(chat_id, cmd_text),
            None => Message::new(chat_id, Content::Text(text.clone()))
                .with_message_type(MessageType::Text),
        };

        if let Some(group) = group_id {
            message = message.in_group(group);
        }
        message.with_sender_opt(sender)
    }

    fn strip_prefix<'a>(&self, text: &'a str) -> Option<&'a str> {
        if !self.command_prefix.is_empty() {
            if let Some(rest) = text.strip_prefix(self.command_prefix.as_str()) {
                return Some(rest);
            }
        }
        text.strip_prefix('/')
    }

    /// Parse a command message
    fn parse_command(chat_id: impl Into<String>, cmd_text: &str) -> Message {
        let mut parts = cmd_text.split_whitespace();
        let name = parts.next().unwrap_or("").to_string();
        let args = parts.map(str::to_string).collect();

        Message::new(chat_id, Content::Command { name, args })
            .with_message_type(MessageType::Command)
    }
}

impl Message {
    /// Helper to set sender as Option
    pub fn with_sender_opt(mut self, user: Option<User>) -> Self {
        if let Some(u) = user {
            self.sender = Some(u);
        }
        self
    }

    /// Helper for MessageType
    pub fn with_message_type(mut self, mt: MessageType) -> Self {
        self.message_type = mt;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::GroupRole;

    #[test]
    fn test_parse_command_with_prefix() {
        let parser = MessageParser::new("#");
        let sender = User::new("10001").with_role(GroupRole::Admin);
        let msg = parser.parse("20000", "#enable jrrp global", Some(sender), Some("20000"));

        assert_eq!(msg.message_type, MessageType::Command);
        assert_eq!(
            msg.content,
            Content::Command { name: "enable".to_string(), args: vec!["jrrp".to_string(), "global".to_string()] }
        );
        assert_eq!(msg.group_id.as_deref(), Some("20000"));
        assert_eq!(msg.sender_id(), "10001");
    }

    #[test]
    fn test_slash_always_works() {
        let parser = MessageParser::new("#");
        let msg = parser.parse("c", "/抽签", None, None);
        assert_eq!(msg.content, Content::Command { name: "抽签".to_string(), args: vec![] });
        assert!(!msg.is_group());
    }

    #[test]
    fn test_plain_text() {
        let parser = MessageParser::new("/");
        let msg = parser.parse("c", "hello there", None, None);
        assert_eq!(msg.content, Content::Text("hello there".to_string()));
        assert_eq!(msg.message_type, MessageType::Text);
    }
}
