use serde::{Deserialize, Serialize};
use std::fmt;

/// Sender's role inside a group chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GroupRole {
    #[default]
    Member,
    Admin,
    Owner,
}

impl GroupRole {
    pub fn as_str(&self) -> &str {
        match self {
            GroupRole::Member => "member",
            GroupRole::Admin => "admin",
            GroupRole::Owner => "owner",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.to_lowercase().as_str() {
            "member" => Some(GroupRole::Member),
            "admin" => Some(GroupRole::Admin),
            "owner" => Some(GroupRole::Owner),
            _ => None,
        }
    }

    pub fn is_group_admin(&self) -> bool {
        matches!(self, GroupRole::Admin | GroupRole::Owner)
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a message sender
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub id: String,
    pub nickname: Option<String>,
    pub role: GroupRole,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            nickname: None,
            role: GroupRole::Member,
        }
    }

    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn with_role(mut self, role: GroupRole) -> Self {
        self.role = role;
        self
    }

    pub fn display_name(&self) -> String {
        match self.nickname {
            Some(ref nickname) => nickname.clone(),
            None => self.id.clone(),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
