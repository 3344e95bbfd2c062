use serde::{Deserialize, Serialize};
use std::fmt;

use super::user::GroupRole;

/// Outcome of a permission check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn is_allow(&self) -> bool {
        matches!(self, Effect::Allow)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "allow",
            Effect::Deny => "deny",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "allow" => Some(Effect::Allow),
            "deny" => Some(Effect::Deny),
            _ => None,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a rule applies to. `group: None` means every group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    User { user_id: String, group: Option<String> },
    Role { role: GroupRole, group: Option<String> },
    Group { group_id: String },
}

impl Subject {
    pub fn user(user_id: impl Into<String>, group: Option<&str>) -> Self {
        Subject::User {
            user_id: user_id.into(),
            group: group.map(str::to_string),
        }
    }

    pub fn role(role: GroupRole, group: Option<&str>) -> Self {
        Subject::Role {
            role,
            group: group.map(str::to_string),
        }
    }

    pub fn group(group_id: impl Into<String>) -> Self {
        Subject::Group {
            group_id: group_id.into(),
        }
    }

    /// Whether this subject's rules are visible from `group_id`
    pub fn concerns_group(&self, group_id: &str) -> bool {
        match self {
            Subject::User { group, .. } | Subject::Role { group, .. } => {
                group.as_deref().map_or(true, |g| g == group_id)
            }
            Subject::Group { group_id: g } => g == group_id,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::User { user_id, group: Some(g) } => write!(f, "user:{} in {}", user_id, g),
            Subject::User { user_id, group: None } => write!(f, "user:{}@global", user_id),
            Subject::Role { role, group: Some(g) } => write!(f, "role:{} in {}", role, g),
            Subject::Role { role, group: None } => write!(f, "role:{}@global", role),
            Subject::Group { group_id } => write!(f, "group:{}", group_id),
        }
    }
}

/// What a rule applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum RuleTarget {
    Command(String),
    Plugin(String),
}

impl fmt::Display for RuleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleTarget::Command(name) => write!(f, "command:{}", name),
            RuleTarget::Plugin(name) => write!(f, "plugin:{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub subject: Subject,
    pub target: RuleTarget,
    pub effect: Effect,
}

impl PermissionRule {
    pub fn new(subject: Subject, target: RuleTarget, effect: Effect) -> Self {
        Self { subject, target, effect }
    }
}

impl fmt::Display for PermissionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} for {}", self.effect, self.target, self.subject)
    }
}
