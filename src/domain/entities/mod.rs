//! Domain entities - Core business objects with no external dependencies

pub mod command;
pub mod cooldown;
pub mod message;
pub mod plugin;
pub mod rule;
pub mod scope;
pub mod snapshot;
pub mod user;

pub use command::{Command, CommandRegistry};
pub use cooldown::{CooldownRecord, UsageRecord};
pub use message::{Content, Message, MessageType};
pub use plugin::{PermissionLevel, PluginDescriptor, PluginRecord, PluginStatus};
pub use rule::{Effect, PermissionRule, RuleTarget, Subject};
pub use scope::{PluginKey, Scope};
pub use snapshot::Snapshot;
pub use user::{GroupRole, User};
