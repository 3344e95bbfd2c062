use serde::{Deserialize, Serialize};

use super::cooldown::{CooldownRecord, UsageRecord};
use super::plugin::PluginRecord;
use super::rule::PermissionRule;

/// Everything the management layer persists between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub plugins: Vec<PluginRecord>,
    #[serde(default)]
    pub rules: Vec<PermissionRule>,
    #[serde(default)]
    pub cooldowns: Vec<CooldownRecord>,
    #[serde(default)]
    pub usage: Vec<UsageRecord>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
            && self.rules.is_empty()
            && self.cooldowns.is_empty()
            && self.usage.is_empty()
    }
}
