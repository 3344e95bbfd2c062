use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scope::PluginKey;

/// Cooldown duration configured for a plugin or feature in one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownRecord {
    pub group_id: String,
    pub key: PluginKey,
    pub seconds: u64,
}

/// Last time a user triggered a cooled-down plugin or feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub group_id: String,
    pub user_id: String,
    pub key: PluginKey,
    pub last_used: DateTime<Utc>,
}
