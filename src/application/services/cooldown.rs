//! Cooldown tracker - per-group cooldowns and per-user last use

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::domain::entities::{CooldownRecord, PluginKey, UsageRecord};

/// Per-group cooldown durations and the last time each user triggered them.
/// Cooldowns only exist inside groups.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    durations: BTreeMap<(String, PluginKey), u64>,
    usage: BTreeMap<(String, String, PluginKey), DateTime<Utc>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configured cooldown in seconds, 0 when none
    pub fn duration(&self, key: &PluginKey, group_id: &str) -> u64 {
        self.durations
            .get(&(group_id.to_string(), key.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Set the cooldown for `key` in `group_id`; 0 removes it.
    /// Returns the previous duration.
    pub fn set(&mut self, key: &PluginKey, group_id: &str, seconds: u64) -> u64 {
        let slot = (group_id.to_string(), key.clone());
        let previous = if seconds > 0 {
            self.durations.insert(slot, seconds)
        } else {
            self.usage
                .retain(|(group, _, used), _| !(group == group_id && used == key));
            self.durations.remove(&slot)
        };
        tracing::info!("Cooldown for {} in group {}: {}s", key, group_id, seconds);
        previous.unwrap_or(0)
    }

    /// The key a command's usage is counted under: its feature when that
    /// feature has its own cooldown, otherwise the parent plugin.
    pub fn effective_key(&self, key: &PluginKey, group_id: &str) -> PluginKey {
        if key.is_feature() && self.duration(key, group_id) == 0 {
            key.parent()
        } else {
            key.clone()
        }
    }

    /// Seconds left before `user_id` may trigger `key` again, 0 when ready
    pub fn remaining(&self, key: &PluginKey, group_id: &str, user_id: &str, now: DateTime<Utc>) -> u64 {
        let duration = self.duration(key, group_id);
        if duration == 0 {
            return 0;
        }

        let Some(last) = self
            .usage
            .get(&(group_id.to_string(), user_id.to_string(), key.clone()))
        else {
            return 0;
        };

        let window_ms = i64::try_from(duration.saturating_mul(1000)).unwrap_or(i64::MAX);
        let elapsed_ms = now.signed_duration_since(*last).num_milliseconds().max(0);
        if elapsed_ms >= window_ms {
            0
        } else {
            ((window_ms - elapsed_ms) as u64 + 999) / 1000
        }
    }

    /// Record a use. Nothing is stored when `key` has no cooldown.
    pub fn touch(&mut self, key: &PluginKey, group_id: &str, user_id: &str, now: DateTime<Utc>) -> bool {
        if self.duration(key, group_id) == 0 {
            return false;
        }
        self.usage
            .insert((group_id.to_string(), user_id.to_string(), key.clone()), now);
        true
    }

    /// Drop usage entries whose cooldown has run out. Returns how many went.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.usage.len();
        let durations = &self.durations;
        self.usage.retain(|(group, _, key), last| {
            let duration = durations
                .get(&(group.clone(), key.clone()))
                .copied()
                .unwrap_or(0);
            let window = i64::try_from(duration).unwrap_or(i64::MAX);
            duration > 0 && now.signed_duration_since(*last).num_seconds() < window
        });
        before - self.usage.len()
    }

    /// Cooldowns configured in `group_id`
    pub fn durations_for(&self, group_id: &str) -> Vec<(PluginKey, u64)> {
        self.durations
            .iter()
            .filter(|((group, _), _)| group == group_id)
            .map(|((_, key), &seconds)| (key.clone(), seconds))
            .collect()
    }

    pub fn records(&self) -> Vec<CooldownRecord> {
        self.durations
            .iter()
            .map(|((group_id, key), &seconds)| CooldownRecord {
                group_id: group_id.clone(),
                key: key.clone(),
                seconds,
            })
            .collect()
    }

    pub fn usage_records(&self) -> Vec<UsageRecord> {
        self.usage
            .iter()
            .map(|((group_id, user_id, key), &last_used)| UsageRecord {
                group_id: group_id.clone(),
                user_id: user_id.clone(),
                key: key.clone(),
                last_used,
            })
            .collect()
    }

    pub fn restore(&mut self, cooldowns: Vec<CooldownRecord>, usage: Vec<UsageRecord>) {
        self.durations = cooldowns
            .into_iter()
            .filter(|c| c.seconds > 0)
            .map(|c| ((c.group_id, c.key), c.seconds))
            .collect();
        self.usage = usage
            .into_iter()
            .map(|u| ((u.group_id, u.user_id, u.key), u.last_used))
            .collect();
    }
}
