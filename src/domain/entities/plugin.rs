use serde::{Deserialize, Serialize};
use std::fmt;

use super::scope::{PluginKey, Scope};
use super::user::GroupRole;

/// Minimum standing required to use a plugin's commands when no rule applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionLevel {
    #[default]
    Everyone,
    GroupAdmin,
    SuperUser,
}

impl PermissionLevel {
    /// Whether a sender with `role` (and super-user status) meets this level
    pub fn admits(&self, role: GroupRole, is_superuser: bool) -> bool {
        match self {
            PermissionLevel::Everyone => true,
            PermissionLevel::GroupAdmin => is_superuser || role.is_group_admin(),
            PermissionLevel::SuperUser => is_superuser,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PermissionLevel::Everyone => "everyone",
            PermissionLevel::GroupAdmin => "group-admin",
            PermissionLevel::SuperUser => "super-user",
        }
    }
}

impl fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability descriptor a plugin registers at startup
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PluginDescriptor {
    pub name: String,

    #[serde(default)]
    pub display_name: Option<String>,

    /// Unset means enabled, and leaves an earlier descriptor's choice alone on merge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_enabled: Option<bool>,

    #[serde(default)]
    pub permission: PermissionLevel,

    #[serde(default)]
    pub features: Vec<String>,
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            default_enabled: None,
            permission: PermissionLevel::Everyone,
            features: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_default_enabled(mut self, enabled: bool) -> Self {
        self.default_enabled = Some(enabled);
        self
    }

    pub fn with_permission(mut self, level: PermissionLevel) -> Self {
        self.permission = level;
        self
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.push(feature.into());
        self
    }

    pub fn enabled_by_default(&self) -> bool {
        self.default_enabled.unwrap_or(true)
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    /// Fold another descriptor for the same plugin into this one.
    /// Explicit values from `other` win; features are unioned.
    pub fn merge(&mut self, other: PluginDescriptor) {
        if other.display_name.is_some() {
            self.display_name = other.display_name;
        }
        if other.default_enabled.is_some() {
            self.default_enabled = other.default_enabled;
        }
        self.permission = self.permission.max(other.permission);
        for feature in other.features {
            if !self.has_feature(&feature) {
                self.features.push(feature);
            }
        }
    }
}

/// A persisted enable/disable switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub name: PluginKey,
    pub scope: Scope,
    pub enabled: bool,
}

/// Effective state of a plugin or feature, for listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginStatus {
    pub key: PluginKey,
    pub label: String,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_level_admits() {
        assert!(PermissionLevel::Everyone.admits(GroupRole::Member, false));
        assert!(!PermissionLevel::GroupAdmin.admits(GroupRole::Member, false));
        assert!(PermissionLevel::GroupAdmin.admits(GroupRole::Owner, false));
        assert!(PermissionLevel::GroupAdmin.admits(GroupRole::Member, true));
        assert!(!PermissionLevel::SuperUser.admits(GroupRole::Owner, false));
    }

    #[test]
    fn test_descriptor_defaults_from_yaml() {
        let desc: PluginDescriptor = serde_yaml::from_str("name: recall\nfeatures: [monitor]").unwrap();
        assert!(desc.enabled_by_default());
        assert_eq!(desc.permission, PermissionLevel::Everyone);
        assert!(desc.has_feature("monitor"));
        assert_eq!(desc.label(), "recall");
    }

    #[test]
    fn test_descriptor_merge() {
        let mut desc = PluginDescriptor::new("draw_lots").with_feature("daily");
        desc.merge(
            PluginDescriptor::new("draw_lots")
                .with_display_name("抽签")
                .with_feature("daily")
                .with_feature("reroll"),
        );
        assert_eq!(desc.label(), "抽签");
        assert_eq!(desc.features, vec!["daily".to_string(), "reroll".to_string()]);
    }

    #[test]
    fn test_merge_keeps_default_off_unless_overridden() {
        let mut desc = PluginDescriptor::new("setu").with_default_enabled(false);
        desc.merge(PluginDescriptor::new("setu").with_display_name("色图"));
        assert!(!desc.enabled_by_default());

        let entry: PluginDescriptor = serde_yaml::from_str("name: setu\ndefault-enabled: true").unwrap();
        desc.merge(entry);
        assert!(desc.enabled_by_default());
    }
}
