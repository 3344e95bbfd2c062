//! Plugin registry - capability descriptors and enable/disable switches

use std::collections::{BTreeMap, HashMap};

use crate::application::errors::ManageError;
use crate::domain::entities::{PluginDescriptor, PluginKey, PluginRecord, PluginStatus, Scope};

/// Tracks which plugins and features are enabled, globally and per group.
///
/// A missing record means "inherit": a group falls back to the global
/// record, and the global scope falls back to the descriptor default.
/// Names the catalog does not know are reported as enabled.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    descriptors: Vec<PluginDescriptor>,
    index: HashMap<String, usize>,
    records: BTreeMap<(PluginKey, Scope), bool>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin descriptor. A second descriptor with the same name
    /// is merged into the first.
    pub fn register(&mut self, descriptor: PluginDescriptor) {
        match self.index.get(&descriptor.name) {
            Some(&idx) => self.descriptors[idx].merge(descriptor),
            None => {
                tracing::debug!("Registering plugin descriptor: {}", descriptor.name);
                self.index.insert(descriptor.name.clone(), self.descriptors.len());
                self.descriptors.push(descriptor);
            }
        }
    }

    pub fn descriptor(&self, name: &str) -> Option<&PluginDescriptor> {
        self.index.get(name).map(|&idx| &self.descriptors[idx])
    }

    /// Descriptors in registration order
    pub fn descriptors(&self) -> &[PluginDescriptor] {
        &self.descriptors
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Check that `key` names a registered plugin, and a declared feature if it has one
    pub fn validate(&self, key: &PluginKey) -> Result<(), ManageError> {
        let descriptor = self
            .descriptor(&key.plugin)
            .ok_or_else(|| ManageError::UnknownPlugin(key.plugin.clone()))?;

        match &key.feature {
            Some(feature) if !descriptor.has_feature(feature) => Err(ManageError::UnknownFeature {
                plugin: key.plugin.clone(),
                feature: feature.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Whether plugin `name` is enabled in `scope`
    pub fn is_enabled(&self, name: &str, scope: &Scope) -> bool {
        self.resolve(&PluginKey::plugin(name), scope)
    }

    /// Whether `feature` of `plugin` is enabled in `scope`. A disabled
    /// parent plugin disables all of its features.
    pub fn is_feature_enabled(&self, plugin: &str, feature: &str, scope: &Scope) -> bool {
        self.is_key_enabled(&PluginKey::feature(plugin, feature), scope)
    }

    pub fn is_key_enabled(&self, key: &PluginKey, scope: &Scope) -> bool {
        if key.is_feature() && !self.resolve(&key.parent(), scope) {
            return false;
        }
        self.resolve(key, scope)
    }

    fn resolve(&self, key: &PluginKey, scope: &Scope) -> bool {
        if let Scope::Group(_) = scope {
            if let Some(&enabled) = self.records.get(&(key.clone(), scope.clone())) {
                return enabled;
            }
        }

        if let Some(&enabled) = self.records.get(&(key.clone(), Scope::Global)) {
            return enabled;
        }

        match key.feature {
            Some(_) => true,
            None => self
                .descriptor(&key.plugin)
                .map(|d| d.enabled_by_default())
                .unwrap_or(true),
        }
    }

    /// Switch a plugin (or `plugin:feature`) on or off in `scope`
    pub fn set_enabled(&mut self, name: &str, scope: &Scope, enabled: bool) -> Result<(), ManageError> {
        self.set_key(&PluginKey::parse(name), scope, enabled)
    }

    pub fn set_key(&mut self, key: &PluginKey, scope: &Scope, enabled: bool) -> Result<(), ManageError> {
        self.validate(key)?;
        self.records.insert((key.clone(), scope.clone()), enabled);
        tracing::info!("{} {} in {}", if enabled { "Enabled" } else { "Disabled" }, key, scope);
        Ok(())
    }

    /// Drop the override for `key` in `scope`. Returns whether one existed.
    pub fn clear(&mut self, key: &PluginKey, scope: &Scope) -> Result<bool, ManageError> {
        self.validate(key)?;
        Ok(self.records.remove(&(key.clone(), scope.clone())).is_some())
    }

    /// Switch every registered plugin in `scope`. Returns how many were set.
    pub fn set_all(&mut self, scope: &Scope, enabled: bool) -> usize {
        for descriptor in &self.descriptors {
            self.records
                .insert((PluginKey::plugin(descriptor.name.clone()), scope.clone()), enabled);
        }
        self.descriptors.len()
    }

    /// Effective state of every plugin, each followed by its features
    pub fn statuses(&self, scope: &Scope) -> Vec<PluginStatus> {
        let mut statuses = Vec::new();
        for descriptor in &self.descriptors {
            let key = PluginKey::plugin(descriptor.name.clone());
            statuses.push(PluginStatus {
                enabled: self.is_key_enabled(&key, scope),
                label: descriptor.label().to_string(),
                key,
            });

            for feature in &descriptor.features {
                let key = PluginKey::feature(descriptor.name.clone(), feature.clone());
                statuses.push(PluginStatus {
                    enabled: self.is_key_enabled(&key, scope),
                    label: format!("{} / {}", descriptor.label(), feature),
                    key,
                });
            }
        }
        statuses
    }

    pub fn records(&self) -> Vec<PluginRecord> {
        self.records
            .iter()
            .map(|((name, scope), &enabled)| PluginRecord {
                name: name.clone(),
                scope: scope.clone(),
                enabled,
            })
            .collect()
    }

    /// Replace all switches with persisted records. Records for plugins
    /// that are no longer registered are kept so they survive a restart
    /// without that plugin.
    pub fn restore(&mut self, records: Vec<PluginRecord>) {
        self.records.clear();
        for record in records {
            if !self.contains(&record.name.plugin) {
                tracing::warn!("Keeping switch for unregistered plugin: {}", record.name);
            }
            self.records.insert((record.name, record.scope), record.enabled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        registry.register(PluginDescriptor::new("jrrp").with_display_name("今日人品"));
        registry.register(
            PluginDescriptor::new("recall")
                .with_feature("monitor")
                .with_feature("self_recall"),
        );
        registry.register(PluginDescriptor::new("setu").with_default_enabled(false));
        registry
    }

    #[test]
    fn test_absent_record_uses_default() {
        let registry = registry();
        assert!(registry.is_enabled("jrrp", &Scope::Global));
        assert!(registry.is_enabled("jrrp", &Scope::group("100")));
        assert!(!registry.is_enabled("setu", &Scope::group("100")));
        assert!(registry.is_enabled("never_registered", &Scope::Global));
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let mut registry = registry();
        let scopes = [Scope::Global, Scope::group("100"), Scope::group("200")];
        for name in ["jrrp", "recall", "setu"] {
            for scope in &scopes {
                for value in [false, true, false] {
                    registry.set_enabled(name, scope, value).unwrap();
                    assert_eq!(registry.is_enabled(name, scope), value, "{} in {}", name, scope);
                }
            }
        }
    }

    #[test]
    fn test_global_disable_with_group_override() {
        let mut registry = registry();
        registry.set_enabled("jrrp", &Scope::Global, false).unwrap();
        assert!(!registry.is_enabled("jrrp", &Scope::Global));
        assert!(!registry.is_enabled("jrrp", &Scope::group("100")));

        registry.set_enabled("jrrp", &Scope::group("100"), true).unwrap();
        assert!(registry.is_enabled("jrrp", &Scope::group("100")));
        assert!(!registry.is_enabled("jrrp", &Scope::group("200")));
        assert!(!registry.is_enabled("jrrp", &Scope::Global));
    }

    #[test]
    fn test_unknown_plugin_is_not_found() {
        let mut registry = registry();
        let err = registry.set_enabled("nope", &Scope::Global, false).unwrap_err();
        assert_eq!(err, ManageError::UnknownPlugin("nope".to_string()));
        assert!(registry.records().is_empty());

        let err = registry.set_enabled("recall:nope", &Scope::Global, false).unwrap_err();
        assert!(matches!(err, ManageError::UnknownFeature { .. }));
    }

    #[test]
    fn test_feature_follows_parent() {
        let mut registry = registry();
        let group = Scope::group("100");
        registry.set_enabled("recall:monitor", &group, false).unwrap();
        assert!(!registry.is_feature_enabled("recall", "monitor", &group));
        assert!(registry.is_feature_enabled("recall", "self_recall", &group));

        registry.set_enabled("recall", &group, false).unwrap();
        assert!(!registry.is_feature_enabled("recall", "self_recall", &group));
    }

    #[test]
    fn test_one_record_per_pair() {
        let mut registry = registry();
        let group = Scope::group("100");
        registry.set_enabled("jrrp", &group, false).unwrap();
        registry.set_enabled("jrrp", &group, true).unwrap();
        assert_eq!(registry.records().len(), 1);

        assert!(registry.clear(&PluginKey::plugin("jrrp"), &group).unwrap());
        assert!(!registry.clear(&PluginKey::plugin("jrrp"), &group).unwrap());
        assert!(registry.records().is_empty());
    }

    #[test]
    fn test_set_all_and_statuses() {
        let mut registry = registry();
        let group = Scope::group("100");
        assert_eq!(registry.set_all(&group, false), 3);

        let statuses = registry.statuses(&group);
        assert_eq!(statuses.len(), 5);
        assert!(statuses.iter().all(|s| !s.enabled));
        assert_eq!(statuses[0].label, "今日人品");
        assert_eq!(statuses[2].key, PluginKey::feature("recall", "monitor"));
    }

    #[test]
    fn test_restore_replaces_records() {
        let mut registry = registry();
        registry.set_enabled("jrrp", &Scope::Global, false).unwrap();
        registry.restore(vec![PluginRecord {
            name: PluginKey::plugin("setu"),
            scope: Scope::group("100"),
            enabled: true,
        }]);
        assert!(registry.is_enabled("jrrp", &Scope::Global));
        assert!(registry.is_enabled("setu", &Scope::group("100")));
    }
}
