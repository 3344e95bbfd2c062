//! Manager service - owns the registry, gate, cooldowns and their store

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

use crate::application::errors::StorageError;
use crate::domain::entities::{Effect, PluginDescriptor, PluginKey, Scope, Snapshot};
use crate::domain::traits::ConfigStore;

use super::cooldown::CooldownTracker;
use super::permission::{AccessRequest, PermissionGate};
use super::registry::PluginRegistry;

/// Verdict for one command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// The plugin or feature is switched off where the message was sent
    Disabled(PluginKey),
    Denied,
    /// Seconds until the sender may use the command again
    CoolingDown(u64),
}

/// The management layer's state plus the store it is persisted to.
///
/// Nothing is written implicitly: callers mutate through the accessors and
/// call [`ManagerService::persist`] when they are done.
pub struct ManagerService {
    registry: PluginRegistry,
    gate: PermissionGate,
    cooldowns: CooldownTracker,
    store: Box<dyn ConfigStore>,
}

/// Thread-safe wrapper for ManagerService
pub type SharedManager = Arc<RwLock<ManagerService>>;

impl ManagerService {
    pub fn new<I, S>(store: Box<dyn ConfigStore>, superusers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            registry: PluginRegistry::new(),
            gate: PermissionGate::new(superusers),
            cooldowns: CooldownTracker::new(),
            store,
        }
    }

    pub fn register(&mut self, descriptor: PluginDescriptor) {
        self.registry.register(descriptor);
    }

    /// Replace in-memory state with what the store holds
    pub fn load(&mut self) -> Result<(), StorageError> {
        let snapshot = self.store.load()?;
        tracing::info!(
            "Loaded {} switches, {} rules, {} cooldowns from {}",
            snapshot.plugins.len(),
            snapshot.rules.len(),
            snapshot.cooldowns.len(),
            self.store.describe()
        );
        self.restore(snapshot);

        let pruned = self.cooldowns.prune(Utc::now());
        if pruned > 0 {
            tracing::debug!("Pruned {} expired cooldown entries", pruned);
        }
        Ok(())
    }

    pub fn persist(&self) -> Result<(), StorageError> {
        self.store.persist(&self.snapshot())
    }

    /// Apply `change` and persist the result. Nothing is saved when `change`
    /// fails, and a failed save rolls the change back.
    pub fn commit<T, E>(
        &mut self,
        change: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<Result<T, E>, StorageError> {
        let before = self.snapshot();
        let outcome = change(self);
        if outcome.is_ok() {
            self.persist_or_restore(before)?;
        }
        Ok(outcome)
    }

    /// Like [`ManagerService::commit`] for changes that cannot fail
    pub fn apply<T>(&mut self, change: impl FnOnce(&mut Self) -> T) -> Result<T, StorageError> {
        let before = self.snapshot();
        let out = change(self);
        self.persist_or_restore(before)?;
        Ok(out)
    }

    fn persist_or_restore(&mut self, before: Snapshot) -> Result<(), StorageError> {
        if let Err(e) = self.persist() {
            tracing::warn!("Rolling back unsaved change: {}", e);
            self.restore(before);
            return Err(e);
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            plugins: self.registry.records(),
            rules: self.gate.rules(),
            cooldowns: self.cooldowns.records(),
            usage: self.cooldowns.usage_records(),
        }
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.registry.restore(snapshot.plugins);
        self.gate.restore(snapshot.rules);
        self.cooldowns.restore(snapshot.cooldowns, snapshot.usage);
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut PluginRegistry {
        &mut self.registry
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub fn gate_mut(&mut self) -> &mut PermissionGate {
        &mut self.gate
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    pub fn cooldowns_mut(&mut self) -> &mut CooldownTracker {
        &mut self.cooldowns
    }

    pub fn is_superuser(&self, user_id: &str) -> bool {
        self.gate.is_superuser(user_id)
    }

    /// Decide whether an invocation may run: switches first, then rules,
    /// then cooldowns. Super-users skip switches and cooldowns.
    pub fn admit(&self, request: &AccessRequest<'_>, key: Option<&PluginKey>, now: DateTime<Utc>) -> Admission {
        let superuser = self.gate.is_superuser(request.user_id);

        if let (Some(key), false) = (key, superuser) {
            let scope = request.group_id.map(Scope::group).unwrap_or(Scope::Global);
            if !self.registry.is_key_enabled(key, &scope) {
                return Admission::Disabled(key.clone());
            }
        }

        if self.gate.evaluate(request) == Effect::Deny {
            return Admission::Denied;
        }

        if let (Some(key), Some(group), false) = (key, request.group_id, superuser) {
            let counted = self.cooldowns.effective_key(key, group);
            let remaining = self.cooldowns.remaining(&counted, group, request.user_id, now);
            if remaining > 0 {
                return Admission::CoolingDown(remaining);
            }
        }

        Admission::Allowed
    }

    /// Count a successful invocation against its cooldown.
    /// Returns whether anything was recorded.
    pub fn record_use(&mut self, request: &AccessRequest<'_>, key: Option<&PluginKey>, now: DateTime<Utc>) -> bool {
        let (Some(key), Some(group)) = (key, request.group_id) else {
            return false;
        };
        if self.gate.is_superuser(request.user_id) {
            return false;
        }
        let counted = self.cooldowns.effective_key(key, group);
        let recorded = self.cooldowns.touch(&counted, group, request.user_id, now);
        self.cooldowns.prune(now);
        recorded
    }

    pub fn into_shared(self) -> SharedManager {
        Arc::new(RwLock::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MemoryStore;

    struct BrokenStore;

    impl ConfigStore for BrokenStore {
        fn load(&self) -> Result<Snapshot, StorageError> {
            Ok(Snapshot::default())
        }

        fn persist(&self, _snapshot: &Snapshot) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }

        fn describe(&self) -> String {
            "broken".to_string()
        }
    }

    #[test]
    fn test_commit_rolls_back_when_save_fails() {
        let mut manager = ManagerService::new(Box::new(BrokenStore), ["1"]);
        manager.register(PluginDescriptor::new("jrrp"));

        let result = manager.commit(|m| m.registry_mut().set_enabled("jrrp", &Scope::Global, false));
        assert!(result.is_err());
        assert!(manager.registry().is_enabled("jrrp", &Scope::Global));
        assert!(manager.registry().records().is_empty());
    }

    #[test]
    fn test_commit_keeps_saved_change() {
        let mut manager = ManagerService::new(Box::new(MemoryStore::new()), ["1"]);
        manager.register(PluginDescriptor::new("jrrp"));

        let result = manager.commit(|m| m.registry_mut().set_enabled("jrrp", &Scope::Global, false));
        assert_eq!(result.unwrap(), Ok(()));
        assert!(!manager.registry().is_enabled("jrrp", &Scope::Global));

        let missing = manager.commit(|m| m.registry_mut().set_enabled("nope", &Scope::Global, false));
        assert!(missing.unwrap().is_err());
    }

    #[test]
    fn test_record_use_drops_expired_usage() {
        let mut manager = ManagerService::new(Box::new(MemoryStore::new()), ["1"]);
        manager.register(PluginDescriptor::new("jrrp"));
        let key = PluginKey::plugin("jrrp");
        manager.cooldowns_mut().set(&key, "100", 10);

        let start = Utc::now();
        let first = AccessRequest::new("2", Some("100"), "jrrp");
        assert!(manager.record_use(&first, Some(&key), start));

        let later = AccessRequest::new("3", Some("100"), "jrrp");
        assert!(manager.record_use(&later, Some(&key), start + chrono::Duration::seconds(20)));

        let usage = manager.cooldowns().usage_records();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].user_id, "3");
    }
}
