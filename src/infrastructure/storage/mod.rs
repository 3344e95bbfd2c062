//! File-based and in-memory storage implementations

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::application::errors::StorageError;
use crate::domain::entities::Snapshot;
use crate::domain::traits::ConfigStore;

/// JSON file-based store. The whole snapshot lives in one pretty-printed file.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonStore {
    fn load(&self) -> Result<Snapshot, StorageError> {
        if !self.path.exists() {
            return Ok(Snapshot::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Snapshot::default());
        }

        match serde_json::from_str(&content) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                // the next persist overwrites it
                tracing::warn!("State file {} is corrupted ({}), starting empty", self.path.display(), e);
                Ok(Snapshot::default())
            }
        }
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// Volatile store, for tests and throwaway sessions
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<Snapshot, StorageError> {
        self.snapshot
            .lock()
            .map(|s| s.clone())
            .map_err(|_| StorageError::Poisoned)
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let mut guard = self.snapshot.lock().map_err(|_| StorageError::Poisoned)?;
        *guard = snapshot.clone();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{
        CooldownRecord, Effect, GroupRole, PermissionRule, PluginKey, PluginRecord, RuleTarget, Scope, Subject,
        UsageRecord,
    };
    use chrono::{TimeZone, Utc};

    fn sample() -> Snapshot {
        Snapshot {
            plugins: vec![
                PluginRecord {
                    name: PluginKey::plugin("jrrp"),
                    scope: Scope::Global,
                    enabled: false,
                },
                PluginRecord {
                    name: PluginKey::feature("recall", "monitor"),
                    scope: Scope::group("100"),
                    enabled: true,
                },
            ],
            rules: vec![
                PermissionRule::new(
                    Subject::user("u1", Some("100")),
                    RuleTarget::Command("draw".to_string()),
                    Effect::Deny,
                ),
                PermissionRule::new(
                    Subject::role(GroupRole::Admin, None),
                    RuleTarget::Plugin("setu".to_string()),
                    Effect::Allow,
                ),
            ],
            cooldowns: vec![CooldownRecord {
                group_id: "100".to_string(),
                key: PluginKey::plugin("jrrp"),
                seconds: 60,
            }],
            usage: vec![UsageRecord {
                group_id: "100".to_string(),
                user_id: "u1".to_string(),
                key: PluginKey::plugin("jrrp"),
                last_used: Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap(),
            }],
        }
    }

    #[test]
    fn test_json_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("state.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_json_store_persists_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("data/plugin_manager/state.json"));
        store.persist(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"recall:monitor\""));
    }

    #[test]
    fn test_json_store_recovers_from_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonStore::new(&path);
        assert!(store.load().unwrap().is_empty());
        store.persist(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_empty());
        store.persist(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
    }
}
