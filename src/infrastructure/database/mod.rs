//! SQLite-backed configuration store

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use crate::application::errors::StorageError;
use crate::domain::entities::{
    CooldownRecord, Effect, PermissionRule, PluginKey, PluginRecord, RuleTarget, Scope, Snapshot, Subject,
    UsageRecord,
};
use crate::domain::traits::ConfigStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
    label: String,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn, format!("sqlite:{}", path.display()))
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?, "sqlite::memory:".to_string())
    }

    fn with_connection(conn: Connection, label: String) -> Result<Self, StorageError> {
        Self::init_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            label,
        })
    }

    fn init_tables(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS plugin_status (
                name TEXT NOT NULL,
                scope TEXT NOT NULL,
                enabled INTEGER NOT NULL,
                PRIMARY KEY (name, scope)
            )",
            [],
        )?;

        // subject and target are serialized as JSON
        conn.execute(
            "CREATE TABLE IF NOT EXISTS permission_rules (
                subject TEXT NOT NULL,
                target TEXT NOT NULL,
                effect TEXT NOT NULL,
                PRIMARY KEY (subject, target)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS cooldowns (
                group_id TEXT NOT NULL,
                plugin_key TEXT NOT NULL,
                seconds INTEGER NOT NULL,
                PRIMARY KEY (group_id, plugin_key)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS cooldown_usage (
                group_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                plugin_key TEXT NOT NULL,
                last_used TEXT NOT NULL,
                PRIMARY KEY (group_id, user_id, plugin_key)
            )",
            [],
        )?;

        Ok(())
    }

    fn read_plugins(conn: &Connection) -> Result<Vec<PluginRecord>, StorageError> {
        let mut stmt = conn.prepare("SELECT name, scope, enabled FROM plugin_status ORDER BY name, scope")?;
        let rows = stmt.query_map([], |row| {
            Ok(PluginRecord {
                name: PluginKey::parse(&row.get::<_, String>(0)?),
                scope: Scope::from_key(&row.get::<_, String>(1)?),
                enabled: row.get(2)?,
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    fn read_rules(conn: &Connection) -> Result<Vec<PermissionRule>, StorageError> {
        let mut stmt = conn.prepare("SELECT subject, target, effect FROM permission_rules")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;

        let mut rules = Vec::new();
        for row in rows {
            let (subject, target, effect) = row?;
            let subject: Subject = serde_json::from_str(&subject)?;
            let target: RuleTarget = serde_json::from_str(&target)?;
            let effect = Effect::parse(&effect)
                .ok_or_else(|| StorageError::Serialization(format!("unknown effect: {}", effect)))?;
            rules.push(PermissionRule::new(subject, target, effect));
        }
        Ok(rules)
    }

    fn read_cooldowns(conn: &Connection) -> Result<Vec<CooldownRecord>, StorageError> {
        let mut stmt = conn.prepare("SELECT group_id, plugin_key, seconds FROM cooldowns")?;
        let rows = stmt.query_map([], |row| {
            Ok(CooldownRecord {
                group_id: row.get(0)?,
                key: PluginKey::parse(&row.get::<_, String>(1)?),
                seconds: row.get::<_, i64>(2)?.max(0) as u64,
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    fn read_usage(conn: &Connection) -> Result<Vec<UsageRecord>, StorageError> {
        let mut stmt = conn.prepare("SELECT group_id, user_id, plugin_key, last_used FROM cooldown_usage")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (group_id, user_id, key, last_used) = row?;
            let last_used = DateTime::parse_from_rfc3339(&last_used)
                .map_err(|e| StorageError::Serialization(format!("bad timestamp {}: {}", last_used, e)))?
                .with_timezone(&Utc);
            records.push(UsageRecord {
                group_id,
                user_id,
                key: PluginKey::parse(&key),
                last_used,
            });
        }
        Ok(records)
    }
}

impl ConfigStore for SqliteStore {
    fn load(&self) -> Result<Snapshot, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(Snapshot {
            plugins: Self::read_plugins(&conn)?,
            rules: Self::read_rules(&conn)?,
            cooldowns: Self::read_cooldowns(&conn)?,
            usage: Self::read_usage(&conn)?,
        })
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let mut conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM plugin_status", [])?;
        tx.execute("DELETE FROM permission_rules", [])?;
        tx.execute("DELETE FROM cooldowns", [])?;
        tx.execute("DELETE FROM cooldown_usage", [])?;

        for record in &snapshot.plugins {
            tx.execute(
                "INSERT OR REPLACE INTO plugin_status (name, scope, enabled) VALUES (?1, ?2, ?3)",
                params![record.name.to_string(), record.scope.as_key(), record.enabled],
            )?;
        }

        for rule in &snapshot.rules {
            tx.execute(
                "INSERT OR REPLACE INTO permission_rules (subject, target, effect) VALUES (?1, ?2, ?3)",
                params![
                    serde_json::to_string(&rule.subject)?,
                    serde_json::to_string(&rule.target)?,
                    rule.effect.as_str()
                ],
            )?;
        }

        for cooldown in &snapshot.cooldowns {
            tx.execute(
                "INSERT OR REPLACE INTO cooldowns (group_id, plugin_key, seconds) VALUES (?1, ?2, ?3)",
                params![
                    cooldown.group_id,
                    cooldown.key.to_string(),
                    i64::try_from(cooldown.seconds).unwrap_or(i64::MAX)
                ],
            )?;
        }

        for usage in &snapshot.usage {
            tx.execute(
                "INSERT OR REPLACE INTO cooldown_usage (group_id, user_id, plugin_key, last_used)
                 VALUES (?1, ?2, ?3, ?4)",
                params![usage.group_id, usage.user_id, usage.key.to_string(), usage.last_used.to_rfc3339()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::GroupRole;
    use chrono::TimeZone;

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
            rules: vec![PermissionRule::new(
                Subject::role(GroupRole::Owner, Some("100")),
                RuleTarget::Command("draw".to_string()),
                Effect::Deny,
            )],
            cooldowns: vec![CooldownRecord {
                group_id: "100".to_string(),
                key: PluginKey::feature("poke_reply", "poke"),
                seconds: 45,
            }],
            usage: vec![UsageRecord {
                group_id: "100".to_string(),
                user_id: "u1".to_string(),
                key: PluginKey::feature("poke_reply", "poke"),
                last_used: Utc.with_ymd_and_hms(2026, 10, 1, 8, 30, 0).unwrap(),
            }],
        }
    }

    #[test]
    fn test_sqlite_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.load().unwrap().is_empty());

        store.persist(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn test_sqlite_persist_replaces_previous_state() {
        let store = SqliteStore::in_memory().unwrap();
        store.persist(&sample()).unwrap();

        let mut smaller = sample();
        smaller.plugins.truncate(1);
        smaller.usage.clear();
        store.persist(&smaller).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.plugins.len(), 1);
        assert!(loaded.usage.is_empty());
    }

    #[test]
    fn test_sqlite_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db/qunbot.db");
        SqliteStore::new(&path).unwrap().persist(&sample()).unwrap();
        assert_eq!(SqliteStore::new(&path).unwrap().load().unwrap(), sample());
    }

    #[test]
    fn test_group_named_global_keeps_its_scope() {
        let store = SqliteStore::in_memory().unwrap();
        let snapshot = Snapshot {
            plugins: vec![PluginRecord {
                name: PluginKey::plugin("jrrp"),
                scope: Scope::group("global"),
                enabled: false,
            }],
            ..Snapshot::default()
        };
        store.persist(&snapshot).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.plugins[0].scope, Scope::group("global"));
    }
}
