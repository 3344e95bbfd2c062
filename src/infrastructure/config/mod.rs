//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::application::errors::{ConfigError, StorageError};
use crate::domain::entities::{GroupRole, PluginDescriptor};
use crate::domain::traits::ConfigStore;
use crate::infrastructure::database::SqliteStore;
use crate::infrastructure::storage::JsonStore;

/// Bot configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub bot: BotConfig,
    #[serde(default)]
    pub superusers: Vec<String>,
    pub storage: StorageConfig,
    #[serde(default)]
    pub gate: GateConfig,
    /// Optional plugin catalog (YAML list or "Display name: id" lines)
    #[serde(default)]
    pub catalog_file: Option<PathBuf>,
    /// Extra plugin descriptors, merged over the built-in ones
    #[serde(default)]
    pub plugins: Vec<PluginDescriptor>,
    #[serde(default)]
    pub adapters: AdaptersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BotConfig {
    pub name: String,
    pub prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: PathBuf,
}

/// How refused invocations are answered
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct GateConfig {
    pub reply_on_deny: bool,
    pub reply_on_cooldown: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            reply_on_deny: true,
            reply_on_cooldown: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AdaptersConfig {
    pub console: Option<ConsoleConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub user_id: String,
    pub group_id: Option<String>,
    #[serde(default)]
    pub role: GroupRole,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig {
                name: "qunbot".to_string(),
                prefix: "/".to_string(),
            },
            superusers: Vec::new(),
            storage: StorageConfig {
                backend: StorageBackend::Json,
                path: PathBuf::from("data/plugin_manager/state.json"),
            },
            gate: GateConfig::default(),
            catalog_file: None,
            plugins: Vec::new(),
            adapters: AdaptersConfig {
                console: Some(ConsoleConfig {
                    enabled: true,
                    user_id: "10000".to_string(),
                    group_id: Some("20000".to_string()),
                    role: GroupRole::Member,
                }),
            },
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.prefix.is_empty() {
            return Err(ConfigError::MissingField("bot.prefix".to_string()));
        }
        if self.storage.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("storage.path".to_string()));
        }
        if let Some(desc) = self.plugins.iter().find(|p| p.name.is_empty() || p.name.contains(':')) {
            return Err(ConfigError::InvalidValue(format!("plugin name: {:?}", desc.name)));
        }
        Ok(())
    }

    pub fn load_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply BOT_PREFIX, BOT_SUPERUSERS (comma separated) and BOT_STORAGE_PATH
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(prefix) = std::env::var("BOT_PREFIX") {
            if !prefix.is_empty() {
                self.bot.prefix = prefix;
            }
        }

        if let Ok(superusers) = std::env::var("BOT_SUPERUSERS") {
            for id in superusers.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if !self.superusers.iter().any(|s| s == id) {
                    self.superusers.push(id.to_string());
                }
            }
        }

        if let Ok(path) = std::env::var("BOT_STORAGE_PATH") {
            self.storage.path = PathBuf::from(path);
        }

        self
    }

    /// Open the configured state store
    pub fn open_store(&self) -> Result<Box<dyn ConfigStore>, StorageError> {
        let store: Box<dyn ConfigStore> = match self.storage.backend {
            StorageBackend::Json => Box::new(JsonStore::new(&self.storage.path)),
            StorageBackend::Sqlite => Box::new(SqliteStore::new(&self.storage.path)?),
        };
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::PermissionLevel;

    #[test]
    fn test_default_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.bot.prefix, "/");
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert!(yaml.contains("reply-on-deny"));
    }

    #[test]
    fn test_minimal_config_with_plugins() {
        let yaml = r##"
bot:
  name: atri
  prefix: "#"
superusers: ["12345"]
storage:
  backend: sqlite
  path: data/state.db
plugins:
  - name: poke_reply
    display-name: 戳一戳
    permission: group-admin
    features: [poke, contribute]
"##;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.superusers, vec!["12345".to_string()]);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.gate.reply_on_deny);
        assert!(config.adapters.console.is_none());
        assert_eq!(config.plugins[0].permission, PermissionLevel::GroupAdmin);
        assert_eq!(config.plugins[0].features.len(), 2);
    }

    #[test]
    fn test_rejects_bad_plugin_name() {
        let yaml = r#"
bot: { name: atri, prefix: "/" }
storage: { backend: json, path: state.json }
plugins:
  - name: "a:b"
"#;
        assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_open_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Sqlite;
        config.storage.path = dir.path().join("state.db");
        let store = config.open_store().unwrap();
        assert!(store.describe().starts_with("sqlite:"));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("BOT_PREFIX", "#");
        std::env::set_var("BOT_SUPERUSERS", "12345, 777,,12345");
        std::env::set_var("BOT_STORAGE_PATH", "/tmp/qunbot/state.json");

        let mut base = Config::default();
        base.superusers = vec!["12345".to_string()];
        let config = base.with_env_overrides();

        std::env::remove_var("BOT_PREFIX");
        std::env::remove_var("BOT_SUPERUSERS");
        std::env::remove_var("BOT_STORAGE_PATH");

        assert_eq!(config.bot.prefix, "#");
        assert_eq!(config.superusers, vec!["12345".to_string(), "777".to_string()]);
        assert_eq!(config.storage.path, PathBuf::from("/tmp/qunbot/state.json"));
        // untouched settings keep their values
        assert_eq!(config.storage.backend, StorageBackend::Json);
    }
}
