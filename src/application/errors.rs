//! Application layer errors

use thiserror::Error;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Adapter error: {0}")]
    Adapter(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Command execution errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Failed to save state: {0}")]
    Storage(#[from] StorageError),
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Lock poisoned")]
    Poisoned,
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Registry, gate and cooldown errors. All are reported back to the
/// invoking user and leave the state untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManageError {
    #[error("plugin not found: {0}")]
    UnknownPlugin(String),

    #[error("feature not found: {plugin}:{feature}")]
    UnknownFeature { plugin: String, feature: String },

    #[error("command or plugin not found: {0}")]
    UnknownTarget(String),

    #[error("no such rule: {0}")]
    RuleNotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
}
