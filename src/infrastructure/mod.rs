//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Storage: JSON file and in-memory state stores
//! - Database: SQLite state store
//! - Adapters: Platform integrations (console)
//! - Plugins: Plugin catalog files

pub mod adapters;
pub mod config;
pub mod database;
pub mod plugins;
pub mod storage;
