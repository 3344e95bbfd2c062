//! Domain layer - Core business objects with no external dependencies
//!
//! This layer contains:
//! - Entities: Scopes, plugin descriptors and records, permission rules, messages, commands
//! - Traits: Abstractions for infrastructure (Bot, ConfigStore)

pub mod entities;
pub mod traits;
