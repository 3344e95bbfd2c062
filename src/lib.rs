//! qunbot - per-group plugin switches, permission rules and cooldowns for a chat bot

pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;
pub mod plugins;
