//! Application services - Business logic orchestration

pub mod admin_commands;
pub mod command_service;
pub mod cooldown;
pub mod manager;
pub mod permission;
pub mod registry;

pub use admin_commands::register_admin_commands;
pub use command_service::{CommandService, NameIndex};
pub use cooldown::CooldownTracker;
pub use manager::{Admission, ManagerService, SharedManager};
pub use permission::{AccessRequest, PermissionGate};
pub use registry::PluginRegistry;
