//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Services: plugin registry, permission gate, cooldowns and the admin commands
//! - Errors: Domain-specific errors
//! - Messaging: Message parsing, middleware, dispatching

pub mod errors;
pub mod messaging;
pub mod services;
