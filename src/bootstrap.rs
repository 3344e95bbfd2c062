//! Startup wiring shared by the binary and the integration tests

use tracing::{info, warn};

use crate::application::errors::BotError;
use crate::application::messaging::MessageDispatcher;
use crate::application::services::{register_admin_commands, CommandService, ManagerService};
use crate::domain::traits::ConfigStore;
use crate::infrastructure::config::Config;
use crate::infrastructure::plugins::PluginManifest;
use crate::plugins::PluginManager;

/// Build the dispatcher on the store named in the config
pub fn build(config: &Config) -> Result<MessageDispatcher, BotError> {
    let store = config.open_store()?;
    build_with_store(config, store)
}

/// Build the dispatcher: built-in plugins, catalog and config descriptors,
/// persisted state, then the admin commands.
pub fn build_with_store(config: &Config, store: Box<dyn ConfigStore>) -> Result<MessageDispatcher, BotError> {
    info!("Using state store: {}", store.describe());
    let mut manager = ManagerService::new(store, config.superusers.iter().cloned());

    let mut commands = CommandService::new(&config.bot.prefix);
    commands.register_defaults();

    PluginManager::with_builtins().install(&mut manager, &mut commands);

    if let Some(path) = &config.catalog_file {
        match PluginManifest::from_file(path) {
            Ok(manifest) => {
                info!("Loaded {} plugins from catalog {}", manifest.len(), path.display());
                for descriptor in manifest.plugins {
                    manager.register(descriptor);
                }
            }
            Err(e) => warn!("Failed to load plugin catalog: {}", e),
        }
    }

    for descriptor in &config.plugins {
        manager.register(descriptor.clone());
    }

    manager.load()?;

    let manager = manager.into_shared();
    register_admin_commands(&mut commands, manager.clone());
    info!("{} commands registered", commands.len());

    Ok(MessageDispatcher::new(commands, manager)
        .with_replies(config.gate.reply_on_deny, config.gate.reply_on_cooldown))
}
