//! Plugin manager - collects built-in plugins and installs them at startup

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::application::services::{CommandService, ManagerService};
use crate::domain::entities::PluginDescriptor;
use crate::plugins::trait_def::Plugin;

/// Holds every plugin compiled into the bot
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
    index: HashMap<String, usize>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Manager preloaded with the built-in plugins
    pub fn with_builtins() -> Self {
        let mut manager = Self::new();
        for plugin in super::builtins() {
            if let Err(e) = manager.register_arc(plugin) {
                tracing::warn!("{}", e);
            }
        }
        manager
    }

    /// Register a plugin
    pub fn register<P: Plugin + 'static>(&mut self, plugin: P) -> Result<(), String> {
        self.register_arc(Arc::new(plugin))
    }

    fn register_arc(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), String> {
        let name = plugin.name().to_string();

        if self.index.contains_key(&name) {
            return Err(format!("Plugin '{}' already registered", name));
        }

        info!("Registering plugin: {}", name);
        self.index.insert(name, self.plugins.len());
        self.plugins.push(plugin);
        Ok(())
    }

    /// Check if a plugin exists
    pub fn has_plugin(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// List all registered plugins
    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        self.plugins
            .iter()
            .map(|plugin| PluginInfo {
                name: plugin.name().to_string(),
                description: plugin.description().to_string(),
                descriptor: plugin.descriptor(),
            })
            .collect()
    }

    /// Register every plugin's descriptor with the manager and its commands
    /// with the command service. Returns the number of commands added.
    pub fn install(&self, manager: &mut ManagerService, commands: &mut CommandService) -> usize {
        let mut added = 0;
        for plugin in &self.plugins {
            manager.register(plugin.descriptor());
            for command in plugin.commands() {
                commands.register(command);
                added += 1;
            }
        }
        info!("Installed {} plugins with {} commands", self.plugins.len(), added);
        added
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Plugin information for listing
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
    pub descriptor: PluginDescriptor,
}
