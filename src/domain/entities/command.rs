use std::collections::BTreeMap;

use super::plugin::PermissionLevel;
use super::scope::PluginKey;

/// Represents a bot command
pub struct Command {
    pub name: String,
    pub description: Option<String>,
    pub aliases: Vec<String>,
    pub usage: Option<String>,
    pub handler: Option<CommandHandler>,
    pub permission: PermissionLevel,
    /// Owning plugin; commands without one are never switched off
    pub plugin: Option<String>,
    pub feature: Option<String>,
    /// Aliases may be glued to the first argument ("启用help")
    pub attached: bool,
}

/// Command handler function type
pub type CommandHandler = Box<dyn Fn(crate::domain::entities::Message) -> Result<String, crate::application::errors::CommandError> + Send + Sync>;

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            aliases: Vec::new(),
            usage: None,
            handler: None,
            permission: PermissionLevel::Everyone,
            plugin: None,
            feature: None,
            attached: false,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_aliases(mut self, aliases: Vec<String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    pub fn with_permission(mut self, level: PermissionLevel) -> Self {
        self.permission = level;
        self
    }

    pub fn for_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }

    pub fn for_feature(mut self, plugin: impl Into<String>, feature: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self.feature = Some(feature.into());
        self
    }

    pub fn attached(mut self) -> Self {
        self.attached = true;
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(crate::domain::entities::Message) -> Result<String, crate::application::errors::CommandError> + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn matches(&self, input: &str) -> bool {
        let input_lower = input.to_lowercase();
        self.name.to_lowercase() == input_lower ||
            self.aliases.iter().any(|a| a.to_lowercase() == input_lower)
    }

    /// Key the command is switched and cooled down under
    pub fn key(&self) -> Option<PluginKey> {
        let plugin = self.plugin.as_ref()?;
        Some(match &self.feature {
            Some(feature) => PluginKey::feature(plugin.clone(), feature.clone()),
            None => PluginKey::plugin(plugin.clone()),
        })
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Command registry for managing available commands
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, command: Command) {
        self.commands.insert(command.name.clone(), command);
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn find(&self, input: &str) -> Option<&Command> {
        self.commands.values().find(|c| c.matches(input))
    }

    /// Resolve a glued command word such as "启用help".
    /// Returns the command and the remainder after the longest matching name.
    pub fn find_attached<'a>(&self, input: &'a str) -> Option<(&Command, &'a str)> {
        let mut best: Option<(&Command, usize)> = None;
        for cmd in self.commands.values().filter(|c| c.attached) {
            for name in cmd.names() {
                let head = input.get(..name.len());
                if input.len() > name.len()
                    && head.map_or(false, |head| head.to_lowercase() == name.to_lowercase())
                    && best.map_or(true, |(_, len)| name.len() > len)
                {
                    best = Some((cmd, name.len()));
                }
            }
        }
        best.map(|(cmd, len)| (cmd, &input[len..]))
    }

    pub fn all(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_alias() {
        let mut registry = CommandRegistry::new();
        registry.register(Command::new("draw").with_alias("抽签"));
        assert!(registry.find("DRAW").is_some());
        assert!(registry.find("抽签").is_some());
        assert!(registry.find("jrrp").is_none());
    }

    #[test]
    fn test_find_attached_prefers_longest() {
        let mut registry = CommandRegistry::new();
        registry.register(Command::new("enable").with_alias("启用").attached());
        registry.register(Command::new("cd").with_alias("启用CD").attached());
        registry.register(Command::new("draw").with_alias("抽签"));

        let (cmd, rest) = registry.find_attached("启用help").unwrap();
        assert_eq!(cmd.name, "enable");
        assert_eq!(rest, "help");

        let (cmd, rest) = registry.find_attached("启用CDjrrp").unwrap();
        assert_eq!(cmd.name, "cd");
        assert_eq!(rest, "jrrp");

        let (cmd, rest) = registry.find_attached("ENABLEjrrp").unwrap();
        assert_eq!(cmd.name, "enable");
        assert_eq!(rest, "jrrp");

        let (cmd, rest) = registry.find_attached("启用cdjrrp").unwrap();
        assert_eq!(cmd.name, "cd");
        assert_eq!(rest, "jrrp");

        assert!(registry.find_attached("抽签abc").is_none());
        assert!(registry.find_attached("启用").is_none());
    }

    #[test]
    fn test_command_key() {
        assert_eq!(Command::new("help").key(), None);
        assert_eq!(Command::new("jrrp").for_plugin("jrrp").key(), Some(PluginKey::plugin("jrrp")));
        assert_eq!(
            Command::new("reroll").for_feature("draw_lots", "reroll").key(),
            Some(PluginKey::feature("draw_lots", "reroll"))
        );
    }
}
