use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use crate::application::errors::CommandError;
use crate::domain::entities::{Command, CommandRegistry, Content, Message};

/// Shared lookup from command names and aliases to the primary name.
/// Handlers hold a clone so they can see commands registered after them.
#[derive(Clone, Default)]
pub struct NameIndex {
    names: Arc<RwLock<HashMap<String, String>>>,
}

impl NameIndex {
    /// Primary name of the command called `input`, if any
    pub fn canonical(&self, input: &str) -> Option<String> {
        self.names.read().ok()?.get(&input.to_lowercase()).cloned()
    }

    fn insert(&self, cmd: &Command) {
        if let Ok(mut names) = self.names.write() {
            names.insert(cmd.name.to_lowercase(), cmd.name.clone());
            for alias in &cmd.aliases {
                names.insert(alias.to_lowercase(), cmd.name.clone());
            }
        }
    }
}

/// Help text for one command: the listing line and the detailed entry
#[derive(Debug, Clone)]
struct HelpEntry {
    line: String,
    detail: String,
}

/// Service for managing and executing commands
pub struct CommandService {
    registry: CommandRegistry,
    prefix: String,
    help_index: Arc<RwLock<BTreeMap<String, HelpEntry>>>,
    names: NameIndex,
}

impl CommandService {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            registry: CommandRegistry::new(),
            prefix: prefix.into(),
            help_index: Arc::new(RwLock::new(BTreeMap::new())),
            names: NameIndex::default(),
        }
    }

    pub fn register(&mut self, command: Command) {
        if let Ok(mut index) = self.help_index.write() {
            let entry = HelpEntry {
                line: Self::help_line(&command, &self.prefix),
                detail: Self::help_detail(&command, &self.prefix),
            };
            index.insert(command.name.clone(), entry);
        }
        self.names.insert(&command);
        self.registry.register(command);
    }

    pub fn name_index(&self) -> NameIndex {
        self.names.clone()
    }

    pub fn register_defaults(&mut self) {
        let index = Arc::clone(&self.help_index);
        let names = self.names.clone();
        let prefix = self.prefix.clone();
        self.register(Command::new("help")
            .with_alias("帮助")
            .with_description("Show help message")
            .with_usage("help [command]")
            .with_handler(move |msg| {
                let index = index.read().map_err(|_| CommandError::ExecutionFailed("Lock poisoned".to_string()))?;

                if let Some(wanted) = msg.content.args().first() {
                    return Ok(names
                        .canonical(wanted)
                        .and_then(|name| index.get(&name))
                        .map(|entry| entry.detail.clone())
                        .unwrap_or_else(|| format!("Command {}{} not found", prefix, wanted)));
                }

                let mut help = "Available commands:\n".to_string();
                for entry in index.values() {
                    help.push_str(&entry.line);
                    help.push('\n');
                }
                Ok(help.trim_end().to_string())
            }));

        self.register(Command::new("version")
            .with_description("Show bot version")
            .with_handler(|_| {
                Ok(format!("qunbot v{}", env!("CARGO_PKG_VERSION")))
            }));
    }

    fn help_line(cmd: &Command, prefix: &str) -> String {
        let mut line = format!("  {}{} - {}", prefix, cmd.name, cmd.description.as_deref().unwrap_or(""));
        if !cmd.aliases.is_empty() {
            line.push_str(&format!(" ({})", cmd.aliases.join(", ")));
        }
        line
    }

    fn help_detail(cmd: &Command, prefix: &str) -> String {
        let mut help = format!("{}{} - {}", prefix, cmd.name, cmd.description.as_deref().unwrap_or("No description"));
        if let Some(usage) = &cmd.usage {
            help.push_str(&format!("\nUsage: {}{}", prefix, usage));
        }
        if !cmd.aliases.is_empty() {
            help.push_str(&format!("\nAliases: {}", cmd.aliases.join(", ")));
        }
        help
    }

    /// Find the command a parsed name refers to. Glued forms such as
    /// "启用help" resolve to the command plus the glued argument.
    pub fn resolve(&self, name: &str, args: &[String]) -> Option<(&Command, Vec<String>)> {
        if let Some(cmd) = self.registry.find(name) {
            return Some((cmd, args.to_vec()));
        }

        let (cmd, rest) = self.registry.find_attached(name)?;
        let mut full_args = vec![rest.to_string()];
        full_args.extend(args.iter().cloned());
        Some((cmd, full_args))
    }

    /// Run a command's handler on `message`
    pub fn run(&self, cmd: &Command, message: Message) -> Result<String, CommandError> {
        match &cmd.handler {
            Some(handler) => handler(message),
            None => Ok(format!("Command {} not implemented", cmd.name)),
        }
    }

    /// Resolve and run without any gating
    pub fn handle(&self, message: &Message) -> Result<Option<String>, CommandError> {
        let Content::Command { name, args } = &message.content else {
            return Ok(None);
        };

        let (cmd, args) = self.resolve(name, args)
            .ok_or_else(|| CommandError::NotFound(name.clone()))?;

        let mut message = message.clone();
        message.content = Content::Command { name: cmd.name.clone(), args };
        self.run(cmd, message).map(Some)
    }

    /// Whether any registered command has this name or alias
    pub fn contains(&self, name: &str) -> bool {
        self.registry.find(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_help() {
        let mut service = CommandService::new("/");
        service.register_defaults();
        service.register(Command::new("draw").with_description("Draw a slip").with_alias("抽签"));

        let help = service.handle(&Message::from_command("c", "help", vec![])).unwrap().unwrap();
        assert!(help.contains("/draw - Draw a slip (抽签)"));
        assert!(help.contains("/version"));

        let detail = service.handle(&Message::from_command("c", "帮助", vec!["抽签".to_string()])).unwrap().unwrap();
        assert_eq!(detail, "/draw - Draw a slip\nAliases: 抽签");
        let missing = service.handle(&Message::from_command("c", "help", vec!["nope".to_string()])).unwrap().unwrap();
        assert_eq!(missing, "Command /nope not found");

        let version = service.handle(&Message::from_command("c", "version", vec![])).unwrap().unwrap();
        assert!(version.starts_with("qunbot v"));
    }

    #[test]
    fn test_resolve_attached() {
        let mut service = CommandService::new("/");
        service.register(Command::new("enable").with_alias("启用").attached().with_handler(|msg| {
            Ok(format!("args={}", msg.content.args().join(",")))
        }));

        let (cmd, args) = service.resolve("启用help", &["global".to_string()]).unwrap();
        assert_eq!(cmd.name, "enable");
        assert_eq!(args, vec!["help".to_string(), "global".to_string()]);

        let reply = service.handle(&Message::from_command("c", "启用jrrp", vec![])).unwrap();
        assert_eq!(reply.as_deref(), Some("args=jrrp"));
    }

    #[test]
    fn test_unknown_command() {
        let service = CommandService::new("/");
        let err = service.handle(&Message::from_command("c", "nope", vec![])).unwrap_err();
        assert!(matches!(err, CommandError::NotFound(_)));
    }
}
