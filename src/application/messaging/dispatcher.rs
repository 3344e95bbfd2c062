//! Message dispatcher - Routes messages through the gate to command handlers

use std::sync::Arc;

use super::middleware::{
    Context, CooldownMiddleware, Endpoint, GateMiddleware, Invocation, LoggingMiddleware, Middleware,
    MiddlewareChain, MiddlewareError, Next,
};
use super::parser::MessageParser;
use crate::application::errors::BotError;
use crate::application::services::{CommandService, SharedManager};
use crate::domain::entities::{Command, Content, Message, PermissionLevel, User};

/// Dispatch result: the reply to send, if any
pub type HandlerResult = Result<Option<String>, BotError>;

/// Message dispatcher - routes messages through middleware to handlers
pub struct MessageDispatcher {
    parser: MessageParser,
    commands: Arc<CommandService>,
    manager: SharedManager,
    middleware: Vec<Arc<dyn Middleware>>,
    reply_on_deny: bool,
    reply_on_cooldown: bool,
}

impl MessageDispatcher {
    /// Dispatcher with the standard logging, gate and cooldown chain
    pub fn new(commands: CommandService, manager: SharedManager) -> Self {
        let middleware = MiddlewareChain::new()
            .add(LoggingMiddleware)
            .add(GateMiddleware::new(manager.clone()))
            .add(CooldownMiddleware::new(manager.clone()))
            .build();

        Self {
            parser: MessageParser::new(commands.prefix()),
            commands: Arc::new(commands),
            manager,
            middleware,
            reply_on_deny: true,
            reply_on_cooldown: true,
        }
    }

    /// Choose whether denied and cooling-down invocations get a reply
    pub fn with_replies(mut self, on_deny: bool, on_cooldown: bool) -> Self {
        self.reply_on_deny = on_deny;
        self.reply_on_cooldown = on_cooldown;
        self
    }

    /// Add middleware to the end of the chain
    pub fn with_middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn manager(&self) -> &SharedManager {
        &self.manager
    }

    pub fn commands(&self) -> &CommandService {
        &self.commands
    }

    /// Parse and process a raw text line
    pub fn process_text(
        &self,
        chat_id: impl Into<String>,
        text: impl Into<String>,
        sender: Option<User>,
        group_id: Option<&str>,
    ) -> HandlerResult {
        let message = self.parser.parse(chat_id, text, sender, group_id);
        self.process(message)
    }

    /// Process a message through the dispatcher
    pub fn process(&self, message: Message) -> HandlerResult {
        let Content::Command { name, args } = &message.content else {
            return Ok(None);
        };

        let Some((command, args)) = self.commands.resolve(name, args) else {
            tracing::debug!("Ignoring unknown command: {}", name);
            return Ok(None);
        };

        let invocation = self.invocation(command);

        let mut message = message.clone();
        message.content = Content::Command { name: command.name.clone(), args };

        let ctx = Context::new(message).with_invocation(invocation);
        let next = Next::new(self.middleware.clone()).with_endpoint(self.endpoint());

        match next.run(ctx) {
            Ok(ctx) => Ok(ctx.response().cloned()),
            Err(MiddlewareError::Disabled(key)) => {
                tracing::debug!("{} is disabled here, ignoring", key);
                Ok(None)
            }
            Err(MiddlewareError::PermissionDenied(command)) => Ok(self
                .reply_on_deny
                .then(|| format!("Permission denied: {}", command))),
            Err(MiddlewareError::CoolingDown { remaining }) => Ok(self
                .reply_on_cooldown
                .then(|| format!("Cooling down, try again in {}s", remaining))),
            Err(MiddlewareError::Blocked(msg)) => Ok(Some(msg)),
            Err(MiddlewareError::Failed(msg)) => Ok(Some(format!("Error: {}", msg))),
            Err(MiddlewareError::Internal(msg)) => Err(BotError::Internal(msg)),
        }
    }

    /// What the gate would see for the command called `name`
    pub fn lookup(&self, name: &str) -> Option<Invocation> {
        self.commands.resolve(name, &[]).map(|(command, _)| self.invocation(command))
    }

    fn invocation(&self, command: &Command) -> Invocation {
        Invocation {
            command: command.name.clone(),
            key: command.key(),
            required: self.required_level(command),
        }
    }

    /// The stricter of the command's own level and its plugin's level
    fn required_level(&self, command: &Command) -> PermissionLevel {
        let plugin_level = command.plugin.as_deref().and_then(|plugin| {
            let manager = self.manager.read().ok()?;
            manager.registry().descriptor(plugin).map(|d| d.permission)
        });
        plugin_level.map_or(command.permission, |level| level.max(command.permission))
    }

    /// Runs the resolved command's handler
    fn endpoint(&self) -> Endpoint {
        let commands = Arc::clone(&self.commands);
        Arc::new(move |mut ctx: Context| {
            let Content::Command { name, args } = &ctx.message.content else {
                return Ok(ctx);
            };
            let (command, _) = commands
                .resolve(name, args)
                .ok_or_else(|| MiddlewareError::Internal(format!("Command {} vanished", name)))?;

            match commands.run(command, ctx.message.clone()) {
                Ok(response) => {
                    ctx.set("response", response);
                    Ok(ctx)
                }
                Err(e) => Err(MiddlewareError::Failed(e.to_string())),
            }
        })
    }
}
