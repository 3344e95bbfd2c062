//! Middleware system for message processing pipeline

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use crate::application::services::{AccessRequest, Admission, SharedManager};
use crate::domain::entities::{GroupRole, Message, PermissionLevel, PluginKey};

/// The command a message resolved to, as the gate sees it
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Primary command name
    pub command: String,
    /// Plugin or feature the command belongs to
    pub key: Option<PluginKey>,
    pub required: PermissionLevel,
}

/// Context passed through middleware chain
#[derive(Debug, Clone)]
pub struct Context {
    pub message: Message,
    pub chat_id: String,
    pub user_id: String,
    pub role: GroupRole,
    pub invocation: Option<Invocation>,
    pub data: HashMap<String, String>,
}

impl Context {
    pub fn new(message: Message) -> Self {
        let chat_id = message.chat_id.clone();
        let user_id = message.sender_id().to_string();
        let role = message.sender.as_ref().map(|u| u.role).unwrap_or_default();

        Self {
            message,
            chat_id,
            user_id,
            role,
            invocation: None,
            data: HashMap::new(),
        }
    }

    pub fn with_invocation(mut self, invocation: Invocation) -> Self {
        self.invocation = Some(invocation);
        self
    }

    /// Get data from context
    pub fn get(&self, key: &str) -> Option<&String> {
        self.data.get(key)
    }

    /// Set data in context
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn response(&self) -> Option<&String> {
        self.get("response")
    }

    /// Gate request for the current invocation, if there is one
    fn access_request(&self) -> Option<AccessRequest<'_>> {
        let invocation = self.invocation.as_ref()?;
        Some(
            AccessRequest::new(&self.user_id, self.message.group_id.as_deref(), &invocation.command)
                .with_role(self.role)
                .with_plugin(invocation.key.as_ref().map(|k| k.plugin.as_str()))
                .with_required(invocation.required),
        )
    }
}

/// Middleware trait - processors that can intercept and modify message handling
pub trait Middleware: Send + Sync {
    /// Process a message and optionally modify the context
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult;
}

/// Result of middleware processing
pub type MiddlewareResult = Result<Context, MiddlewareError>;

/// Middleware errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddlewareError {
    /// Stop processing and reply with this text
    Blocked(String),
    /// The plugin or feature is switched off here
    Disabled(PluginKey),
    /// Permission denied
    PermissionDenied(String),
    /// Still cooling down for this many seconds
    CoolingDown { remaining: u64 },
    /// The handler returned an error
    Failed(String),
    /// Internal error
    Internal(String),
}

impl std::fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiddlewareError::Blocked(msg) => write!(f, "Blocked: {}", msg),
            MiddlewareError::Disabled(key) => write!(f, "{} is disabled", key),
            MiddlewareError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            MiddlewareError::CoolingDown { remaining } => {
                write!(f, "Cooling down, {}s remaining", remaining)
            }
            MiddlewareError::Failed(msg) => write!(f, "Command failed: {}", msg),
            MiddlewareError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for MiddlewareError {}

/// Final step of the chain, run once every middleware has passed
pub type Endpoint = Arc<dyn Fn(Context) -> MiddlewareResult + Send + Sync>;

/// Next middleware in chain
#[derive(Clone)]
pub struct Next {
    remaining: Arc<Vec<Arc<dyn Middleware>>>,
    endpoint: Option<Endpoint>,
}

impl Next {
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            remaining: Arc::new(middlewares),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Process remaining middleware
    pub fn run(self, ctx: Context) -> MiddlewareResult {
        if let Some(first) = self.remaining.first() {
            let next = Next {
                remaining: Arc::new(self.remaining[1..].to_vec()),
                endpoint: self.endpoint.clone(),
            };
            first.process(ctx, next)
        } else if let Some(endpoint) = self.endpoint {
            endpoint(ctx)
        } else {
            Ok(ctx)
        }
    }
}

/// Middleware chain builder
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> Vec<Arc<dyn Middleware>> {
        self.middlewares
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Rejects commands whose plugin is switched off or whose rules deny the sender
pub struct GateMiddleware {
    manager: SharedManager,
}

impl GateMiddleware {
    pub fn new(manager: SharedManager) -> Self {
        Self { manager }
    }
}

impl Middleware for GateMiddleware {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        let Some(request) = ctx.access_request() else {
            return next.run(ctx);
        };

        let admission = {
            let manager = self.manager.read()
                .map_err(|_| MiddlewareError::Internal("Lock poisoned".to_string()))?;
            let key = ctx.invocation.as_ref().and_then(|i| i.key.as_ref());
            manager.admit(&request, key, Utc::now())
        };

        match admission {
            Admission::Disabled(key) => Err(MiddlewareError::Disabled(key)),
            Admission::Denied => Err(MiddlewareError::PermissionDenied(request.command.to_string())),
            // cooldowns are the next middleware's call
            Admission::CoolingDown(_) | Admission::Allowed => next.run(ctx),
        }
    }
}

/// Per-group cooldowns, counted only when the handler succeeds
pub struct CooldownMiddleware {
    manager: SharedManager,
}

impl CooldownMiddleware {
    pub fn new(manager: SharedManager) -> Self {
        Self { manager }
    }
}

impl Middleware for CooldownMiddleware {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        let key = ctx.invocation.as_ref().and_then(|i| i.key.clone());
        let (Some(key), Some(group)) = (key, ctx.message.group_id.clone()) else {
            return next.run(ctx);
        };
        let user_id = ctx.user_id.clone();

        {
            let manager = self.manager.read()
                .map_err(|_| MiddlewareError::Internal("Lock poisoned".to_string()))?;
            if !manager.is_superuser(&user_id) {
                let cooldowns = manager.cooldowns();
                let counted = cooldowns.effective_key(&key, &group);
                let remaining = cooldowns.remaining(&counted, &group, &user_id, Utc::now());
                if remaining > 0 {
                    return Err(MiddlewareError::CoolingDown { remaining });
                }
            }
        }

        let ctx = next.run(ctx)?;

        let mut manager = self.manager.write()
            .map_err(|_| MiddlewareError::Internal("Lock poisoned".to_string()))?;
        let request = AccessRequest::new(&user_id, Some(&group), "");
        if manager.record_use(&request, Some(&key), Utc::now()) {
            if let Err(e) = manager.persist() {
                tracing::warn!("Failed to persist cooldown usage: {}", e);
            }
        }

        Ok(ctx)
    }
}

/// Logging middleware for debugging
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn process(&self, ctx: Context, next: Next) -> MiddlewareResult {
        let command = ctx.invocation.as_ref().map(|i| i.command.clone()).unwrap_or_default();
        let chat_id = ctx.chat_id.clone();
        let user_id = ctx.user_id.clone();

        tracing::debug!("[{}] {} -> {}", chat_id, user_id, command);

        let result = next.run(ctx);

        match &result {
            Ok(_) => {
                tracing::debug!("[{}] {} processed OK", chat_id, command);
            }
            Err(MiddlewareError::Failed(e)) | Err(MiddlewareError::Internal(e)) => {
                tracing::warn!("[{}] {} error: {}", chat_id, command, e);
            }
            Err(e) => {
                tracing::debug!("[{}] {} stopped: {}", chat_id, command, e);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::ManagerService;
    use crate::domain::entities::{PluginDescriptor, Scope, User};
    use crate::infrastructure::storage::MemoryStore;

    fn shared() -> SharedManager {
        let mut manager = ManagerService::new(Box::new(MemoryStore::new()), ["1"]);
        manager.register(PluginDescriptor::new("jrrp"));
        manager.into_shared()
    }

    fn jrrp_context(user: &str) -> Context {
        let msg = Message::from_command("g1", "jrrp", vec![])
            .in_group("g1")
            .with_sender(User::new(user));
        Context::new(msg).with_invocation(Invocation {
            command: "jrrp".to_string(),
            key: Some(PluginKey::plugin("jrrp")),
            required: PermissionLevel::Everyone,
        })
    }

    fn endpoint() -> Endpoint {
        Arc::new(|mut ctx: Context| {
            ctx.set("response", "ok");
            Ok(ctx)
        })
    }

    #[test]
    fn test_endpoint_runs_after_chain() {
        let chain = MiddlewareChain::new().add(LoggingMiddleware).build();
        let ctx = Next::new(chain).with_endpoint(endpoint()).run(jrrp_context("2")).unwrap();
        assert_eq!(ctx.response().map(String::as_str), Some("ok"));
    }

    #[test]
    fn test_gate_blocks_disabled_plugin() {
        let manager = shared();
        manager.write().unwrap().registry_mut().set_enabled("jrrp", &Scope::group("g1"), false).unwrap();

        let chain = MiddlewareChain::new().add(GateMiddleware::new(manager)).build();
        let err = Next::new(chain).with_endpoint(endpoint()).run(jrrp_context("2")).unwrap_err();
        assert_eq!(err, MiddlewareError::Disabled(PluginKey::plugin("jrrp")));
    }

    #[test]
    fn test_cooldown_counts_successful_runs() {
        let manager = shared();
        manager.write().unwrap().cooldowns_mut().set(&PluginKey::plugin("jrrp"), "g1", 60);

        let chain = MiddlewareChain::new().add(CooldownMiddleware::new(manager.clone())).build();
        let next = Next::new(chain).with_endpoint(endpoint());

        assert!(next.clone().run(jrrp_context("2")).is_ok());
        let err = next.clone().run(jrrp_context("2")).unwrap_err();
        assert!(matches!(err, MiddlewareError::CoolingDown { remaining } if remaining > 0 && remaining <= 60));

        // other users and super-users are unaffected
        assert!(next.clone().run(jrrp_context("3")).is_ok());
        assert!(next.clone().run(jrrp_context("1")).is_ok());
        assert!(next.run(jrrp_context("1")).is_ok());
    }
}
