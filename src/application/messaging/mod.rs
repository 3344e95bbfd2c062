//! Message handling - Event-driven message processing

pub mod dispatcher;
pub mod middleware;
pub mod parser;

pub use dispatcher::MessageDispatcher;
pub use middleware::{
    Context, CooldownMiddleware, GateMiddleware, Invocation, LoggingMiddleware, Middleware, MiddlewareChain,
    MiddlewareError,
};
pub use parser::MessageParser;
