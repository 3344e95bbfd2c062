//! Platform adapters

pub mod console;

pub use console::{ConsoleAdapter, LineOutcome, Session};
