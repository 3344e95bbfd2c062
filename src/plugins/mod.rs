//! Built-in plugins for qunbot
//!
//! Every plugin registers a capability descriptor and its commands at
//! startup. The plugin manager layer decides at dispatch time whether they run.

pub mod draw_lots;
pub mod jrrp;
pub mod manager;
pub mod trait_def;

use std::sync::Arc;

pub use draw_lots::DrawLotsPlugin;
pub use jrrp::JrrpPlugin;
pub use manager::{PluginInfo, PluginManager};
pub use trait_def::Plugin;

/// Plugins compiled into the bot, in listing order
pub fn builtins() -> Vec<Arc<dyn Plugin>> {
    vec![Arc::new(JrrpPlugin), Arc::new(DrawLotsPlugin)]
}
