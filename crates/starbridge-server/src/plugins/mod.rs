//! Bundled system plugins.
//!
//! These factories form the system root of the plugin loader; user
//! factories supplied by the embedder form the other.

mod info;

use std::sync::Arc;

use starbridge_core::{CommandDispatcher, PluginFactory};

pub use info::InfoCommands;

/// Factories for the plugins shipped with the proxy.
pub fn system_factories(commands: Arc<CommandDispatcher>) -> Vec<PluginFactory> {
    vec![PluginFactory::new("info_commands", move |_| {
        Arc::new(InfoCommands::new(Arc::clone(&commands)))
    })]
}
