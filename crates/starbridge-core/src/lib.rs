//! Message-handling pipeline for the Starbridge proxy.
//!
//! Sits between the codecs ([`starbridge_proto`]) and the TCP relay:
//!
//! - [`cache`]: process-wide refcounted parse cache with an epoch reaper
//! - [`parsing`]: demand-driven parse and edit-merging rebuild
//! - [`hooks`]: frozen per-type hook chains with veto semantics
//! - [`plugin`]: the plugin trait, factories and dependency resolution
//! - [`commands`]: the chat-command dispatcher
//! - [`session`]: the surface plugins see of a live connection
//!
//! Everything here is runtime-agnostic apart from the reaper task.

pub mod cache;
pub mod commands;
pub mod errors;
pub mod hooks;
pub mod parsing;
pub mod plugin;
pub mod session;
#[cfg(test)]
pub(crate) mod testutil;

pub use cache::{ParseCache, ReaperHandle};
pub use commands::CommandDispatcher;
pub use errors::{CommandError, PluginError};
pub use hooks::HookDispatcher;
pub use parsing::{build_packet, parse_packet};
pub use plugin::{CommandSpec, HookSpec, Plugin, PluginContext, PluginFactory, PluginRegistry};
pub use session::SessionHandle;
