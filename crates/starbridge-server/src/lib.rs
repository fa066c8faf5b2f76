//! Starbridge proxy server.
//!
//! Sits between game clients and an upstream game server, ferrying framed
//! messages in both directions while plugins inspect, suppress or mutate
//! them. This crate is the I/O shell around [`starbridge_core`]: TCP
//! accept loop, per-session relay tasks, configuration, the record store
//! and the built-in collaborators (player manager, world manager, bundled
//! plugins).

#![forbid(unsafe_code)]

pub mod config;
mod errors;
pub mod players;
pub mod plugins;
pub mod proxy;
pub mod session;
pub mod storage;
#[cfg(test)]
pub(crate) mod testutil;
pub mod worlds;

pub use config::{Config, ConfigManager};
pub use errors::ServerError;
pub use players::PlayerManager;
pub use proxy::{Proxy, ProxyState};
pub use session::Session;
pub use storage::{Ban, BanKind, IpRecord, Player, StorageError, Store, World};
pub use worlds::WorldManager;
