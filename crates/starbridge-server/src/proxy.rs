//! Proxy wiring and accept loop.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use starbridge_core::{
    CommandDispatcher, HookDispatcher, ParseCache, Plugin, PluginContext, PluginFactory,
    PluginRegistry, ReaperHandle,
};
use tokio::net::TcpListener;

use crate::{
    config::Config,
    errors::ServerError,
    players::PlayerManager,
    plugins,
    session::Session,
    storage::Store,
    worlds::WorldManager,
};

/// Everything shared across sessions.
pub struct ProxyState {
    /// Proxy configuration.
    pub config: Config,
    /// Frozen hook registry.
    pub hooks: HookDispatcher,
    /// Chat-command table.
    pub commands: Arc<CommandDispatcher>,
    /// Player manager collaborator (teardown notifications, bans).
    pub players: Arc<PlayerManager>,
    /// Record store.
    pub store: Store,
}

/// The listening proxy.
pub struct Proxy {
    listener: TcpListener,
    state: Arc<ProxyState>,
    // kept alive for the lifetime of the proxy; aborts the task on drop
    _reaper: ReaperHandle,
}

impl Proxy {
    /// Bind the listen socket and assemble the pipeline: collaborators,
    /// plugins from both factory roots, command table, hook registry and
    /// the parse-cache reaper.
    pub async fn bind(
        config: Config,
        store: Store,
        user_factories: Vec<PluginFactory>,
    ) -> Result<Self, ServerError> {
        let cache = ParseCache::new();
        let reaper = cache.spawn_reaper(Duration::from_secs(config.parse_cache_reap_secs.max(1)));

        let players = Arc::new(PlayerManager::new(store.clone()));
        let worlds = Arc::new(WorldManager::new(store.clone()));
        let commands = Arc::new(CommandDispatcher::new(config.command_prefix.clone()));

        let registry = PluginRegistry::assemble(
            plugins::system_factories(Arc::clone(&commands)),
            user_factories,
            |name| PluginContext { config: config.plugin_section(name) },
        );

        // hook sources: loaded plugins plus the built-in collaborators
        let mut hook_sources: Vec<Arc<dyn Plugin>> = Vec::new();
        hook_sources.push(Arc::clone(&players) as Arc<dyn Plugin>);
        hook_sources.push(Arc::clone(&worlds) as Arc<dyn Plugin>);
        for plugin in registry.plugins() {
            hook_sources.push(Arc::clone(plugin));
        }
        hook_sources.push(Arc::clone(&commands) as Arc<dyn Plugin>);

        for plugin in registry.plugins() {
            commands.register_plugin(plugin);
        }

        let hooks = HookDispatcher::build(&hook_sources, cache);

        let listener =
            TcpListener::bind(("0.0.0.0", config.listen_port)).await.map_err(|e| {
                ServerError::Config(format!(
                    "cannot listen on port {}: {e}",
                    config.listen_port
                ))
            })?;

        let state = Arc::new(ProxyState { config, hooks, commands, players, store });

        Ok(Self { listener, state, _reaper: reaper })
    }

    /// Address the proxy is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared state handle (used by tests).
    pub fn state(&self) -> Arc<ProxyState> {
        Arc::clone(&self.state)
    }

    /// Accept clients forever, one session per connection.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!(addr = %self.local_addr()?, "proxy listening");
        loop {
            match self.listener.accept().await {
                Ok((client, _)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(err) = Session::run(state, client).await {
                            tracing::warn!(error = %err, "session ended with error");
                        }
                    });
                },
                Err(err) => {
                    tracing::error!(error = %err, "accept failed");
                },
            }
        }
    }
}
