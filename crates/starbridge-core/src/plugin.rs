//! Plugin model and assembly.
//!
//! Plugins are trait objects registered through factories. Factories come
//! from two roots: the system set bundled with the proxy and the user set
//! supplied by the embedder. A factory whose declared dependencies are
//! missing is dropped with a warning; beyond dependency presence,
//! activation order is not observable and plugins must not rely on it.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use starbridge_proto::{Packet, PacketType};

use crate::{
    errors::{CommandError, PluginError},
    session::SessionHandle,
};

/// A hook registration: packet-type filter plus chain priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookSpec {
    /// Packet type the hook fires on.
    pub packet_type: PacketType,
    /// Chain position; higher runs earlier, ties keep insertion order.
    pub priority: i32,
}

impl HookSpec {
    /// Hook at priority 0.
    pub fn new(packet_type: PacketType) -> Self {
        Self { packet_type, priority: 0 }
    }

    /// Hook at an explicit priority.
    pub fn with_priority(packet_type: PacketType, priority: i32) -> Self {
        Self { packet_type, priority }
    }
}

/// A chat command exposed by a plugin.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    /// Primary name; lowercased on registration.
    pub name: String,
    /// Alternate names; never displace a primary registration.
    pub aliases: Vec<String>,
    /// Permissions the invoking player must hold (subset check).
    pub perms: Vec<String>,
    /// One-line description for help output.
    pub doc: String,
    /// Argument template shown on syntax errors.
    pub syntax: String,
    /// Conflict-resolution priority.
    pub priority: i32,
    /// Help grouping.
    pub category: String,
}

impl CommandSpec {
    /// Command with defaults: no aliases, no perms, priority 0,
    /// category "other".
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), category: "other".to_owned(), ..Self::default() }
    }

    /// Add an alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Require a permission.
    #[must_use]
    pub fn perm(mut self, perm: impl Into<String>) -> Self {
        self.perms.push(perm.into());
        self
    }

    /// Set the doc line.
    #[must_use]
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Set the syntax template.
    #[must_use]
    pub fn syntax(mut self, syntax: impl Into<String>) -> Self {
        self.syntax = syntax.into();
        self
    }

    /// Set the conflict priority.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// A loadable proxy extension.
///
/// `handle` runs once per registered hook match; `command` runs when the
/// command dispatcher routes one of this plugin's commands.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable plugin name (also the config-section key).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str {
        ""
    }

    /// Plugin version string.
    fn version(&self) -> &str {
        "0.1"
    }

    /// Hooks to insert into the dispatcher.
    fn hooks(&self) -> Vec<HookSpec> {
        Vec::new()
    }

    /// Commands to register with the command dispatcher.
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }

    /// Inspect, mutate (via `packet.edits`) or veto a frame. Returning
    /// `false` clears the forward bit; the rest of the chain still runs.
    async fn handle(
        &self,
        _packet: &mut Packet,
        _session: &Arc<dyn SessionHandle>,
    ) -> Result<bool, PluginError> {
        Ok(true)
    }

    /// Run one of this plugin's commands. `name` is the primary name the
    /// command was registered under.
    async fn command(
        &self,
        name: &str,
        _packet: &Packet,
        _session: &Arc<dyn SessionHandle>,
    ) -> Result<(), CommandError> {
        Err(CommandError::Failure(format!("command {name} has no handler")))
    }
}

/// Construction-time context handed to a plugin factory.
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
    /// This plugin's section of the configuration file.
    pub config: serde_json::Value,
}

/// Deferred plugin constructor plus its load metadata.
pub struct PluginFactory {
    /// Plugin name, matched against dependency declarations.
    pub name: &'static str,
    /// Names of plugins that must also be present.
    pub dependencies: &'static [&'static str],
    build: Box<dyn Fn(&PluginContext) -> Arc<dyn Plugin> + Send + Sync>,
}

impl PluginFactory {
    /// Factory with no dependencies.
    pub fn new<F>(name: &'static str, build: F) -> Self
    where
        F: Fn(&PluginContext) -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        Self { name, dependencies: &[], build: Box::new(build) }
    }

    /// Factory that requires other plugins by name.
    pub fn with_dependencies<F>(
        name: &'static str,
        dependencies: &'static [&'static str],
        build: F,
    ) -> Self
    where
        F: Fn(&PluginContext) -> Arc<dyn Plugin> + Send + Sync + 'static,
    {
        Self { name, dependencies, build: Box::new(build) }
    }
}

impl std::fmt::Debug for PluginFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginFactory")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// The assembled set of live plugin instances.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl PluginRegistry {
    /// Instantiate plugins from the system and user factory roots.
    ///
    /// Factories with unsatisfied dependencies are dropped with a warning;
    /// dropping one can cascade into its dependents.
    pub fn assemble(
        system: Vec<PluginFactory>,
        user: Vec<PluginFactory>,
        mut context_for: impl FnMut(&str) -> PluginContext,
    ) -> Self {
        let mut factories: Vec<PluginFactory> =
            system.into_iter().chain(user).collect();

        loop {
            let present: HashSet<&'static str> =
                factories.iter().map(|f| f.name).collect();
            let before = factories.len();
            factories.retain(|factory| {
                let missing: Vec<&&str> = factory
                    .dependencies
                    .iter()
                    .filter(|dep| !present.contains(**dep))
                    .collect();
                if missing.is_empty() {
                    true
                } else {
                    tracing::warn!(
                        plugin = factory.name,
                        ?missing,
                        "dropping plugin with unsatisfied dependencies"
                    );
                    false
                }
            });
            if factories.len() == before {
                break;
            }
        }

        let mut plugins = Vec::with_capacity(factories.len());
        for factory in &factories {
            let context = context_for(factory.name);
            let plugin = (factory.build)(&context);
            tracing::debug!(plugin = plugin.name(), version = plugin.version(), "loaded plugin");
            plugins.push(plugin);
        }
        Self { plugins }
    }

    /// Wrap already-built instances (collaborators, tests).
    pub fn from_instances(plugins: Vec<Arc<dyn Plugin>>) -> Self {
        Self { plugins }
    }

    /// Append an already-built instance.
    pub fn push(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    /// The live instances, in activation order.
    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// Look up a plugin by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.iter().find(|p| p.name() == name)
    }
}
