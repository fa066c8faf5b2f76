//! Per-type hook chains and the dispatch algorithm.
//!
//! The registry is built once at startup and frozen; the sorted per-type
//! vector is the hot path and dispatch allocates nothing on it. For a
//! type with no hooks the codec is never touched and the frame forwards
//! untouched.

use std::{collections::HashMap, sync::Arc};

use starbridge_proto::{Packet, PacketType, ProtocolError};

use crate::{
    cache::ParseCache,
    parsing::{build_packet, parse_packet},
    plugin::Plugin,
    session::SessionHandle,
};

struct HookEntry {
    priority: i32,
    plugin: Arc<dyn Plugin>,
}

/// Frozen mapping of packet type to its ordered hook chain.
pub struct HookDispatcher {
    chains: HashMap<PacketType, Vec<HookEntry>>,
    cache: ParseCache,
}

impl HookDispatcher {
    /// Collect every hook of every plugin, sorted by descending priority
    /// with insertion order as the tie-break.
    pub fn build(plugins: &[Arc<dyn Plugin>], cache: ParseCache) -> Self {
        let mut chains: HashMap<PacketType, Vec<HookEntry>> = HashMap::new();
        for plugin in plugins {
            for spec in plugin.hooks() {
                chains
                    .entry(spec.packet_type)
                    .or_default()
                    .push(HookEntry { priority: spec.priority, plugin: Arc::clone(plugin) });
            }
        }
        for chain in chains.values_mut() {
            // stable sort keeps insertion order within equal priorities
            chain.sort_by(|a, b| b.priority.cmp(&a.priority));
        }
        tracing::debug!(types = chains.len(), "hook registry frozen");
        Self { chains, cache }
    }

    /// Whether any hook is registered for `packet_type`.
    pub fn has_hooks(&self, packet_type: PacketType) -> bool {
        self.chains.get(&packet_type).is_some_and(|c| !c.is_empty())
    }

    /// The shared parse cache.
    pub fn cache(&self) -> &ParseCache {
        &self.cache
    }

    /// Run the hook chain for one packet and return the forward bit.
    ///
    /// - No hooks: `Ok(true)`, codec untouched.
    /// - Handlers run in priority order; a `false` return clears the
    ///   forward bit but the chain continues, so low-priority handlers
    ///   still see the message.
    /// - A handler error is logged with the plugin name and the chain
    ///   continues.
    /// - Pending edits trigger a rebuild afterwards; editing a type with
    ///   no encoder is an error and propagates.
    pub async fn dispatch(
        &self,
        packet: &mut Packet,
        session: &Arc<dyn SessionHandle>,
    ) -> Result<bool, ProtocolError> {
        let Some(chain) = self.chains.get(&packet.packet_type) else {
            return Ok(true);
        };
        if chain.is_empty() {
            return Ok(true);
        }

        parse_packet(packet, &self.cache);

        let mut forward = true;
        for entry in chain {
            match entry.plugin.handle(packet, session).await {
                Ok(true) => {},
                Ok(false) => forward = false,
                Err(err) => {
                    tracing::error!(
                        plugin = entry.plugin.name(),
                        packet_type = ?packet.packet_type,
                        error = %err,
                        "hook handler failed"
                    );
                },
            }
        }

        if !packet.edits.is_empty() {
            build_packet(packet)?;
        }

        Ok(forward)
    }
}
