//! World tracking.
//!
//! Follows players between worlds through world-start and warp-result
//! frames, keeping the worlds table and each player's current/previous
//! location strings up to date. Location strings discriminate the world
//! kind: `CelestialWorld:x:y:z:planet[:satellite]`, `ShipWorld:<uuid>`,
//! `InstanceWorld:<type>:<id>`.

use std::sync::Arc;

use async_trait::async_trait;
use starbridge_core::{HookSpec, Plugin, PluginError, SessionHandle};
use starbridge_proto::{Packet, PacketType, Value};

use crate::{
    players::unix_now,
    storage::{StorageError, Store, World},
};

/// Built-in world manager collaborator.
pub struct WorldManager {
    store: Store,
}

impl WorldManager {
    /// Manager over the shared store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Upsert a celestial world from template parameters and return its
    /// location string.
    fn add_or_get_planet(&self, c_params: &Value) -> Result<Option<String>, StorageError> {
        let Some(coords) = c_params.get("coordinate") else {
            return Ok(None);
        };
        let Some(location) = coords.get("location").and_then(Value::as_list) else {
            return Ok(None);
        };
        let [x, y, z] = location else {
            return Ok(None);
        };
        let (Some(x), Some(y), Some(z)) = (x.as_i64(), y.as_i64(), z.as_i64()) else {
            return Ok(None);
        };
        let planet = coords.get("planet").and_then(Value::as_i64).unwrap_or(0);
        let satellite = coords.get("satellite").and_then(Value::as_i64).unwrap_or(0);
        let name =
            c_params.get("name").and_then(Value::as_str).unwrap_or_default().to_owned();

        let mut planet_str = format!("CelestialWorld:{x}:{y}:{z}:{planet}");
        if satellite > 0 {
            planet_str.push_str(&format!(":{satellite}"));
        }

        if self.store.world(&planet_str)?.is_none() {
            tracing::info!(world = %planet_str, "adding entry for new planet");
            self.store
                .upsert_world(&planet_str, &World::Celestial { x, y, z, planet, satellite, name })?;
        }
        Ok(Some(planet_str))
    }

    fn add_or_get_ship(&self, owner_uuid: &str) -> Result<String, StorageError> {
        let loc_str = format!("ShipWorld:{owner_uuid}");
        if self.store.world(&loc_str)?.is_none() {
            tracing::info!(owner = owner_uuid, "adding entry for new ship");
            self.store
                .upsert_world(&loc_str, &World::Ship { owner_uuid: owner_uuid.to_owned() })?;
        }
        Ok(loc_str)
    }

    fn add_or_get_instance(
        &self,
        instance_type: &str,
        instance_id: &str,
    ) -> Result<String, StorageError> {
        let loc_str = format!("InstanceWorld:{instance_type}:{instance_id}");
        if self.store.world(&loc_str)?.is_none() {
            tracing::info!(world = %loc_str, "adding entry for new persistent instance");
            self.store.upsert_world(
                &loc_str,
                &World::Instance {
                    instance_type: instance_type.to_owned(),
                    instance_id: Some(instance_id.to_owned()),
                },
            )?;
        }
        Ok(loc_str)
    }

    fn move_player(&self, uuid: &str, new_location: Option<String>) -> Result<(), StorageError> {
        let Some(mut player) = self.store.player(uuid)? else {
            return Ok(());
        };
        let Some(new_location) = new_location else {
            return Ok(());
        };
        player.previous_location = player.location.take();
        player.location = Some(new_location.clone());
        player.last_seen = unix_now();
        self.store.upsert_player(&player)?;
        tracing::info!(player = %player.alias, location = %new_location, "player moved");
        Ok(())
    }

    fn swap_player_location(&self, uuid: &str) -> Result<(), StorageError> {
        let Some(mut player) = self.store.player(uuid)? else {
            return Ok(());
        };
        std::mem::swap(&mut player.location, &mut player.previous_location);
        self.store.upsert_player(&player)?;
        Ok(())
    }

    async fn on_world_start(
        &self,
        packet: &Packet,
        session: &Arc<dyn SessionHandle>,
    ) -> Result<bool, PluginError> {
        let c_params = packet
            .parsed
            .as_ref()
            .and_then(|p| p.get("template_data"))
            .and_then(|t| t.get("celestialParameters"));
        let Some(c_params) = c_params else {
            return Ok(true);
        };
        if c_params.is_null() {
            // ships and instances have no celestial parameters; their
            // location is settled by the warp-result hook
            return Ok(true);
        }

        let location = self.add_or_get_planet(c_params)?;
        if let Some(uuid) = session.player_uuid() {
            self.move_player(&uuid, location)?;
        }
        Ok(true)
    }

    async fn on_warp_result(
        &self,
        packet: &Packet,
        session: &Arc<dyn SessionHandle>,
    ) -> Result<bool, PluginError> {
        let Some(parsed) = packet.parsed.as_ref() else {
            return Ok(true);
        };
        if parsed.get("success").and_then(Value::as_bool) != Some(true) {
            return Ok(true);
        }
        let Some(warp) = parsed.get("warp_action") else {
            return Ok(true);
        };
        let Some(uuid) = session.player_uuid() else {
            return Ok(true);
        };

        match warp.get("warp_type").and_then(Value::as_u64) {
            // to-alias
            Some(3) => match warp.get("alias_type").and_then(Value::as_i64) {
                // ship alias: the player's own ship
                Some(2) => {
                    let loc = self.add_or_get_ship(&uuid)?;
                    self.move_player(&uuid, Some(loc))?;
                },
                // return alias: swap current and previous
                Some(0) => self.swap_player_location(&uuid)?,
                // orbited alias is settled by world-start
                _ => {},
            },
            // to-player: inherit the target's location
            Some(2) => {
                if let Some(target_uuid) = warp.get("player_uuid").and_then(Value::as_str) {
                    let target_location =
                        self.store.player(target_uuid)?.and_then(|p| p.location);
                    self.move_player(&uuid, target_location)?;
                }
            },
            // to-world
            Some(1) => match warp.get("world_type").and_then(Value::as_u64) {
                // celestial worlds are settled by the world-start hook
                Some(1) => {},
                Some(2) => {
                    if let Some(owner) = warp.get("ship_owner").and_then(Value::as_str) {
                        let loc = self.add_or_get_ship(owner)?;
                        self.move_player(&uuid, Some(loc))?;
                    }
                },
                Some(3) => {
                    // only persistent instances carry an id
                    if let (Some(instance_type), Some(instance_id)) = (
                        warp.get("instance_type").and_then(Value::as_str),
                        warp.get("instance_id").and_then(Value::as_str),
                    ) {
                        let loc = self.add_or_get_instance(instance_type, instance_id)?;
                        self.move_player(&uuid, Some(loc))?;
                    }
                },
                _ => {},
            },
            _ => {},
        }
        Ok(true)
    }
}

#[async_trait]
impl Plugin for WorldManager {
    fn name(&self) -> &str {
        "world_manager"
    }

    fn description(&self) -> &str {
        "Tracks worlds and player locations."
    }

    fn hooks(&self) -> Vec<HookSpec> {
        vec![
            HookSpec::with_priority(PacketType::WorldStart, 99),
            HookSpec::with_priority(PacketType::PlayerWarpResult, 99),
        ]
    }

    async fn handle(
        &self,
        packet: &mut Packet,
        session: &Arc<dyn SessionHandle>,
    ) -> Result<bool, PluginError> {
        match packet.packet_type {
            PacketType::WorldStart => self.on_world_start(packet, session).await,
            PacketType::PlayerWarpResult => self.on_warp_result(packet, session).await,
            _ => Ok(true),
        }
    }
}
