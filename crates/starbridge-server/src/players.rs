//! Player bookkeeping and ban enforcement.
//!
//! Registered as a built-in hook source alongside loaded plugins. On
//! client-connect it canonicalizes the player record, stamps IP history
//! and rejects banned clients with an injected connect-failure; on
//! connect-success it marks the login; teardown calls `close_out`.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use starbridge_core::{HookSpec, Plugin, PluginError, SessionHandle};
use starbridge_proto::{Direction, Packet, PacketType, Value, ValueMap};

use crate::storage::{Ban, BanKind, Player, StorageError, Store};

/// Unix seconds now.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

/// Built-in player manager collaborator.
pub struct PlayerManager {
    store: Store,
}

impl PlayerManager {
    /// Manager over the shared store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The first still-active ban matching the address or uuid.
    fn active_ban(&self, ip: &str, uuid: &str) -> Result<Option<Ban>, StorageError> {
        let now = unix_now();
        if let Some(ban) = self.store.find_ban(BanKind::Ip, ip)? {
            if ban.active_at(now) {
                return Ok(Some(ban));
            }
        }
        if let Some(ban) = self.store.find_ban(BanKind::Uuid, uuid)? {
            if ban.active_at(now) {
                return Ok(Some(ban));
            }
        }
        Ok(None)
    }

    /// Ban an address.
    pub fn ban_ip(
        &self,
        ip: &str,
        reason: &str,
        banned_by: &str,
        duration_secs: Option<u64>,
    ) -> Result<(), StorageError> {
        self.store.add_ban(&Ban {
            kind: BanKind::Ip,
            value: ip.to_owned(),
            reason: reason.to_owned(),
            banned_by: banned_by.to_owned(),
            timestamp: unix_now(),
            duration_secs,
        })
    }

    /// Ban a player uuid.
    pub fn ban_uuid(
        &self,
        uuid: &str,
        reason: &str,
        banned_by: &str,
        duration_secs: Option<u64>,
    ) -> Result<(), StorageError> {
        self.store.add_ban(&Ban {
            kind: BanKind::Uuid,
            value: uuid.to_owned(),
            reason: reason.to_owned(),
            banned_by: banned_by.to_owned(),
            timestamp: unix_now(),
            duration_secs,
        })
    }

    /// Lift a ban.
    pub fn unban(&self, kind: BanKind, value: &str) -> Result<bool, StorageError> {
        self.store.remove_ban(kind, value)
    }

    /// Session teardown: mark the player logged out and stamp last-seen.
    pub async fn close_out(&self, uuid: Option<String>, ip: &str) {
        let Some(uuid) = uuid else {
            tracing::info!(%ip, "removing connection");
            return;
        };
        match self.store.player(&uuid) {
            Ok(Some(mut player)) => {
                player.logged_in = false;
                player.last_seen = unix_now();
                if let Err(err) = self.store.upsert_player(&player) {
                    tracing::error!(error = %err, "failed to persist logout");
                }
                tracing::info!(player = %player.alias, %ip, "removing player");
            },
            Ok(None) => tracing::info!(%ip, "removing connection"),
            Err(err) => tracing::error!(error = %err, "failed to load player on close-out"),
        }
    }

    async fn on_client_connect(
        &self,
        packet: &Packet,
        session: &Arc<dyn SessionHandle>,
    ) -> Result<bool, PluginError> {
        let Some(parsed) = packet.parsed.as_ref() else {
            return Ok(true);
        };
        let (Some(uuid), Some(name)) = (
            parsed.get("player_uuid").and_then(Value::as_str),
            parsed.get("player_name").and_then(Value::as_str),
        ) else {
            // unparsed body; forward untouched
            return Ok(true);
        };
        let species =
            parsed.get("player_species").and_then(Value::as_str).unwrap_or_default();
        let ip = session.client_ip().to_string();

        if let Some(ban) = self.active_ban(&ip, uuid)? {
            tracing::info!(%ip, uuid, reason = %ban.reason, "rejecting banned client");
            let mut values = ValueMap::new();
            values.insert(
                "reason".to_owned(),
                Value::Str(format!("You are banned from this server: {}", ban.reason)),
            );
            let failure =
                Packet::from_values(PacketType::ConnectFailure, Direction::ToClient, values)?;
            session.write_to_client_raw(&failure.original).await?;
            return Ok(false);
        }

        let now = unix_now();
        let mut player = match self.store.player(uuid)? {
            Some(existing) => existing,
            None => {
                tracing::info!(uuid, name, "creating record for new player");
                Player::new(uuid, name, now)
            },
        };
        player.name = name.to_owned();
        if player.alias.is_empty() {
            player.alias = name.to_owned();
        }
        player.species = species.to_owned();
        player.last_seen = now;
        player.last_ip.clone_from(&ip);
        self.store.upsert_player(&player)?;
        self.store.touch_ip(uuid, &ip, now)?;

        session.set_player_uuid(uuid.to_owned());
        tracing::info!(player = %player.alias, %ip, "player connecting");
        Ok(true)
    }

    async fn on_connect_success(
        &self,
        packet: &Packet,
        session: &Arc<dyn SessionHandle>,
    ) -> Result<bool, PluginError> {
        let client_id = packet
            .parsed
            .as_ref()
            .and_then(|p| p.get("client_id"))
            .and_then(Value::as_u64);
        let Some(client_id) = client_id else {
            return Ok(true);
        };
        session.set_client_id(client_id as u16);

        if let Some(uuid) = session.player_uuid() {
            if let Some(mut player) = self.store.player(&uuid)? {
                player.logged_in = true;
                player.last_client_id = Some(client_id as u16);
                player.last_seen = unix_now();
                self.store.upsert_player(&player)?;
                tracing::info!(player = %player.alias, client_id, "player logged in");
            }
        }
        Ok(true)
    }

    /// Protocol-level disconnect (either direction): mark the logout
    /// before the socket actually closes.
    async fn on_disconnect(
        &self,
        session: &Arc<dyn SessionHandle>,
    ) -> Result<bool, PluginError> {
        let Some(uuid) = session.player_uuid() else {
            return Ok(true);
        };
        if let Some(mut player) = self.store.player(&uuid)? {
            player.logged_in = false;
            player.last_seen = unix_now();
            self.store.upsert_player(&player)?;
            tracing::info!(player = %player.alias, "player logged out");
        }
        Ok(true)
    }
}

#[async_trait]
impl Plugin for PlayerManager {
    fn name(&self) -> &str {
        "player_manager"
    }

    fn description(&self) -> &str {
        "Tracks players, IP history and bans."
    }

    fn hooks(&self) -> Vec<HookSpec> {
        vec![
            HookSpec::with_priority(PacketType::ClientConnect, 100),
            HookSpec::with_priority(PacketType::ConnectSuccess, 100),
            HookSpec::with_priority(PacketType::ServerDisconnect, 100),
            HookSpec::with_priority(PacketType::ClientDisconnectRequest, 100),
        ]
    }

    async fn handle(
        &self,
        packet: &mut Packet,
        session: &Arc<dyn SessionHandle>,
    ) -> Result<bool, PluginError> {
        match packet.packet_type {
            PacketType::ClientConnect => self.on_client_connect(packet, session).await,
            PacketType::ConnectSuccess => self.on_connect_success(packet, session).await,
            PacketType::ServerDisconnect | PacketType::ClientDisconnectRequest => {
                self.on_disconnect(session).await
            },
            _ => Ok(true),
        }
    }
}
