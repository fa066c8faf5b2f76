//! Redb-backed record store.
//!
//! A single database file under the configuration directory with four
//! tables: players, IP history, bans and worlds. Records are
//! CBOR-encoded. All operations are short scoped transactions that
//! commit or abort; a store failure never affects frame forwarding.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Table: players. Key: 32-char uuid hex. Value: CBOR `Player`.
const PLAYERS: TableDefinition<&str, &[u8]> = TableDefinition::new("players");

/// Table: IP history. Key: `uuid:ip`. Value: CBOR `IpRecord`.
const IPS: TableDefinition<&str, &[u8]> = TableDefinition::new("ips");

/// Table: bans. Key: `ip:<addr>` or `uuid:<hex>`. Value: CBOR `Ban`.
const BANS: TableDefinition<&str, &[u8]> = TableDefinition::new("bans");

/// Table: worlds. Key: location string. Value: CBOR `World`.
const WORLDS: TableDefinition<&str, &[u8]> = TableDefinition::new("worlds");

/// Errors from the persistent store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database could not be opened, read or written.
    #[error("storage io error: {0}")]
    Io(String),

    /// A record could not be encoded or decoded.
    #[error("storage serialization error: {0}")]
    Serialization(String),
}

impl From<StorageError> for starbridge_core::PluginError {
    fn from(err: StorageError) -> Self {
        Self::Other(err.to_string())
    }
}

/// A known player, keyed by canonical uuid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Canonical uuid (32 lowercase hex chars).
    pub uuid: String,
    /// Name presented at connect time.
    pub name: String,
    /// Display alias; defaults to the name.
    pub alias: String,
    /// Species string from the connect packet.
    pub species: String,
    /// Unix seconds of the first connect.
    pub first_seen: u64,
    /// Unix seconds of the most recent activity.
    pub last_seen: u64,
    /// Whether a session currently holds this player.
    pub logged_in: bool,
    /// Client id assigned by the upstream on the last connect.
    pub last_client_id: Option<u16>,
    /// Address of the last connect.
    pub last_ip: String,
    /// Current world location string, when known.
    pub location: Option<String>,
    /// Previous world location string (for warp-return).
    pub previous_location: Option<String>,
    /// Granted permission names.
    pub permissions: Vec<String>,
}

impl Player {
    /// Fresh record for a first-time connect.
    pub fn new(uuid: impl Into<String>, name: impl Into<String>, now: u64) -> Self {
        let name = name.into();
        Self {
            uuid: uuid.into(),
            alias: name.clone(),
            name,
            species: String::new(),
            first_seen: now,
            last_seen: now,
            logged_in: false,
            last_client_id: None,
            last_ip: String::new(),
            location: None,
            previous_location: None,
            permissions: Vec::new(),
        }
    }
}

/// What a ban matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BanKind {
    /// Ban by client address.
    Ip,
    /// Ban by player uuid.
    Uuid,
}

impl BanKind {
    fn key_prefix(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Uuid => "uuid",
        }
    }
}

/// One ban record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ban {
    /// Address or uuid ban.
    pub kind: BanKind,
    /// The banned address or uuid.
    pub value: String,
    /// Reason shown to the rejected client.
    pub reason: String,
    /// Who issued the ban.
    pub banned_by: String,
    /// Unix seconds the ban was issued.
    pub timestamp: u64,
    /// Lifetime in seconds; `None` is permanent.
    pub duration_secs: Option<u64>,
}

impl Ban {
    /// Whether the ban still applies at `now`.
    pub fn active_at(&self, now: u64) -> bool {
        match self.duration_secs {
            Some(duration) => now < self.timestamp.saturating_add(duration),
            None => true,
        }
    }
}

/// One sighting of a uuid from an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRecord {
    /// Player uuid.
    pub uuid: String,
    /// Client address.
    pub ip: String,
    /// Unix seconds of the last sighting.
    pub last_seen: u64,
}

/// A tracked world, discriminated the way location strings are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum World {
    /// A planet or satellite.
    Celestial {
        /// X of the system coordinate.
        x: i64,
        /// Y of the system coordinate.
        y: i64,
        /// Z of the system coordinate.
        z: i64,
        /// Planet ordinal within the system.
        planet: i64,
        /// Satellite ordinal; 0 for the planet itself.
        satellite: i64,
        /// Display name from the world template.
        name: String,
    },
    /// A player's ship.
    Ship {
        /// Uuid of the owning player.
        owner_uuid: String,
    },
    /// A persistent instanced world.
    Instance {
        /// Instance template name.
        instance_type: String,
        /// Persistent instance id, when the instance has one.
        instance_id: Option<String>,
    },
}

/// Handle to the record store. Clones share the database.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    /// Open or create the database and its tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(PLAYERS).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(IPS).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(BANS).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(WORLDS).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Load a player by canonical uuid.
    pub fn player(&self, uuid: &str) -> Result<Option<Player>, StorageError> {
        self.get(PLAYERS, uuid)
    }

    /// Insert or replace a player record.
    pub fn upsert_player(&self, player: &Player) -> Result<(), StorageError> {
        let key = player.uuid.clone();
        self.put(PLAYERS, &key, player)
    }

    /// Record a uuid sighting from an address.
    pub fn touch_ip(&self, uuid: &str, ip: &str, now: u64) -> Result<(), StorageError> {
        let key = format!("{uuid}:{ip}");
        let record = IpRecord { uuid: uuid.to_owned(), ip: ip.to_owned(), last_seen: now };
        self.put(IPS, &key, &record)
    }

    /// All addresses a uuid has been seen from.
    pub fn ips_for(&self, uuid: &str) -> Result<Vec<IpRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(IPS).map_err(|e| StorageError::Io(e.to_string()))?;

        let prefix = format!("{uuid}:");
        let mut out = Vec::new();
        for item in table.iter().map_err(|e| StorageError::Io(e.to_string()))? {
            let (key, value) = item.map_err(|e| StorageError::Io(e.to_string()))?;
            if key.value().starts_with(&prefix) {
                let record: IpRecord = ciborium::from_reader(value.value())
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Insert or replace a ban.
    pub fn add_ban(&self, ban: &Ban) -> Result<(), StorageError> {
        let key = format!("{}:{}", ban.kind.key_prefix(), ban.value);
        self.put(BANS, &key, ban)
    }

    /// Look up a ban by kind and value.
    pub fn find_ban(&self, kind: BanKind, value: &str) -> Result<Option<Ban>, StorageError> {
        let key = format!("{}:{value}", kind.key_prefix());
        self.get(BANS, &key)
    }

    /// Remove a ban. Returns whether one existed.
    pub fn remove_ban(&self, kind: BanKind, value: &str) -> Result<bool, StorageError> {
        let key = format!("{}:{value}", kind.key_prefix());
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        let removed;
        {
            let mut table = txn.open_table(BANS).map_err(|e| StorageError::Io(e.to_string()))?;
            removed = table
                .remove(key.as_str())
                .map_err(|e| StorageError::Io(e.to_string()))?
                .is_some();
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(removed)
    }

    /// Load a world by location string.
    pub fn world(&self, location_str: &str) -> Result<Option<World>, StorageError> {
        self.get(WORLDS, location_str)
    }

    /// Insert or replace a world record.
    pub fn upsert_world(&self, location_str: &str, world: &World) -> Result<(), StorageError> {
        self.put(WORLDS, location_str, world)
    }

    fn get<T: for<'de> Deserialize<'de>>(
        &self,
        table_def: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(table_def).map_err(|e| StorageError::Io(e.to_string()))?;
        match table.get(key).map_err(|e| StorageError::Io(e.to_string()))? {
            Some(value) => {
                let record = ciborium::from_reader(value.value())
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(record))
            },
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(
        &self,
        table_def: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
        record: &T,
    ) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table =
                txn.open_table(table_def).map_err(|e| StorageError::Io(e.to_string()))?;

            let mut bytes = Vec::new();
            ciborium::into_writer(record, &mut bytes)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;

            table
                .insert(key, bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn open_store() -> (tempfile::TempDir, Store) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("test.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn player_round_trip() {
        let (_dir, store) = open_store();
        assert!(store.player("aa".repeat(16).as_str()).unwrap().is_none());

        let uuid = "aa".repeat(16);
        let mut player = Player::new(uuid.clone(), "Nuru", 1000);
        player.species = "floran".to_owned();
        player.last_ip = "127.0.0.1".to_owned();
        store.upsert_player(&player).unwrap();

        let loaded = store.player(&uuid).unwrap().unwrap();
        assert_eq!(loaded, player);

        // upsert replaces
        player.logged_in = true;
        player.last_client_id = Some(3);
        store.upsert_player(&player).unwrap();
        assert_eq!(store.player(&uuid).unwrap().unwrap().last_client_id, Some(3));
    }

    #[test]
    fn ip_history_accumulates_per_uuid() {
        let (_dir, store) = open_store();
        store.touch_ip("aaaa", "10.0.0.1", 100).unwrap();
        store.touch_ip("aaaa", "10.0.0.2", 200).unwrap();
        store.touch_ip("bbbb", "10.0.0.3", 300).unwrap();
        // re-sighting updates, not duplicates
        store.touch_ip("aaaa", "10.0.0.1", 400).unwrap();

        let mut records = store.ips_for("aaaa").unwrap();
        records.sort_by(|a, b| a.ip.cmp(&b.ip));
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].last_seen, 400);
    }

    #[test]
    fn bans_by_ip_and_uuid_do_not_collide() {
        let (_dir, store) = open_store();
        let same_value = "deadbeef";
        store
            .add_ban(&Ban {
                kind: BanKind::Ip,
                value: same_value.to_owned(),
                reason: "ip ban".to_owned(),
                banned_by: "console".to_owned(),
                timestamp: 10,
                duration_secs: None,
            })
            .unwrap();

        assert!(store.find_ban(BanKind::Uuid, same_value).unwrap().is_none());
        let found = store.find_ban(BanKind::Ip, same_value).unwrap().unwrap();
        assert_eq!(found.reason, "ip ban");

        assert!(store.remove_ban(BanKind::Ip, same_value).unwrap());
        assert!(!store.remove_ban(BanKind::Ip, same_value).unwrap());
        assert!(store.find_ban(BanKind::Ip, same_value).unwrap().is_none());
    }

    #[test]
    fn ban_expiry() {
        let ban = Ban {
            kind: BanKind::Uuid,
            value: "x".to_owned(),
            reason: String::new(),
            banned_by: String::new(),
            timestamp: 100,
            duration_secs: Some(50),
        };
        assert!(ban.active_at(100));
        assert!(ban.active_at(149));
        assert!(!ban.active_at(150));

        let permanent = Ban { duration_secs: None, ..ban };
        assert!(permanent.active_at(u64::MAX));
    }

    #[test]
    fn world_discrimination_round_trips() {
        let (_dir, store) = open_store();
        let celestial = World::Celestial {
            x: 12,
            y: -7,
            z: 99,
            planet: 3,
            satellite: 1,
            name: "Kappa Crucis IV".to_owned(),
        };
        store.upsert_world("CelestialWorld:12:-7:99:3:1", &celestial).unwrap();
        store
            .upsert_world(
                "ShipWorld:00112233445566778899aabbccddeeff",
                &World::Ship { owner_uuid: "00112233445566778899aabbccddeeff".to_owned() },
            )
            .unwrap();
        store
            .upsert_world(
                "InstanceWorld:outpost:abc",
                &World::Instance {
                    instance_type: "outpost".to_owned(),
                    instance_id: Some("abc".to_owned()),
                },
            )
            .unwrap();

        assert_eq!(store.world("CelestialWorld:12:-7:99:3:1").unwrap().unwrap(), celestial);
        assert!(matches!(
            store.world("ShipWorld:00112233445566778899aabbccddeeff").unwrap().unwrap(),
            World::Ship { .. }
        ));
        assert!(store.world("nowhere").unwrap().is_none());
    }
}
