//! Protocol enumerations.
//!
//! `PacketType` ordinals are frozen per protocol version; the on-wire type
//! byte is the ordinal. A future protocol bump gets a second table rather
//! than edits to this one.

use crate::errors::ProtocolError;

/// On-wire packet kinds, ordinals 0..=65.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum PacketType {
    // Protocol initialization
    ProtocolRequest = 0,
    ProtocolResponse = 1,
    // Universe; server -> client
    ServerDisconnect = 2,
    ConnectSuccess = 3,
    ConnectFailure = 4,
    HandshakeChallenge = 5,
    ChatReceived = 6,
    UniverseTimeUpdate = 7,
    CelestialResponse = 8,
    PlayerWarpResult = 9,
    PlanetTypeUpdate = 10,
    Pause = 11,
    // Universe; client -> server
    ClientConnect = 12,
    ClientDisconnectRequest = 13,
    HandshakeResponse = 14,
    PlayerWarp = 15,
    FlyShip = 16,
    ChatSent = 17,
    CelestialRequest = 18,
    // Universe; bidirectional
    ClientContextUpdate = 19,
    // World; server -> client
    WorldStart = 20,
    WorldStop = 21,
    WorldLayoutUpdate = 22,
    WorldParametersUpdate = 23,
    CentralStructureUpdate = 24,
    TileArrayUpdate = 25,
    TileUpdate = 26,
    TileLiquidUpdate = 27,
    TileDamageUpdate = 28,
    TileModificationFailure = 29,
    GiveItem = 30,
    EnvironmentUpdate = 31,
    UpdateTileProtection = 32,
    SetDungeonGravity = 33,
    SetDungeonBreathable = 34,
    SetPlayerStart = 35,
    FindUniqueEntityResponse = 36,
    // World; client -> server
    ModifyTileList = 37,
    DamageTileGroup = 38,
    CollectLiquid = 39,
    RequestDrop = 40,
    SpawnEntity = 41,
    ConnectWire = 42,
    DisconnectAllWires = 43,
    WorldClientStateUpdate = 44,
    FindUniqueEntity = 45,
    Unknown = 46,
    // World; bidirectional
    EntityCreate = 47,
    EntityUpdate = 48,
    EntityDestroy = 49,
    EntityInteract = 50,
    EntityInteractResult = 51,
    HitRequest = 52,
    DamageRequest = 53,
    DamageNotification = 54,
    EntityMessage = 55,
    EntityMessageResponse = 56,
    UpdateWorldProperties = 57,
    StepUpdate = 58,
    // System; server -> client
    SystemWorldStart = 59,
    SystemWorldUpdate = 60,
    SystemObjectCreate = 61,
    SystemObjectDestroy = 62,
    SystemShipCreate = 63,
    SystemShipDestroy = 64,
    // System; client -> server
    SystemObjectSpawn = 65,
}

impl PacketType {
    const MAX: u8 = PacketType::SystemObjectSpawn as u8;

    /// Ordinal as the on-wire type byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > Self::MAX {
            return Err(ProtocolError::UnknownPacketType(value));
        }
        // INVARIANT: ordinals are dense 0..=MAX with repr(u8), so every
        // value in range names a variant.
        Ok(ALL[value as usize])
    }
}

/// Dense ordinal -> variant table backing `TryFrom<u8>`.
const ALL: [PacketType; 66] = [
    PacketType::ProtocolRequest,
    PacketType::ProtocolResponse,
    PacketType::ServerDisconnect,
    PacketType::ConnectSuccess,
    PacketType::ConnectFailure,
    PacketType::HandshakeChallenge,
    PacketType::ChatReceived,
    PacketType::UniverseTimeUpdate,
    PacketType::CelestialResponse,
    PacketType::PlayerWarpResult,
    PacketType::PlanetTypeUpdate,
    PacketType::Pause,
    PacketType::ClientConnect,
    PacketType::ClientDisconnectRequest,
    PacketType::HandshakeResponse,
    PacketType::PlayerWarp,
    PacketType::FlyShip,
    PacketType::ChatSent,
    PacketType::CelestialRequest,
    PacketType::ClientContextUpdate,
    PacketType::WorldStart,
    PacketType::WorldStop,
    PacketType::WorldLayoutUpdate,
    PacketType::WorldParametersUpdate,
    PacketType::CentralStructureUpdate,
    PacketType::TileArrayUpdate,
    PacketType::TileUpdate,
    PacketType::TileLiquidUpdate,
    PacketType::TileDamageUpdate,
    PacketType::TileModificationFailure,
    PacketType::GiveItem,
    PacketType::EnvironmentUpdate,
    PacketType::UpdateTileProtection,
    PacketType::SetDungeonGravity,
    PacketType::SetDungeonBreathable,
    PacketType::SetPlayerStart,
    PacketType::FindUniqueEntityResponse,
    PacketType::ModifyTileList,
    PacketType::DamageTileGroup,
    PacketType::CollectLiquid,
    PacketType::RequestDrop,
    PacketType::SpawnEntity,
    PacketType::ConnectWire,
    PacketType::DisconnectAllWires,
    PacketType::WorldClientStateUpdate,
    PacketType::FindUniqueEntity,
    PacketType::Unknown,
    PacketType::EntityCreate,
    PacketType::EntityUpdate,
    PacketType::EntityDestroy,
    PacketType::EntityInteract,
    PacketType::EntityInteractResult,
    PacketType::HitRequest,
    PacketType::DamageRequest,
    PacketType::DamageNotification,
    PacketType::EntityMessage,
    PacketType::EntityMessageResponse,
    PacketType::UpdateWorldProperties,
    PacketType::StepUpdate,
    PacketType::SystemWorldStart,
    PacketType::SystemWorldUpdate,
    PacketType::SystemObjectCreate,
    PacketType::SystemObjectDestroy,
    PacketType::SystemShipCreate,
    PacketType::SystemShipDestroy,
    PacketType::SystemObjectSpawn,
];

/// Which peer a frame is headed to.
///
/// The same value doubles as from-server / from-client; the relay
/// orientation determines the reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Upstream -> client (equivalently: from the server).
    ToClient,
    /// Client -> upstream (equivalently: from the client).
    ToServer,
}

/// Handshake progress for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum ConnectionState {
    Disconnected,
    ClientVersionSent,
    VersionOkWithServer,
    ClientConnect,
    HandshakeChallenge,
    HandshakeChallengeResponse,
    ConnectResponseSent,
    Connected,
    ConnectedWithHeartbeat,
    ClientDisconnecting,
}

/// System-location union discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum SystemLocationKind {
    System = 0,
    Coordinate = 1,
    Orbit = 2,
    Uuid = 3,
    Location = 4,
}

/// Outer warp-action union discriminants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum WarpKind {
    ToWorld = 1,
    ToPlayer = 2,
    ToAlias = 3,
}

/// Inner world-kind union discriminants (only under `WarpKind::ToWorld`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum WarpWorldKind {
    CelestialWorld = 1,
    ShipWorld = 2,
    UniqueWorld = 3,
}

/// Warp alias targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
#[allow(missing_docs)]
pub enum WarpAliasKind {
    Return = 0,
    Orbited = 1,
    Ship = 2,
}

/// Chat routing selected by the sending client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ChatSendMode {
    Universe = 0,
    Local = 1,
    Party = 2,
}

/// Chat provenance presented to the receiving client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ChatReceiveMode {
    Local = 0,
    Party = 1,
    Broadcast = 2,
    Whisper = 3,
    CommandResult = 4,
    RadioMessage = 5,
    World = 6,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_round_trip() {
        for byte in 0..=PacketType::SystemObjectSpawn as u8 {
            let t = PacketType::try_from(byte).unwrap();
            assert_eq!(t.to_u8(), byte);
        }
    }

    #[test]
    fn out_of_range_rejected() {
        assert!(PacketType::try_from(66).is_err());
        assert!(PacketType::try_from(0xff).is_err());
    }

    #[test]
    fn table_matches_discriminants() {
        for (i, t) in ALL.iter().enumerate() {
            assert_eq!(t.to_u8() as usize, i);
        }
    }
}
