//! The session surface plugins see.
//!
//! A live session owns two sockets and per-connection state; plugins only
//! get this trait. Injection writes frames without an inbound trigger,
//! which is the only way the proxy has to speak to the game client
//! directly.

use std::{collections::HashSet, net::IpAddr};

use async_trait::async_trait;
use starbridge_proto::{ChatReceiveMode, Direction, Packet, PacketType, Value, ValueMap};

use crate::errors::PluginError;

/// Handle to one client/upstream connection pair.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Write raw frame bytes toward the game client.
    async fn write_to_client_raw(&self, data: &[u8]) -> Result<(), PluginError>;

    /// Write raw frame bytes toward the upstream server.
    async fn write_to_server_raw(&self, data: &[u8]) -> Result<(), PluginError>;

    /// Address the client connected from.
    fn client_ip(&self) -> IpAddr;

    /// Canonical uuid of the player on this session, once known.
    fn player_uuid(&self) -> Option<String>;

    /// Record the player uuid (set by the player manager on connect).
    fn set_player_uuid(&self, uuid: String);

    /// In-world client id, once the upstream assigned one.
    fn client_id(&self) -> Option<u16>;

    /// Record the upstream-assigned client id.
    fn set_client_id(&self, client_id: u16);

    /// Permission set of the player on this session.
    fn permissions(&self) -> HashSet<String>;

    /// Send a chat line to the client as a broadcast from the server.
    async fn send_message(&self, text: &str) -> Result<(), PluginError> {
        self.send_message_as(text, ChatReceiveMode::Broadcast, 0, "", "").await
    }

    /// Send a chat line to the client with full control of the header.
    ///
    /// Builds a chat-received frame through the codec and injects it
    /// client-ward.
    async fn send_message_as(
        &self,
        text: &str,
        mode: ChatReceiveMode,
        client_id: u16,
        name: &str,
        channel: &str,
    ) -> Result<(), PluginError> {
        let mut header = ValueMap::new();
        header.insert("mode".to_owned(), Value::Uint(u64::from(mode as u8)));
        header.insert("channel".to_owned(), Value::Str(channel.to_owned()));
        header.insert("client_id".to_owned(), Value::Uint(u64::from(client_id)));

        let mut values = ValueMap::new();
        values.insert("header".to_owned(), Value::Object(header));
        values.insert("name".to_owned(), Value::Str(name.to_owned()));
        values.insert("junk".to_owned(), Value::Uint(0));
        values.insert("message".to_owned(), Value::Str(text.to_owned()));

        let packet =
            Packet::from_values(PacketType::ChatReceived, Direction::ToClient, values)?;
        self.write_to_client_raw(&packet.original).await
    }
}
