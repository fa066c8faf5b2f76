//! One client connection and its paired upstream connection.
//!
//! Two relay tasks per session: the server-facing task reads from the
//! client and writes upstream; the client-facing task reads from the
//! upstream and writes to the client. Both loop on read-frame, dispatch,
//! write-frame. Whichever side ends first aborts its sibling, and
//! teardown runs exactly once.

use std::{
    collections::HashSet,
    net::IpAddr,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use starbridge_core::{PluginError, SessionHandle};
use starbridge_proto::{ConnectionState, Direction, ProtocolError, read_frame, write_frame};
use tokio::{
    io::AsyncWriteExt,
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};

use crate::proxy::ProxyState;

#[derive(Debug)]
struct SessionShared {
    player_uuid: Option<String>,
    client_id: Option<u16>,
    connection_state: ConnectionState,
    permissions: HashSet<String>,
}

/// A live client/upstream pair with its per-session state.
pub struct Session {
    state: Arc<ProxyState>,
    ip: IpAddr,
    client_writer: tokio::sync::Mutex<OwnedWriteHalf>,
    server_writer: tokio::sync::Mutex<OwnedWriteHalf>,
    closed: AtomicBool,
    shared: Mutex<SessionShared>,
}

impl Session {
    /// Accept one client: open the upstream connection, run both relay
    /// directions, and tear down when either side ends.
    pub async fn run(state: Arc<ProxyState>, client: TcpStream) -> Result<(), crate::ServerError> {
        let ip = client.peer_addr()?.ip();
        tracing::info!(%ip, "connection established");

        let upstream = TcpStream::connect((
            state.config.upstream_host.as_str(),
            state.config.upstream_port,
        ))
        .await?;

        let (client_reader, client_writer) = client.into_split();
        let (server_reader, server_writer) = upstream.into_split();

        let session = Arc::new(Self {
            state,
            ip,
            client_writer: tokio::sync::Mutex::new(client_writer),
            server_writer: tokio::sync::Mutex::new(server_writer),
            closed: AtomicBool::new(false),
            shared: Mutex::new(SessionShared {
                player_uuid: None,
                client_id: None,
                connection_state: ConnectionState::Disconnected,
                permissions: HashSet::new(),
            }),
        });

        let mut server_facing = tokio::spawn(relay_loop(
            Arc::clone(&session),
            client_reader,
            Direction::ToServer,
        ));
        let mut client_facing = tokio::spawn(relay_loop(
            Arc::clone(&session),
            server_reader,
            Direction::ToClient,
        ));

        // whichever task ends first cancels its sibling (best-effort)
        tokio::select! {
            _ = &mut server_facing => client_facing.abort(),
            _ = &mut client_facing => server_facing.abort(),
        }

        session.close().await;
        Ok(())
    }

    /// Idempotent teardown: notify the player manager and log once.
    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let uuid = self.player_uuid();
        self.state.players.close_out(uuid, &self.ip.to_string()).await;
        tracing::debug!(ip = %self.ip, "session closed");
    }

    /// Current handshake stage.
    pub fn connection_state(&self) -> ConnectionState {
        self.lock_shared().connection_state
    }

    /// Advance the handshake stage.
    pub fn set_connection_state(&self, state: ConnectionState) {
        self.lock_shared().connection_state = state;
    }

    fn lock_shared(&self) -> std::sync::MutexGuard<'_, SessionShared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionHandle for Session {
    async fn write_to_client_raw(&self, data: &[u8]) -> Result<(), PluginError> {
        let mut writer = self.client_writer.lock().await;
        writer
            .write_all(data)
            .await
            .map_err(|e| PluginError::Protocol(ProtocolError::Io(e)))?;
        writer.flush().await.map_err(|e| PluginError::Protocol(ProtocolError::Io(e)))?;
        Ok(())
    }

    async fn write_to_server_raw(&self, data: &[u8]) -> Result<(), PluginError> {
        let mut writer = self.server_writer.lock().await;
        writer
            .write_all(data)
            .await
            .map_err(|e| PluginError::Protocol(ProtocolError::Io(e)))?;
        writer.flush().await.map_err(|e| PluginError::Protocol(ProtocolError::Io(e)))?;
        Ok(())
    }

    fn client_ip(&self) -> IpAddr {
        self.ip
    }

    fn player_uuid(&self) -> Option<String> {
        self.lock_shared().player_uuid.clone()
    }

    fn set_player_uuid(&self, uuid: String) {
        let mut shared = self.lock_shared();
        shared.player_uuid = Some(uuid);
        shared.connection_state = ConnectionState::ClientConnect;
    }

    fn client_id(&self) -> Option<u16> {
        self.lock_shared().client_id
    }

    fn set_client_id(&self, client_id: u16) {
        let mut shared = self.lock_shared();
        shared.client_id = Some(client_id);
        shared.connection_state = ConnectionState::Connected;
    }

    fn permissions(&self) -> HashSet<String> {
        self.lock_shared().permissions.clone()
    }
}

/// One relay direction: read a frame, run the hook chain, forward the
/// (possibly rebuilt) bytes unless a hook vetoed.
async fn relay_loop(session: Arc<Session>, mut reader: OwnedReadHalf, direction: Direction) {
    let handle: Arc<dyn SessionHandle> = Arc::clone(&session) as Arc<dyn SessionHandle>;
    loop {
        let mut packet = match read_frame(&mut reader, direction).await {
            Ok(packet) => packet,
            Err(ProtocolError::IncompleteRead) => {
                tracing::debug!(ip = %session.ip, ?direction, "peer closed mid-stream");
                break;
            },
            Err(err) => {
                tracing::warn!(ip = %session.ip, ?direction, error = %err, "read failed");
                break;
            },
        };

        let forward = match session.state.hooks.dispatch(&mut packet, &handle).await {
            Ok(forward) => forward,
            Err(err) => {
                tracing::error!(
                    ip = %session.ip,
                    packet_type = ?packet.packet_type,
                    error = %err,
                    "dispatch failed, ending session"
                );
                break;
            },
        };

        if !forward {
            continue;
        }

        let written = match direction {
            Direction::ToServer => {
                let mut writer = session.server_writer.lock().await;
                write_frame(&mut *writer, &packet).await
            },
            Direction::ToClient => {
                let mut writer = session.client_writer.lock().await;
                write_frame(&mut *writer, &packet).await
            },
        };
        if let Err(err) = written {
            tracing::debug!(ip = %session.ip, ?direction, error = %err, "write failed");
            break;
        }
    }
}
