//! Shared test doubles.

use std::{
    collections::HashSet,
    net::{IpAddr, Ipv4Addr},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{errors::PluginError, session::SessionHandle};

/// Session stub that records injected frames.
pub(crate) struct RecordingSession {
    pub to_client: Mutex<Vec<Vec<u8>>>,
    pub to_server: Mutex<Vec<Vec<u8>>>,
    pub perms: HashSet<String>,
}

impl RecordingSession {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_perms(HashSet::new())
    }

    pub(crate) fn with_perms(perms: HashSet<String>) -> Arc<Self> {
        Arc::new(Self {
            to_client: Mutex::new(Vec::new()),
            to_server: Mutex::new(Vec::new()),
            perms,
        })
    }
}

#[async_trait]
impl SessionHandle for RecordingSession {
    async fn write_to_client_raw(&self, data: &[u8]) -> Result<(), PluginError> {
        self.to_client.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn write_to_server_raw(&self, data: &[u8]) -> Result<(), PluginError> {
        self.to_server.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn client_ip(&self) -> IpAddr {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    }

    fn player_uuid(&self) -> Option<String> {
        None
    }

    fn set_player_uuid(&self, _uuid: String) {}

    fn client_id(&self) -> Option<u16> {
        None
    }

    fn set_client_id(&self, _client_id: u16) {}

    fn permissions(&self) -> HashSet<String> {
        self.perms.clone()
    }
}
