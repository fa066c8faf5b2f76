//! Shared test doubles.

use std::{
    collections::HashSet,
    net::{IpAddr, Ipv4Addr},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use starbridge_core::{PluginError, SessionHandle};

/// Session stub that records injected frames and per-session state.
pub(crate) struct TestSession {
    pub ip: IpAddr,
    pub uuid: Mutex<Option<String>>,
    pub client_id: Mutex<Option<u16>>,
    pub to_client: Mutex<Vec<Vec<u8>>>,
    pub to_server: Mutex<Vec<Vec<u8>>>,
}

impl TestSession {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            uuid: Mutex::new(None),
            client_id: Mutex::new(None),
            to_client: Mutex::new(Vec::new()),
            to_server: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn with_uuid(uuid: &str) -> Arc<Self> {
        let session = Self::new();
        *session.uuid.lock().unwrap() = Some(uuid.to_owned());
        session
    }
}

#[async_trait]
impl SessionHandle for TestSession {
    async fn write_to_client_raw(&self, data: &[u8]) -> Result<(), PluginError> {
        self.to_client.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn write_to_server_raw(&self, data: &[u8]) -> Result<(), PluginError> {
        self.to_server.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    fn client_ip(&self) -> IpAddr {
        self.ip
    }

    fn player_uuid(&self) -> Option<String> {
        self.uuid.lock().unwrap().clone()
    }

    fn set_player_uuid(&self, uuid: String) {
        *self.uuid.lock().unwrap() = Some(uuid);
    }

    fn client_id(&self) -> Option<u16> {
        *self.client_id.lock().unwrap()
    }

    fn set_client_id(&self, client_id: u16) {
        *self.client_id.lock().unwrap() = Some(client_id);
    }

    fn permissions(&self) -> HashSet<String> {
        HashSet::new()
    }
}
