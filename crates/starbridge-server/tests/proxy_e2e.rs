//! Loopback end-to-end scenarios: a real client socket, the proxy, and a
//! scripted upstream server.

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use starbridge_core::{HookSpec, Plugin, PluginError, PluginFactory, SessionHandle};
use starbridge_proto::{
    Direction, Packet, PacketType, PacketWriter, ProtocolError, Value, ValueMap, read_frame,
};
use starbridge_server::{Config, Proxy, Store};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    sync::mpsc,
    time::timeout,
};

const WAIT: Duration = Duration::from_secs(5);

struct Upstream {
    addr: SocketAddr,
    received: mpsc::Receiver<Packet>,
    to_client: mpsc::Sender<Vec<u8>>,
    shutdown: mpsc::Sender<()>,
}

/// One-connection scripted upstream: records frames it receives and
/// writes whatever the test feeds it.
async fn spawn_upstream() -> Upstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (received_tx, received) = mpsc::channel(32);
    let (to_client, mut to_client_rx) = mpsc::channel::<Vec<u8>>(32);
    let (shutdown, mut shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let (mut reader, mut writer) = stream.into_split();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    bytes = to_client_rx.recv() => match bytes {
                        Some(bytes) => {
                            if writer.write_all(&bytes).await.is_err() {
                                break;
                            }
                        },
                        None => break,
                    },
                    _ = shutdown_rx.recv() => {
                        let _ = writer.shutdown().await;
                        break;
                    },
                }
            }
        });

        loop {
            match read_frame(&mut reader, Direction::ToServer).await {
                Ok(packet) => {
                    if received_tx.send(packet).await.is_err() {
                        break;
                    }
                },
                Err(_) => break,
            }
        }
    });

    Upstream { addr, received, to_client, shutdown }
}

async fn start_proxy(
    upstream: SocketAddr,
    user_factories: Vec<PluginFactory>,
) -> (SocketAddr, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("test.db")).unwrap();
    let config = Config {
        listen_port: 0,
        upstream_host: upstream.ip().to_string(),
        upstream_port: upstream.port(),
        ..Config::default()
    };
    let proxy = Proxy::bind(config, store, user_factories).await.unwrap();
    // the listener binds the wildcard address; dial loopback
    let addr = SocketAddr::from(([127, 0, 0, 1], proxy.local_addr().unwrap().port()));
    tokio::spawn(proxy.run());
    (addr, dir)
}

fn protocol_request_frame(version: u32) -> Vec<u8> {
    let mut values = ValueMap::new();
    values.insert("request_protocol_version".to_owned(), Value::Uint(u64::from(version)));
    Packet::from_values(PacketType::ProtocolRequest, Direction::ToServer, values)
        .unwrap()
        .original
        .to_vec()
}

fn chat_sent_frame(text: &str) -> Vec<u8> {
    let mut values = ValueMap::new();
    values.insert("text".to_owned(), Value::Str(text.to_owned()));
    values.insert("send_mode".to_owned(), Value::Uint(0));
    Packet::from_values(PacketType::ChatSent, Direction::ToServer, values)
        .unwrap()
        .original
        .to_vec()
}

fn connect_failure_frame(reason: &str, compressed: bool) -> Vec<u8> {
    let mut values = ValueMap::new();
    values.insert("reason".to_owned(), Value::Str(reason.to_owned()));
    let mut packet =
        Packet::from_values(PacketType::ConnectFailure, Direction::ToClient, values).unwrap();
    packet.compressed = compressed;
    packet.rebuild_wire().unwrap();
    packet.original.to_vec()
}

/// Minimal world-start body: null-parameter template, empty blobs.
fn world_start_frame() -> Vec<u8> {
    let mut w = PacketWriter::new();
    let mut template = ValueMap::new();
    template.insert("celestialParameters".to_owned(), Value::Null);
    w.write_json(&Value::Object(template)).unwrap();
    w.write_byte_array(b"");
    w.write_byte_array(b"");
    for f in [0.0f32, 0.0, 0.0, 0.0] {
        w.write_f32(f);
    }
    w.write_bool(false);
    w.write_json(&Value::Null).unwrap();
    w.write_vlq(0);
    w.write_vlq(0);
    w.write_vlq(0);
    w.write_u16(1);
    w.write_bool(false);
    let body = w.into_inner();

    let mut packet = Packet::new(
        PacketType::WorldStart,
        Direction::ToClient,
        false,
        bytes::Bytes::from(body),
        bytes::Bytes::new(),
    );
    packet.rebuild_wire().unwrap();
    packet.original.to_vec()
}

fn chat_message_text(packet: &Packet) -> String {
    assert_eq!(packet.packet_type, PacketType::ChatReceived);
    let decode = starbridge_proto::codec::decoder(PacketType::ChatReceived).unwrap();
    let mut reader = starbridge_proto::PacketReader::new(&packet.data);
    let values = decode(&mut reader, Direction::ToClient).unwrap();
    values.get("message").and_then(Value::as_str).unwrap().to_owned()
}

#[tokio::test]
async fn unhooked_frames_forward_bit_identical() {
    let mut upstream = spawn_upstream().await;
    let (proxy_addr, _dir) = start_proxy(upstream.addr, Vec::new()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    let wire = protocol_request_frame(743);
    client.write_all(&wire).await.unwrap();

    let received = timeout(WAIT, upstream.received.recv()).await.unwrap().unwrap();
    assert_eq!(received.packet_type, PacketType::ProtocolRequest);
    assert_eq!(received.original.as_ref(), wire.as_slice());
    assert_eq!(received.data.as_ref(), &743u32.to_be_bytes());
}

#[tokio::test]
async fn compressed_frames_forward_bit_identical() {
    let mut upstream = spawn_upstream().await;
    let (proxy_addr, _dir) = start_proxy(upstream.addr, Vec::new()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    // handshake one frame upstream so the session is fully up
    client.write_all(&protocol_request_frame(1)).await.unwrap();
    timeout(WAIT, upstream.received.recv()).await.unwrap().unwrap();

    let wire = connect_failure_frame("bye", true);
    upstream.to_client.send(wire.clone()).await.unwrap();

    let packet = timeout(WAIT, read_frame(&mut client, Direction::ToClient))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(packet.packet_type, PacketType::ConnectFailure);
    assert!(packet.compressed);
    assert_eq!(packet.original.as_ref(), wire.as_slice());

    let decode = starbridge_proto::codec::decoder(PacketType::ConnectFailure).unwrap();
    let mut reader = starbridge_proto::PacketReader::new(&packet.data);
    let values = decode(&mut reader, Direction::ToClient).unwrap();
    assert_eq!(values.get("reason").and_then(Value::as_str), Some("bye"));
}

#[tokio::test]
async fn known_command_is_consumed_and_answered() {
    let mut upstream = spawn_upstream().await;
    let (proxy_addr, _dir) = start_proxy(upstream.addr, Vec::new()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    client.write_all(&chat_sent_frame("/help")).await.unwrap();

    let reply = timeout(WAIT, read_frame(&mut client, Direction::ToClient))
        .await
        .unwrap()
        .unwrap();
    let text = chat_message_text(&reply);
    assert!(text.contains("help"), "help reply should list commands: {text}");

    // the chat line itself never reached the upstream: the next frame
    // it sees is the protocol request sent afterwards
    client.write_all(&protocol_request_frame(2)).await.unwrap();
    let first_upstream = timeout(WAIT, upstream.received.recv()).await.unwrap().unwrap();
    assert_eq!(first_upstream.packet_type, PacketType::ProtocolRequest);
}

#[tokio::test]
async fn unknown_command_is_consumed_with_reply() {
    let mut upstream = spawn_upstream().await;
    let (proxy_addr, _dir) = start_proxy(upstream.addr, Vec::new()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    client.write_all(&chat_sent_frame("/nope")).await.unwrap();

    let reply = timeout(WAIT, read_frame(&mut client, Direction::ToClient))
        .await
        .unwrap()
        .unwrap();
    let text = chat_message_text(&reply);
    assert!(
        text.contains("Command nope does not exist."),
        "unexpected reply: {text}"
    );

    client.write_all(&protocol_request_frame(3)).await.unwrap();
    let first_upstream = timeout(WAIT, upstream.received.recv()).await.unwrap().unwrap();
    assert_eq!(first_upstream.packet_type, PacketType::ProtocolRequest);
}

struct VetoHook {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Plugin for VetoHook {
    fn name(&self) -> &str {
        "veto_hook"
    }

    fn hooks(&self) -> Vec<HookSpec> {
        vec![HookSpec::with_priority(PacketType::WorldStart, 10)]
    }

    async fn handle(
        &self,
        _packet: &mut Packet,
        _session: &Arc<dyn SessionHandle>,
    ) -> Result<bool, PluginError> {
        self.calls.lock().unwrap().push("veto");
        Ok(false)
    }
}

struct LateHook {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Plugin for LateHook {
    fn name(&self) -> &str {
        "late_hook"
    }

    fn hooks(&self) -> Vec<HookSpec> {
        vec![HookSpec::with_priority(PacketType::WorldStart, 1)]
    }

    async fn handle(
        &self,
        _packet: &mut Packet,
        _session: &Arc<dyn SessionHandle>,
    ) -> Result<bool, PluginError> {
        self.calls.lock().unwrap().push("late");
        Ok(true)
    }
}

#[tokio::test]
async fn veto_drops_frame_but_low_priority_hook_still_runs() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let veto_calls = Arc::clone(&calls);
    let late_calls = Arc::clone(&calls);
    let factories = vec![
        PluginFactory::new("veto_hook", move |_| {
            Arc::new(VetoHook { calls: Arc::clone(&veto_calls) })
        }),
        PluginFactory::new("late_hook", move |_| {
            Arc::new(LateHook { calls: Arc::clone(&late_calls) })
        }),
    ];

    let mut upstream = spawn_upstream().await;
    let (proxy_addr, _dir) = start_proxy(upstream.addr, factories).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    client.write_all(&protocol_request_frame(1)).await.unwrap();
    timeout(WAIT, upstream.received.recv()).await.unwrap().unwrap();

    // vetoed frame, then a follow-up that must arrive first at the client
    upstream.to_client.send(world_start_frame()).await.unwrap();
    upstream.to_client.send(connect_failure_frame("after", false)).await.unwrap();

    let first = timeout(WAIT, read_frame(&mut client, Direction::ToClient))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.packet_type, PacketType::ConnectFailure);
    assert_eq!(*calls.lock().unwrap(), vec!["veto", "late"]);
}

#[tokio::test]
async fn upstream_close_tears_down_the_client_side() {
    let mut upstream = spawn_upstream().await;
    let (proxy_addr, _dir) = start_proxy(upstream.addr, Vec::new()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    client.write_all(&protocol_request_frame(1)).await.unwrap();
    timeout(WAIT, upstream.received.recv()).await.unwrap().unwrap();

    upstream.shutdown.send(()).await.unwrap();

    // the proxy cancels the sibling task and closes our socket
    let result = timeout(WAIT, read_frame(&mut client, Direction::ToClient)).await.unwrap();
    assert!(matches!(result, Err(ProtocolError::IncompleteRead)));
}
