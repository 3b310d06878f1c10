//! Client session over UDP.
//!
//! Every datagram carries one bincode-encoded [`Batch`]. Reads decode a batch
//! and queue whatever the translator returns for each packet; writes pass
//! through the translator into an outbox that a background task flushes on a
//! fixed cadence.

use crate::auth::TokenSource;
use crate::config::DeviceOs;
use crate::error::ClientError;
use crate::pipeline::PacketTranslator;
use async_trait::async_trait;
use log::{debug, error, warn};
use shared::login::{encode_connection_request, ClientClaims};
use shared::{packet_id, Batch, Packet, MAX_DATAGRAM_SIZE};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

const PLAY_STATUS_LOGIN_SUCCESS: i32 = 0;
const PLAY_STATUS_PLAYER_SPAWN: i32 = 3;

#[derive(Debug, Clone)]
pub struct ClientData {
    pub device_os: DeviceOs,
    pub device_model: String,
    pub language_code: String,
    pub game_version: String,
}

pub struct SessionConfig {
    pub client_data: ClientData,
    pub protocol_id: i32,
    pub translator: Arc<dyn PacketTranslator>,
    pub tokens: Arc<TokenSource>,
    pub flush_rate: Duration,
    pub enable_client_cache: bool,
    pub disconnect_on_invalid_packets: bool,
    pub login_timeout: Duration,
}

/// World parameters received while logging in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameData {
    pub entity_runtime_id: u64,
    pub world_name: String,
    pub player_position: [f32; 3],
}

#[async_trait]
pub trait Session: Send + Sync {
    async fn read_packet(&self) -> Result<Packet, ClientError>;

    async fn write_packet(&self, pk: Packet) -> Result<(), ClientError>;

    async fn flush(&self) -> Result<(), ClientError>;

    /// Says goodbye to the server and releases the connection. Calling it
    /// again is a no-op.
    async fn close(&self) -> Result<(), ClientError>;

    fn game_data(&self) -> GameData;
}

#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(
        &self,
        address: &str,
        config: SessionConfig,
    ) -> Result<Arc<dyn Session>, ClientError>;
}

struct Outbox {
    socket: Arc<UdpSocket>,
    pending: StdMutex<Vec<Packet>>,
    failure: StdMutex<Option<String>>,
}

impl Outbox {
    fn new(socket: Arc<UdpSocket>) -> Self {
        Outbox {
            socket,
            pending: StdMutex::new(Vec::new()),
            failure: StdMutex::new(None),
        }
    }

    /// Once a send has failed every later write and flush fails with it.
    fn check(&self) -> Result<(), ClientError> {
        let failure = self
            .failure
            .lock()
            .map_err(|_| ClientError::Write("outbox poisoned".to_string()))?;
        match failure.as_ref() {
            Some(reason) => Err(ClientError::Write(reason.clone())),
            None => Ok(()),
        }
    }

    fn fail(&self, reason: String) -> ClientError {
        if let Ok(mut failure) = self.failure.lock() {
            failure.get_or_insert_with(|| reason.clone());
        }
        ClientError::Write(reason)
    }

    fn push(&self, packets: Vec<Packet>) -> Result<(), ClientError> {
        self.check()?;
        let mut pending = self
            .pending
            .lock()
            .map_err(|_| ClientError::Write("outbox poisoned".to_string()))?;
        pending.extend(packets);
        Ok(())
    }

    async fn flush(&self) -> Result<(), ClientError> {
        self.check()?;
        let packets = {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| ClientError::Write("outbox poisoned".to_string()))?;
            std::mem::take(&mut *pending)
        };
        if packets.is_empty() {
            return Ok(());
        }

        let data = Batch { packets }
            .encode()
            .map_err(|e| self.fail(e.to_string()))?;
        self.socket
            .send(&data)
            .await
            .map_err(|e| self.fail(e.to_string()))?;
        Ok(())
    }
}

pub struct UdpSession {
    address: String,
    socket: Arc<UdpSocket>,
    translator: Arc<dyn PacketTranslator>,
    inbox: Mutex<VecDeque<Packet>>,
    outbox: Arc<Outbox>,
    flusher: StdMutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
    disconnect_on_invalid_packets: bool,
    game_data: GameData,
}

impl UdpSession {
    fn new(address: &str, socket: UdpSocket, config: &SessionConfig) -> Self {
        let socket = Arc::new(socket);
        let outbox = Arc::new(Outbox::new(Arc::clone(&socket)));

        let flusher = if config.flush_rate.is_zero() {
            None
        } else {
            Some(Self::spawn_flusher(Arc::clone(&outbox), config.flush_rate))
        };

        UdpSession {
            address: address.to_string(),
            socket,
            translator: Arc::clone(&config.translator),
            inbox: Mutex::new(VecDeque::new()),
            outbox,
            flusher: StdMutex::new(flusher),
            closed: AtomicBool::new(false),
            disconnect_on_invalid_packets: config.disconnect_on_invalid_packets,
            game_data: GameData::default(),
        }
    }

    /// Spawns task that periodically sends queued writes
    fn spawn_flusher(outbox: Arc<Outbox>, flush_rate: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(flush_rate);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if let Err(e) = outbox.flush().await {
                    error!("Failed to flush packets: {}", e);
                    break;
                }
            }
        })
    }

    /// Translates and queues packets so they leave in the same batch.
    fn queue(&self, packets: Vec<Packet>) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Write("session closed".to_string()));
        }

        let translated = packets
            .into_iter()
            .flat_map(|pk| self.translator.outbound(pk))
            .collect();
        self.outbox.push(translated)
    }

    async fn login(&mut self, config: &SessionConfig) -> Result<(), ClientError> {
        let credential = config.tokens.token().await?;
        let chain = serde_json::json!({
            "AuthenticationType": 0,
            "Token": credential.access_token,
        });
        let claims = ClientClaims {
            device_os: config.client_data.device_os as i32,
            device_model: config.client_data.device_model.clone(),
            language_code: config.client_data.language_code.clone(),
            game_version: config.client_data.game_version.clone(),
            ..Default::default()
        };
        let connection_request = encode_connection_request(chain.to_string().as_bytes(), &claims)
            .map_err(|e| ClientError::connect(&self.address, e))?;

        self.queue(vec![
            Packet::Login {
                client_protocol: config.protocol_id,
                connection_request,
            },
            Packet::Other {
                id: packet_id::CLIENT_CACHE_STATUS,
                payload: vec![config.enable_client_cache as u8],
            },
        ])?;
        self.flush().await?;

        loop {
            match self.read_packet().await? {
                Packet::StartGame {
                    entity_runtime_id,
                    player_position,
                    world_name,
                } => {
                    self.game_data = GameData {
                        entity_runtime_id,
                        world_name,
                        player_position,
                    };
                    return Ok(());
                }
                Packet::PlayStatus { status }
                    if status != PLAY_STATUS_LOGIN_SUCCESS && status != PLAY_STATUS_PLAYER_SPAWN =>
                {
                    return Err(ClientError::connect(
                        &self.address,
                        format!("login rejected with play status {}", status),
                    ));
                }
                Packet::Disconnect { message, .. } => {
                    return Err(ClientError::connect(
                        &self.address,
                        format!("disconnected during login: {}", message),
                    ));
                }
                other => debug!("Login: received {}", other.name()),
            }
        }
    }
}

#[async_trait]
impl Session for UdpSession {
    async fn read_packet(&self) -> Result<Packet, ClientError> {
        let mut inbox = self.inbox.lock().await;
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            if let Some(pk) = inbox.pop_front() {
                return Ok(pk);
            }

            let len = self
                .socket
                .recv(&mut buffer)
                .await
                .map_err(|e| ClientError::Read(e.to_string()))?;

            match Batch::decode(&buffer[..len]) {
                Ok(batch) => {
                    for pk in batch.packets {
                        inbox.extend(self.translator.inbound(pk));
                    }
                }
                Err(e) if self.disconnect_on_invalid_packets => {
                    return Err(ClientError::Read(format!("invalid batch: {}", e)));
                }
                Err(e) => warn!("Failed to decode batch from {}: {}", self.address, e),
            }
        }
    }

    async fn write_packet(&self, pk: Packet) -> Result<(), ClientError> {
        self.queue(vec![pk])?;

        let flushing_in_background = self
            .flusher
            .lock()
            .map(|flusher| flusher.is_some())
            .unwrap_or(false);
        if !flushing_in_background {
            self.outbox.flush().await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<(), ClientError> {
        self.outbox.flush().await
    }

    async fn close(&self) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(());
        }

        let goodbye = self.write_packet(Packet::Disconnect {
            hide_screen: true,
            message: String::new(),
        });
        let result = match goodbye.await {
            Ok(()) => self.outbox.flush().await,
            Err(e) => Err(e),
        };

        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut flusher) = self.flusher.lock() {
            if let Some(handle) = flusher.take() {
                handle.abort();
            }
        }
        result
    }

    fn game_data(&self) -> GameData {
        self.game_data.clone()
    }
}

/// Dials servers with [`UdpSession`].
#[derive(Debug, Clone, Default)]
pub struct UdpDialer;

#[async_trait]
impl Dialer for UdpDialer {
    async fn dial(
        &self,
        address: &str,
        config: SessionConfig,
    ) -> Result<Arc<dyn Session>, ClientError> {
        let server_addr = lookup_host(address)
            .await
            .map_err(|e| ClientError::connect(address, e))?
            .next()
            .ok_or_else(|| ClientError::connect(address, "address did not resolve"))?;

        let bind_addr = if server_addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| ClientError::connect(address, e))?;
        socket
            .connect(server_addr)
            .await
            .map_err(|e| ClientError::connect(address, e))?;

        let mut session = UdpSession::new(address, socket, &config);
        let login_timeout = config.login_timeout;
        let outcome = timeout(login_timeout, session.login(&config)).await;
        match outcome {
            Ok(Ok(())) => Ok(Arc::new(session)),
            Ok(Err(e)) => {
                let _ = session.close().await;
                Err(e)
            }
            Err(_) => {
                let _ = session.close().await;
                Err(ClientError::connect(
                    address,
                    format!("login timed out after {:?}", login_timeout),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthError, Authorizer, Credential};
    use crate::pipeline::{PacketFilterPolicy, PacketPipeline};
    use assert_approx_eq::assert_approx_eq;
    use shared::login::parse_client_claims;
    use std::net::SocketAddr;

    struct NoAuth;

    #[async_trait]
    impl Authorizer for NoAuth {
        async fn authorize(&self) -> Result<Credential, AuthError> {
            Err(AuthError::Authorization("unused".to_string()))
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<Credential, AuthError> {
            Err(AuthError::Authorization("unused".to_string()))
        }
    }

    fn config(flush_rate: Duration) -> SessionConfig {
        SessionConfig {
            client_data: ClientData {
                device_os: DeviceOs::Orbis,
                device_model: "ps_emu".to_string(),
                language_code: "en_us".to_string(),
                game_version: "1.21.0".to_string(),
            },
            protocol_id: 422,
            translator: Arc::new(PacketPipeline::new(PacketFilterPolicy::default())),
            tokens: Arc::new(TokenSource::new(
                Credential::new("tok", "ref", 3600).unwrap(),
                Arc::new(NoAuth),
            )),
            flush_rate,
            enable_client_cache: false,
            disconnect_on_invalid_packets: false,
            login_timeout: Duration::from_secs(2),
        }
    }

    async fn send_batch(socket: &UdpSocket, to: SocketAddr, packets: Vec<Packet>) {
        let data = Batch { packets }.encode().unwrap();
        socket.send_to(&data, to).await.unwrap();
    }

    async fn recv_batch(socket: &UdpSocket) -> (Batch, SocketAddr) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, from) = socket.recv_from(&mut buf).await.unwrap();
        (Batch::decode(&buf[..len]).unwrap(), from)
    }

    fn start_game() -> Packet {
        Packet::StartGame {
            entity_runtime_id: 9,
            player_position: [0.5, 72.0, -8.5],
            world_name: "Bedrock level".to_string(),
        }
    }

    #[tokio::test]
    async fn test_dial_logs_in_and_reads_game_data() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let address = server.local_addr().unwrap().to_string();

        let peer = tokio::spawn(async move {
            let (batch, client) = recv_batch(&server).await;
            match &batch.packets[0] {
                Packet::Login {
                    client_protocol,
                    connection_request,
                } => {
                    assert_eq!(*client_protocol, 422);
                    let claims = parse_client_claims(connection_request).unwrap();
                    assert_eq!(claims.device_model, "ps_emu");
                    assert_eq!(claims.device_os, 11);
                }
                other => panic!("expected login, got {:?}", other),
            }
            assert_eq!(
                batch.packets[1],
                Packet::Other {
                    id: packet_id::CLIENT_CACHE_STATUS,
                    payload: vec![0]
                }
            );

            send_batch(
                &server,
                client,
                vec![
                    Packet::PlayStatus {
                        status: PLAY_STATUS_LOGIN_SUCCESS,
                    },
                    Packet::Other {
                        id: packet_id::LEVEL_CHUNK,
                        payload: vec![0; 16],
                    },
                    start_game(),
                    Packet::Other {
                        id: packet_id::TEXT,
                        payload: b"hello".to_vec(),
                    },
                ],
            )
            .await;

            let (batch, _) = recv_batch(&server).await;
            batch
        });

        let session = UdpDialer
            .dial(&address, config(Duration::from_millis(5)))
            .await
            .unwrap();

        let game_data = session.game_data();
        assert_eq!(game_data.world_name, "Bedrock level");
        assert_approx_eq!(game_data.player_position[1], 72.0);

        // The level chunk was dropped by the pipeline, the text is still queued.
        assert_eq!(
            session.read_packet().await.unwrap(),
            Packet::Other {
                id: packet_id::TEXT,
                payload: b"hello".to_vec(),
            }
        );

        session.close().await.unwrap();
        session.close().await.unwrap();
        let goodbye = peer.await.unwrap();
        assert!(matches!(goodbye.packets[0], Packet::Disconnect { .. }));
        assert!(session.write_packet(Packet::PlayStatus { status: 0 }).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_send_fails_later_writes() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let address = server.local_addr().unwrap().to_string();

        let peer = tokio::spawn(async move {
            let (_, client) = recv_batch(&server).await;
            send_batch(&server, client, vec![start_game()]).await;
        });

        let session = UdpDialer
            .dial(&address, config(Duration::from_millis(5)))
            .await
            .unwrap();
        peer.await.unwrap();

        let text = || Packet::Other {
            id: packet_id::TEXT,
            payload: b"anyone there?".to_vec(),
        };
        let failure = timeout(Duration::from_secs(2), async {
            loop {
                if let Err(e) = session.write_packet(text()).await {
                    return e;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("writes to a closed port should start failing");

        assert!(matches!(failure, ClientError::Write(_)));
        assert!(matches!(
            session.write_packet(text()).await,
            Err(ClientError::Write(_))
        ));
        assert!(session.flush().await.is_err());
    }

    #[tokio::test]
    async fn test_login_rejected_by_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let address = server.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (_, client) = recv_batch(&server).await;
            send_batch(
                &server,
                client,
                vec![Packet::Disconnect {
                    hide_screen: false,
                    message: "outdated client".to_string(),
                }],
            )
            .await;
        });

        let err = match UdpDialer.dial(&address, config(Duration::ZERO)).await {
            Err(e) => e,
            Ok(_) => panic!("dial should fail"),
        };
        assert!(err.to_string().contains("outdated client"));
        assert!(err.to_string().contains(&address));
    }

    #[tokio::test]
    async fn test_login_times_out() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let address = server.local_addr().unwrap().to_string();

        let mut config = config(Duration::ZERO);
        config.login_timeout = Duration::from_millis(100);

        match UdpDialer.dial(&address, config).await {
            Err(ClientError::Connect { reason, .. }) => assert!(reason.contains("timed out")),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("dial should fail"),
        }
        drop(server);
    }
}
