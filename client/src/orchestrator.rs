//! Top-level run sequence: credentials, optional realm lookup, status query,
//! session, then draining the session until interrupted.

use crate::auth::{CredentialStore, TokenCache, TokenSource};
use crate::config::ClientConfig;
use crate::discovery::StatusQuery;
use crate::error::ClientError;
use crate::pipeline::{PacketFilterPolicy, PacketPipeline};
use crate::realms::RealmResolver;
use crate::session::{ClientData, Dialer, Session, SessionConfig};
use log::{debug, error, info};
use shared::{Packet, StatusRecord};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    CredentialAcquired,
    RealmResolved,
    Discovered,
    SessionEstablished,
    Running,
    Closed,
}

/// What the client connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `host:port`
    Address(String),
    /// Realm invite code.
    Realm(String),
}

impl Target {
    pub fn parse(target: &str) -> Self {
        if target.contains(':') {
            Target::Address(target.to_string())
        } else {
            Target::Realm(target.to_string())
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Address(address) => write!(f, "{}", address),
            Target::Realm(code) => write!(f, "realm {}", code),
        }
    }
}

pub struct Orchestrator<C> {
    config: ClientConfig,
    policy: PacketFilterPolicy,
    credentials: CredentialStore<C>,
    status_query: Arc<dyn StatusQuery>,
    realms: Arc<dyn RealmResolver>,
    dialer: Arc<dyn Dialer>,
    state: SessionState,
}

impl<C: TokenCache> Orchestrator<C> {
    pub fn new(
        config: ClientConfig,
        credentials: CredentialStore<C>,
        status_query: Arc<dyn StatusQuery>,
        realms: Arc<dyn RealmResolver>,
        dialer: Arc<dyn Dialer>,
    ) -> Self {
        Self {
            policy: PacketFilterPolicy::with_debug(config.debug),
            config,
            credentials,
            status_query,
            realms,
            dialer,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn credentials(&self) -> &CredentialStore<C> {
        &self.credentials
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Connects to `target` and keeps the session alive until `interrupt`
    /// resolves or the server ends it. The first failing step ends the run;
    /// the orchestrator is `Closed` afterwards either way.
    pub async fn run<F>(&mut self, target: &Target, interrupt: F) -> Result<(), ClientError>
    where
        F: Future<Output = ()>,
    {
        let result = self.connect_and_run(target, interrupt).await;
        self.transition(SessionState::Closed);
        result
    }

    async fn connect_and_run<F>(&mut self, target: &Target, interrupt: F) -> Result<(), ClientError>
    where
        F: Future<Output = ()>,
    {
        let start = Instant::now();

        let tokens = self.credentials.acquire().await?;
        self.transition(SessionState::CredentialAcquired);

        let address = match target {
            Target::Address(address) => address.clone(),
            Target::Realm(code) => {
                let address = self.realms.resolve(code, &tokens).await?;
                self.transition(SessionState::RealmResolved);
                address
            }
        };

        info!("Connecting to {}...", address);
        let raw = self
            .status_query
            .ping_with_timeout(&address, self.config.ping_timeout)
            .await?;
        let status = StatusRecord::parse(&raw)?;
        self.transition(SessionState::Discovered);

        info!("{}: {}", status.edition, status.motd);
        info!("Protocol: {} ({})", status.protocol_version, status.protocol_id);
        info!("Players: {}/{}", status.player_count, status.max_player_count);
        info!("Address: {}", address);
        info!("Ping time: {:?}", start.elapsed());

        let session = self
            .dialer
            .dial(&address, self.session_config(&status, tokens))
            .await?;
        self.transition(SessionState::SessionEstablished);

        info!("Connected to {} in {:?}", address, start.elapsed());
        let [x, y, z] = session.game_data().player_position;
        info!("Position: {:.2} {:.2} {:.2}", x, y, z);

        self.transition(SessionState::Running);
        let outcome = drain_until_interrupted(Arc::clone(&session), interrupt).await;

        if let Err(e) = session.close().await {
            error!("Error closing session: {}", e);
        }
        info!("Disconnected from {} after {:?}", address, start.elapsed());
        outcome
    }

    fn session_config(&self, status: &StatusRecord, tokens: Arc<TokenSource>) -> SessionConfig {
        SessionConfig {
            client_data: ClientData {
                device_os: self.config.device_os,
                device_model: self.config.device_model.clone(),
                language_code: self.config.language_code.clone(),
                game_version: status.protocol_version.clone(),
            },
            protocol_id: status.protocol_id,
            translator: Arc::new(PacketPipeline::new(self.policy.clone())),
            tokens,
            flush_rate: self.config.flush_rate,
            enable_client_cache: self.config.enable_client_cache,
            disconnect_on_invalid_packets: self.config.disconnect_on_invalid_packets,
            login_timeout: self.config.login_timeout,
        }
    }
}

/// Reads and discards inbound packets on a background task. Whichever of the
/// drain task and `interrupt` finishes first cancels the other.
async fn drain_until_interrupted<F>(
    session: Arc<dyn Session>,
    interrupt: F,
) -> Result<(), ClientError>
where
    F: Future<Output = ()>,
{
    let cancel = CancellationToken::new();

    let drain = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _finished = cancel.clone().drop_guard();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    result = session.read_packet() => match result {
                        Ok(Packet::Disconnect { message, .. }) => {
                            info!("Disconnected by server: {}", message);
                            return Ok(());
                        }
                        Ok(_) => {}
                        Err(e) => return Err(e),
                    },
                }
            }
        })
    };

    tokio::select! {
        _ = interrupt => {
            info!("Interrupted, closing session");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }

    drain
        .await
        .map_err(|e| ClientError::Read(format!("drain task failed: {}", e)))?
}
