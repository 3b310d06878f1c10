use crate::error::ClientError;
use async_trait::async_trait;
use log::debug;
use shared::ping::{decode_unconnected_pong, encode_unconnected_ping};
use shared::MAX_DATAGRAM_SIZE;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::timeout;

/// Connectionless status query, answered with the raw status string.
#[async_trait]
pub trait StatusQuery: Send + Sync {
    async fn ping_with_timeout(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<Vec<u8>, ClientError>;
}

/// Sends an unconnected ping and waits for the matching pong.
#[derive(Debug, Clone)]
pub struct RakNetPinger {
    client_guid: i64,
}

impl RakNetPinger {
    pub fn new() -> Self {
        Self {
            client_guid: rand::random(),
        }
    }

    async fn ping(&self, address: &str) -> Result<Vec<u8>, ClientError> {
        let server_addr = lookup_host(address)
            .await
            .map_err(|e| ClientError::connect(address, e))?
            .next()
            .ok_or_else(|| ClientError::connect(address, "address did not resolve"))?;

        let bind_addr = if server_addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| ClientError::connect(address, e))?;

        let send_time = get_timestamp();
        let ping = encode_unconnected_ping(send_time, self.client_guid);
        socket
            .send_to(&ping, server_addr)
            .await
            .map_err(|e| ClientError::connect(address, e))?;

        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (len, from) = socket
                .recv_from(&mut buffer)
                .await
                .map_err(|e| ClientError::connect(address, e))?;
            if from != server_addr {
                continue;
            }

            match decode_unconnected_pong(&buffer[..len]) {
                Ok(pong) => return Ok(pong.data),
                Err(e) => debug!("Ignoring datagram from {}: {}", from, e),
            }
        }
    }
}

impl Default for RakNetPinger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusQuery for RakNetPinger {
    async fn ping_with_timeout(
        &self,
        address: &str,
        limit: Duration,
    ) -> Result<Vec<u8>, ClientError> {
        timeout(limit, self.ping(address))
            .await
            .map_err(|_| ClientError::Timeout {
                address: address.to_string(),
                timeout: limit,
            })?
    }
}

fn get_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as i64
}
