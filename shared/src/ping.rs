//! Offline ping/pong datagrams used to query a server before connecting.

use thiserror::Error;

pub const ID_UNCONNECTED_PING: u8 = 0x01;
pub const ID_UNCONNECTED_PONG: u8 = 0x1c;

/// Marker every offline message carries so it can't be mistaken for session traffic.
pub const OFFLINE_MAGIC: [u8; 16] = [
    0x00, 0xff, 0xff, 0x00, 0xfe, 0xfe, 0xfe, 0xfe, 0xfd, 0xfd, 0xfd, 0xfd, 0x12, 0x34, 0x56, 0x78,
];

const PONG_HEADER_LEN: usize = 1 + 8 + 8 + 16 + 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PingError {
    #[error("unexpected message id {0:#04x}")]
    UnexpectedId(u8),

    #[error("pong too short: {0} bytes")]
    Truncated(usize),

    #[error("offline magic mismatch")]
    BadMagic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnconnectedPong {
    pub send_time: i64,
    pub server_guid: i64,
    pub data: Vec<u8>,
}

pub fn encode_unconnected_ping(send_time: i64, client_guid: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + 8 + 16 + 8);
    buf.push(ID_UNCONNECTED_PING);
    buf.extend_from_slice(&send_time.to_be_bytes());
    buf.extend_from_slice(&OFFLINE_MAGIC);
    buf.extend_from_slice(&client_guid.to_be_bytes());
    buf
}

pub fn encode_unconnected_pong(send_time: i64, server_guid: i64, data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PONG_HEADER_LEN + data.len());
    buf.push(ID_UNCONNECTED_PONG);
    buf.extend_from_slice(&send_time.to_be_bytes());
    buf.extend_from_slice(&server_guid.to_be_bytes());
    buf.extend_from_slice(&OFFLINE_MAGIC);
    buf.extend_from_slice(&(data.len() as u16).to_be_bytes());
    buf.extend_from_slice(data);
    buf
}

pub fn decode_unconnected_pong(buf: &[u8]) -> Result<UnconnectedPong, PingError> {
    match buf.first() {
        Some(&ID_UNCONNECTED_PONG) => {}
        Some(&other) => return Err(PingError::UnexpectedId(other)),
        None => return Err(PingError::Truncated(0)),
    }
    if buf.len() < PONG_HEADER_LEN {
        return Err(PingError::Truncated(buf.len()));
    }

    let send_time = i64::from_be_bytes(read_array(&buf[1..9]));
    let server_guid = i64::from_be_bytes(read_array(&buf[9..17]));
    if buf[17..33] != OFFLINE_MAGIC {
        return Err(PingError::BadMagic);
    }

    let len = u16::from_be_bytes([buf[33], buf[34]]) as usize;
    let data = buf
        .get(PONG_HEADER_LEN..PONG_HEADER_LEN + len)
        .ok_or(PingError::Truncated(buf.len()))?;

    Ok(UnconnectedPong {
        send_time,
        server_guid,
        data: data.to_vec(),
    })
}

/// Returns the client GUID of an unconnected ping, or `None` if `buf` is not one.
pub fn decode_unconnected_ping(buf: &[u8]) -> Option<(i64, i64)> {
    if buf.len() < 33 || buf[0] != ID_UNCONNECTED_PING || buf[9..25] != OFFLINE_MAGIC {
        return None;
    }
    let send_time = i64::from_be_bytes(read_array(&buf[1..9]));
    let client_guid = i64::from_be_bytes(read_array(&buf[25..33]));
    Some((send_time, client_guid))
}

fn read_array(slice: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(slice);
    out
}
