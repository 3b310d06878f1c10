//! Login connection request: a length-prefixed identity chain followed by a
//! length-prefixed client data token whose claims describe the device.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("connection request truncated")]
    Truncated,

    #[error("client data token is not a JWT")]
    MalformedToken,

    #[error("client data payload is not base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("client data claims: {0}")]
    Claims(#[from] serde_json::Error),
}

/// Subset of the client data claims the client sets and inspects.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ClientClaims {
    #[serde(rename = "DeviceOS", default)]
    pub device_os: i32,
    #[serde(default)]
    pub device_model: String,
    #[serde(default)]
    pub language_code: String,
    #[serde(default)]
    pub game_version: String,
    #[serde(default)]
    pub third_party_name: String,
    #[serde(default)]
    pub third_party_name_only: bool,
}

pub fn encode_connection_request(chain: &[u8], claims: &ClientClaims) -> Result<Vec<u8>, LoginError> {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let token = format!("{}.{}.", header, payload);

    let mut buf = Vec::with_capacity(8 + chain.len() + token.len());
    buf.extend_from_slice(&(chain.len() as u32).to_le_bytes());
    buf.extend_from_slice(chain);
    buf.extend_from_slice(&(token.len() as u32).to_le_bytes());
    buf.extend_from_slice(token.as_bytes());
    Ok(buf)
}

/// Reads the client data claims without verifying any signatures.
pub fn parse_client_claims(request: &[u8]) -> Result<ClientClaims, LoginError> {
    let (_, rest) = read_prefixed(request)?;
    let (token, _) = read_prefixed(rest)?;

    let token = std::str::from_utf8(token).map_err(|_| LoginError::MalformedToken)?;
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next()) {
        (Some(_), Some(payload)) => payload,
        _ => return Err(LoginError::MalformedToken),
    };

    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&decoded)?)
}

fn read_prefixed(buf: &[u8]) -> Result<(&[u8], &[u8]), LoginError> {
    let len_bytes: [u8; 4] = buf
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(LoginError::Truncated)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    let body = buf.get(4..4 + len).ok_or(LoginError::Truncated)?;
    Ok((body, &buf[4 + len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_third_party_name_is_readable() {
        let claims = ClientClaims {
            device_os: 11,
            device_model: "ps_emu".to_string(),
            language_code: "en_us".to_string(),
            game_version: "1.21.50".to_string(),
            third_party_name: "Steve".to_string(),
            third_party_name_only: false,
        };
        let request = encode_connection_request(br#"{"chain":[]}"#, &claims).unwrap();
        assert_eq!(parse_client_claims(&request).unwrap(), claims);
    }

    #[test]
    fn test_claim_names_match_wire_casing() {
        let json = serde_json::to_value(ClientClaims {
            third_party_name: "Alex".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json["ThirdPartyName"], "Alex");
        assert!(json.get("DeviceOS").is_some());
    }

    #[test]
    fn test_malformed_requests() {
        assert!(matches!(parse_client_claims(&[]), Err(LoginError::Truncated)));
        assert!(matches!(
            parse_client_claims(&[200, 0, 0, 0, 1]),
            Err(LoginError::Truncated)
        ));

        let mut request = Vec::new();
        request.extend_from_slice(&0u32.to_le_bytes());
        request.extend_from_slice(&5u32.to_le_bytes());
        request.extend_from_slice(b"nodot");
        assert!(matches!(
            parse_client_claims(&request),
            Err(LoginError::MalformedToken)
        ));
    }
}
