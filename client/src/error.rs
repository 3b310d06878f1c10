use crate::auth::AuthError;
use shared::DecodeError;
use std::time::Duration;
use thiserror::Error;

/// Everything that can end a run. Nothing here is retried.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("error parsing pong: {0}")]
    Decode(#[from] DecodeError),

    #[error("error getting account token: {0}")]
    Auth(#[from] AuthError),

    #[error("error connecting to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("error pinging {address}: no response within {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    #[error("error reading packet: {0}")]
    Read(String),

    #[error("error writing packet: {0}")]
    Write(String),

    #[error("error accepting invite {code}: HTTP error {status}")]
    Invite { code: String, status: u16 },

    #[error("error getting realm {code}: {reason}")]
    Realm { code: String, reason: String },
}

impl ClientError {
    pub(crate) fn connect(address: &str, reason: impl ToString) -> Self {
        ClientError::Connect {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn realm(code: &str, reason: impl ToString) -> Self {
        ClientError::Realm {
            code: code.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_in_messages() {
        let err = ClientError::from(DecodeError::InvalidField {
            field: "protocol id",
            value: "abc".to_string(),
        });
        assert_eq!(err.to_string(), "error parsing pong: invalid protocol id: abc");

        let err = ClientError::Invite {
            code: "AbCdEf".to_string(),
            status: 403,
        };
        assert_eq!(err.to_string(), "error accepting invite AbCdEf: HTTP error 403");

        let err = ClientError::Timeout {
            address: "127.0.0.1:19132".to_string(),
            timeout: Duration::from_millis(200),
        };
        assert_eq!(
            err.to_string(),
            "error pinging 127.0.0.1:19132: no response within 200ms"
        );

        let err = ClientError::connect("127.0.0.1:19132", "refused");
        assert!(err.to_string().contains("127.0.0.1:19132"));
    }
}
