//! Account credential lifecycle: a cached OAuth2 token is loaded from disk,
//! or obtained through the device-code flow and cached, then handed out
//! through a [`TokenSource`] that refreshes it when it expires.

mod live;
mod store;
mod token_source;

pub use live::LiveDeviceAuth;
pub use store::{CredentialStore, FileTokenCache, MemoryTokenCache, TokenCache};
pub use token_source::TokenSource;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tokens this close to expiry are treated as already expired.
const EXPIRY_DELTA_SECS: i64 = 10;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("error getting live token: {0}")]
    Authorization(String),

    #[error("token refresh failed ({status}): {message}")]
    Refresh { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("error marshaling token: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("error writing token cache: {0}")]
    Persist(#[source] std::io::Error),

    #[error("token lifetime out of range: {0}s")]
    InvalidExpiry(i64),
}

/// An OAuth2 bearer token as persisted in the token cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in: i64,
    ) -> Result<Self, AuthError> {
        let expiry = Duration::try_seconds(expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or(AuthError::InvalidExpiry(expires_in))?;

        Ok(Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            refresh_token: refresh_token.into(),
            expiry: Some(expiry),
        })
    }

    /// A missing or zero expiry never expires.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) if expiry.year() > 1 => {
                expiry - Duration::seconds(EXPIRY_DELTA_SECS) <= now
            }
            _ => false,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired_at(now)
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        let token_type = if self.token_type.is_empty() {
            "Bearer"
        } else {
            self.token_type.as_str()
        };
        format!("{} {}", token_type, self.access_token)
    }
}

/// Source of fresh credentials: the interactive flow and the refresh grant.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self) -> Result<Credential, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<Credential, AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_window() {
        let now = Utc::now();
        let mut credential = Credential::new("a", "r", 3600).unwrap();
        assert!(credential.is_valid_at(now));

        credential.expiry = Some(now + Duration::seconds(5));
        assert!(credential.is_expired_at(now));

        credential.expiry = None;
        assert!(!credential.is_expired_at(now));
    }

    #[test]
    fn test_zero_expiry_never_expires() {
        let json = r#"{"access_token":"a","token_type":"bearer","refresh_token":"r","expiry":"0001-01-01T00:00:00Z"}"#;
        let credential: Credential = serde_json::from_str(json).unwrap();
        assert!(credential.is_valid_at(Utc::now()));
        assert_eq!(credential.authorization(), "bearer a");
    }

    #[test]
    fn test_empty_access_token_is_invalid() {
        let credential = Credential::new("", "r", 3600).unwrap();
        assert!(!credential.is_valid_at(Utc::now()));
    }

    #[test]
    fn test_out_of_range_lifetime_is_an_error() {
        match Credential::new("a", "r", i64::MAX) {
            Err(AuthError::InvalidExpiry(secs)) => assert_eq!(secs, i64::MAX),
            other => panic!("expected invalid expiry, got {:?}", other),
        }
        assert!(Credential::new("a", "r", i64::MIN).is_err());
    }

    #[test]
    fn test_cache_format() {
        let json = r#"{"access_token":"a","token_type":"bearer","refresh_token":"r","expiry":"2030-01-02T03:04:05Z"}"#;
        let credential: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(credential.refresh_token, "r");
        assert_eq!(
            credential.expiry.unwrap().to_rfc3339(),
            "2030-01-02T03:04:05+00:00"
        );

        let back = serde_json::to_value(&credential).unwrap();
        assert_eq!(back["access_token"], "a");
        assert_eq!(back["token_type"], "bearer");
    }
}
