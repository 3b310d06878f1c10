//! Device-code sign-in against the Microsoft Live token endpoints.

use super::{AuthError, Authorizer, Credential};
use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{sleep, Instant};

const LIVE_BASE_URL: &str = "https://login.live.com";
const CLIENT_ID: &str = "0000000048183522";
const SCOPE: &str = "service::user.auth.xboxlive.com::MBI_SSL";
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

#[derive(Debug, Deserialize)]
struct DeviceCode {
    user_code: String,
    device_code: String,
    verification_uri: String,
    #[serde(default = "default_interval")]
    interval: u64,
    expires_in: u64,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
}

pub struct LiveDeviceAuth {
    http: reqwest::Client,
    base_url: String,
}

impl LiveDeviceAuth {
    pub fn new() -> Self {
        Self::with_base_url(LIVE_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn start_device_flow(&self) -> Result<DeviceCode, AuthError> {
        let resp = self
            .http
            .post(format!("{}/oauth20_connect.srf", self.base_url))
            .form(&[
                ("client_id", CLIENT_ID),
                ("scope", SCOPE),
                ("response_type", "device_code"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::Authorization(format!(
                "device code request returned {}",
                status.as_u16()
            )));
        }

        Ok(resp.json().await?)
    }

    /// Polls until the user finishes signing in. `None` means still pending.
    async fn poll_token(&self, device_code: &str) -> Result<Option<Credential>, AuthError> {
        let resp = self
            .http
            .post(format!("{}/oauth20_token.srf", self.base_url))
            .form(&[
                ("client_id", CLIENT_ID),
                ("grant_type", DEVICE_CODE_GRANT),
                ("device_code", device_code),
            ])
            .send()
            .await?;

        if resp.status().is_success() {
            let token: TokenResponse = resp.json().await?;
            return Ok(Some(token.into_credential()?));
        }

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) if err.error == "authorization_pending" => Ok(None),
            Ok(err) => Err(AuthError::Authorization(err.error)),
            Err(_) => Err(AuthError::Authorization(format!(
                "token endpoint returned {}: {}",
                status, body
            ))),
        }
    }
}

impl Default for LiveDeviceAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenResponse {
    fn into_credential(self) -> Result<Credential, AuthError> {
        let mut credential =
            Credential::new(self.access_token, self.refresh_token, self.expires_in)?;
        if let Some(token_type) = self.token_type {
            credential.token_type = token_type;
        }
        Ok(credential)
    }
}

#[async_trait]
impl Authorizer for LiveDeviceAuth {
    async fn authorize(&self) -> Result<Credential, AuthError> {
        let device = self.start_device_flow().await?;
        info!(
            "Authenticate at {} using the code {}.",
            device.verification_uri, device.user_code
        );

        let deadline = Instant::now() + Duration::from_secs(device.expires_in);
        let interval = Duration::from_secs(device.interval);

        while Instant::now() < deadline {
            if let Some(credential) = self.poll_token(&device.device_code).await? {
                info!("Authentication successful.");
                return Ok(credential);
            }
            debug!("Authorization pending");
            sleep(interval).await;
        }

        Err(AuthError::Authorization(
            "device code expired before sign-in completed".to_string(),
        ))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        let resp = self
            .http
            .post(format!("{}/oauth20_token.srf", self.base_url))
            .form(&[
                ("client_id", CLIENT_ID),
                ("scope", SCOPE),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let message = resp.text().await.unwrap_or_default();
            return Err(AuthError::Refresh { status, message });
        }

        let token: TokenResponse = resp.json().await?;
        token.into_credential()
    }
}
