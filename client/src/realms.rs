//! Realms are addressed by invite code; joining one means accepting the
//! invite and asking the service for the server's current address.

use crate::auth::TokenSource;
use crate::error::ClientError;
use async_trait::async_trait;
use log::info;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

const REALMS_BASE_URL: &str = "https://pocket.realms.minecraft.net";

/// Headers the invite endpoint expects from a game client.
const INVITE_HEADERS: &[(&str, &str)] = &[
    ("Accept", "*/*"),
    ("charset", "utf-8"),
    ("client-ref", "1dbf893ab5ebfb96af356e196cf516e0e4596fb0"),
    ("client-version", "1.21.50"),
    ("user-agent", "MCPE/UWP"),
    ("x-clientplatform", "Windows"),
    ("x-networkprotocolversion", "766"),
    ("Accept-Language", "en-CA"),
    ("Cache-Control", "no-cache"),
];

#[async_trait]
pub trait RealmResolver: Send + Sync {
    /// Turns a realm invite code into a `host:port` the client can dial.
    async fn resolve(&self, code: &str, tokens: &TokenSource) -> Result<String, ClientError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Realm {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct JoinResponse {
    address: String,
}

pub struct RealmsClient {
    http: reqwest::Client,
    base_url: String,
}

impl RealmsClient {
    pub fn new() -> Self {
        Self::with_base_url(REALMS_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn authorization(
        &self,
        code: &str,
        tokens: &TokenSource,
    ) -> Result<String, ClientError> {
        let credential = tokens.token().await?;
        if credential.access_token.is_empty() {
            return Err(ClientError::realm(code, "empty access token"));
        }
        Ok(credential.authorization())
    }

    pub async fn realm(&self, code: &str, tokens: &TokenSource) -> Result<Realm, ClientError> {
        let resp = self
            .http
            .get(format!("{}/worlds/v1/link/{}", self.base_url, code))
            .header(AUTHORIZATION, self.authorization(code, tokens).await?)
            .send()
            .await
            .map_err(|e| ClientError::realm(code, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::realm(
                code,
                format!("HTTP error: {}", status.as_u16()),
            ));
        }
        resp.json().await.map_err(|e| ClientError::realm(code, e))
    }

    /// Any status below 400 counts as accepted.
    pub async fn accept_invite(
        &self,
        code: &str,
        tokens: &TokenSource,
    ) -> Result<(), ClientError> {
        let mut request = self
            .http
            .post(format!("{}/invites/v1/link/accept/{}", self.base_url, code))
            .body(Vec::new());
        for (name, value) in INVITE_HEADERS {
            request = request.header(*name, *value);
        }

        let resp = request
            .header(AUTHORIZATION, self.authorization(code, tokens).await?)
            .send()
            .await
            .map_err(|e| ClientError::realm(code, e))?;

        let status = resp.status().as_u16();
        if status >= 400 {
            return Err(ClientError::Invite {
                code: code.to_string(),
                status,
            });
        }
        Ok(())
    }

    pub async fn address(
        &self,
        realm: &Realm,
        code: &str,
        tokens: &TokenSource,
    ) -> Result<String, ClientError> {
        let resp = self
            .http
            .get(format!("{}/worlds/{}/join", self.base_url, realm.id))
            .header(AUTHORIZATION, self.authorization(code, tokens).await?)
            .send()
            .await
            .map_err(|e| ClientError::realm(code, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::realm(
                code,
                format!("error getting realm address: HTTP error: {}", status.as_u16()),
            ));
        }
        let join: JoinResponse = resp.json().await.map_err(|e| ClientError::realm(code, e))?;
        Ok(join.address)
    }
}

impl Default for RealmsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealmResolver for RealmsClient {
    async fn resolve(&self, code: &str, tokens: &TokenSource) -> Result<String, ClientError> {
        let realm = self.realm(code, tokens).await?;
        info!("Found realm {} ({})", realm.name, realm.state);

        self.accept_invite(code, tokens).await?;
        self.address(&realm, code, tokens).await
    }
}
