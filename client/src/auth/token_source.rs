use super::{AuthError, Authorizer, Credential};
use chrono::Utc;
use log::debug;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Hands out a valid access token, refreshing it first when it has expired.
///
/// The credential is guarded by an async mutex held across the refresh call,
/// so concurrent callers that all observe an expired token wait for a single
/// refresh and then share its result.
pub struct TokenSource {
    credential: Mutex<Credential>,
    authorizer: Arc<dyn Authorizer>,
}

impl TokenSource {
    pub fn new(credential: Credential, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            credential: Mutex::new(credential),
            authorizer,
        }
    }

    pub async fn token(&self) -> Result<Credential, AuthError> {
        let mut current = self.credential.lock().await;
        if current.is_valid_at(Utc::now()) {
            return Ok(current.clone());
        }

        if current.refresh_token.is_empty() {
            return Err(AuthError::Refresh {
                status: 0,
                message: "token expired and no refresh token is available".to_string(),
            });
        }

        debug!("Access token expired, refreshing");
        let mut fresh = self.authorizer.refresh(&current.refresh_token).await?;
        if fresh.refresh_token.is_empty() {
            fresh.refresh_token = current.refresh_token.clone();
        }
        *current = fresh;

        Ok(current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAuthorizer {
        refreshes: AtomicUsize,
        rotate: bool,
    }

    #[async_trait]
    impl Authorizer for CountingAuthorizer {
        async fn authorize(&self) -> Result<Credential, AuthError> {
            Err(AuthError::Authorization("not interactive".to_string()))
        }

        async fn refresh(&self, refresh_token: &str) -> Result<Credential, AuthError> {
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let next_refresh = if self.rotate {
                format!("{}-{}", refresh_token, n)
            } else {
                String::new()
            };
            Credential::new(format!("access-{}", n), next_refresh, 3600)
        }
    }

    fn expired(refresh: &str) -> Credential {
        let mut credential = Credential::new("stale", refresh, 0).unwrap();
        credential.expiry = Some(Utc::now() - Duration::seconds(60));
        credential
    }

    #[tokio::test]
    async fn test_valid_token_is_not_refreshed() {
        let authorizer = Arc::new(CountingAuthorizer {
            refreshes: AtomicUsize::new(0),
            rotate: false,
        });
        let credential = Credential::new("a", "r", 3600).unwrap();
        let source = TokenSource::new(credential, authorizer.clone());

        assert_eq!(source.token().await.unwrap().access_token, "a");
        assert_eq!(source.token().await.unwrap().access_token, "a");
        assert_eq!(authorizer.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let authorizer = Arc::new(CountingAuthorizer {
            refreshes: AtomicUsize::new(0),
            rotate: false,
        });
        let source = Arc::new(TokenSource::new(expired("r"), authorizer.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let source = Arc::clone(&source);
            handles.push(tokio::spawn(async move { source.token().await }));
        }
        for handle in handles {
            let credential = handle.await.unwrap().unwrap();
            assert_eq!(credential.access_token, "access-1");
            assert_eq!(credential.refresh_token, "r");
        }

        assert_eq!(authorizer.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rotated_refresh_token_is_kept() {
        let authorizer = Arc::new(CountingAuthorizer {
            refreshes: AtomicUsize::new(0),
            rotate: true,
        });
        let source = TokenSource::new(expired("r"), authorizer);
        assert_eq!(source.token().await.unwrap().refresh_token, "r-1");
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token() {
        let authorizer = Arc::new(CountingAuthorizer {
            refreshes: AtomicUsize::new(0),
            rotate: false,
        });
        let source = TokenSource::new(expired(""), authorizer.clone());
        tokio_test::assert_err!(source.token().await);
        assert_eq!(authorizer.refreshes.load(Ordering::SeqCst), 0);
    }
}
