use super::{AuthError, Authorizer, Credential, TokenSource};
use log::{info, warn};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Byte storage behind the credential cache.
pub trait TokenCache: Send + Sync {
    fn load(&self) -> io::Result<Vec<u8>>;

    /// Replaces the cached bytes entirely.
    fn store(&self, data: &[u8]) -> io::Result<()>;
}

/// Token cache file readable and writable by the owning user only.
#[derive(Debug, Clone)]
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenCache for FileTokenCache {
    fn load(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }

    fn store(&self, data: &[u8]) -> io::Result<()> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&self.path)?;
        file.write_all(data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

/// In-process cache, used where no file should be touched.
#[derive(Debug, Default)]
pub struct MemoryTokenCache {
    data: Mutex<Option<Vec<u8>>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Mutex::new(Some(data.into())),
        }
    }

    pub fn contents(&self) -> Option<Vec<u8>> {
        self.data.lock().ok().and_then(|data| data.clone())
    }
}

impl TokenCache for MemoryTokenCache {
    fn load(&self) -> io::Result<Vec<u8>> {
        let data = self
            .data
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "token cache poisoned"))?;
        data.clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no cached token"))
    }

    fn store(&self, data: &[u8]) -> io::Result<()> {
        let mut slot = self
            .data
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "token cache poisoned"))?;
        *slot = Some(data.to_vec());
        Ok(())
    }
}

/// Owns the cached credential and produces token sources from it.
pub struct CredentialStore<C> {
    cache: C,
    authorizer: Arc<dyn Authorizer>,
}

impl<C: TokenCache> CredentialStore<C> {
    pub fn new(cache: C, authorizer: Arc<dyn Authorizer>) -> Self {
        Self { cache, authorizer }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Reuses the cached credential when it decodes; otherwise runs the
    /// authorization flow and caches the result. A cached credential is not
    /// refreshed here, only when a token is first requested from the source.
    pub async fn acquire(&self) -> Result<Arc<TokenSource>, AuthError> {
        if let Some(credential) = self.load_cached() {
            return Ok(Arc::new(TokenSource::new(
                credential,
                Arc::clone(&self.authorizer),
            )));
        }

        info!("No usable cached token, starting authorization");
        let credential = self.authorizer.authorize().await?;
        let data = serde_json::to_vec(&credential)?;
        self.cache.store(&data).map_err(AuthError::Persist)?;

        Ok(Arc::new(TokenSource::new(
            credential,
            Arc::clone(&self.authorizer),
        )))
    }

    fn load_cached(&self) -> Option<Credential> {
        let data = match self.cache.load() {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read token cache: {}", e);
                return None;
            }
        };

        match serde_json::from_slice(&data) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!("Failed to parse token cache: {}", e);
                None
            }
        }
    }
}
