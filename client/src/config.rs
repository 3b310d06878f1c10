use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TOKEN_CACHE: &str = "./token_cache.json";

/// Device identity sent in the login claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOs {
    Android = 1,
    Ios = 2,
    Win10 = 7,
    Orbis = 11,
    Nx = 12,
    Xbox = 13,
}

/// Runtime settings assembled once from the command line.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub token_cache: PathBuf,
    pub ping_timeout: Duration,
    pub debug: bool,
    pub device_os: DeviceOs,
    pub device_model: String,
    pub language_code: String,
    pub flush_rate: Duration,
    pub enable_client_cache: bool,
    pub disconnect_on_invalid_packets: bool,
    pub login_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token_cache: PathBuf::from(DEFAULT_TOKEN_CACHE),
            ping_timeout: Duration::from_secs(10),
            debug: false,
            device_os: DeviceOs::Orbis,
            device_model: "ps_emu".to_string(),
            language_code: "en_us".to_string(),
            flush_rate: Duration::from_millis(20),
            enable_client_cache: false,
            disconnect_on_invalid_packets: false,
            login_timeout: Duration::from_secs(30),
        }
    }
}
