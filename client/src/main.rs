use clap::Parser;
use client::auth::{CredentialStore, FileTokenCache, LiveDeviceAuth};
use client::discovery::RakNetPinger;
use client::realms::RealmsClient;
use client::session::UdpDialer;
use client::{ClientConfig, Orchestrator, Target};
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address (host:port) or realm invite code
    target: String,

    /// Trace every packet that passes through the pipeline
    #[arg(long)]
    debug: bool,

    /// File the account token is cached in
    #[arg(long, default_value = client::config::DEFAULT_TOKEN_CACHE)]
    token_cache: PathBuf,

    /// Seconds to wait for the server to answer the status ping
    #[arg(long, default_value = "10")]
    timeout: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ClientConfig {
        token_cache: args.token_cache,
        ping_timeout: Duration::from_secs(args.timeout),
        debug: args.debug,
        ..ClientConfig::default()
    };
    if config.debug {
        info!("Packet tracing enabled");
    }

    let credentials = CredentialStore::new(
        FileTokenCache::new(config.token_cache.clone()),
        Arc::new(LiveDeviceAuth::new()),
    );
    let mut orchestrator = Orchestrator::new(
        config,
        credentials,
        Arc::new(RakNetPinger::new()),
        Arc::new(RealmsClient::new()),
        Arc::new(UdpDialer),
    );

    let target = Target::parse(&args.target);
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for interrupt: {}", e);
            std::future::pending::<()>().await;
        }
    };

    if let Err(e) = orchestrator.run(&target, interrupt).await {
        error!("{}", e);
        std::process::exit(1);
    }

    Ok(())
}
