//! WorldLand Pool
//!
//! Stratum mining pool server for the WorldLand ECCPoW network.

use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use worldland_pool::{
    EccPowValidator, PoolServer,
    config::{Args, Config},
    error::Result,
    persistence::{Persistence, PersistenceService},
    protocol::WorldlandClient,
    utils,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::from_args(&args)?;

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    utils::init_logging(&config.logging.level, &config.logging.format);
    info!("Starting WorldLand pool v{}", worldland_pool::VERSION);

    let validator = EccPowValidator::new(config.network.selector());
    let report = validator.self_test();
    if report.healthy {
        info!("ECCPoW self-test passed");
    } else {
        warn!(profiles = ?report.profiles, "ECCPoW self-test reported failures");
    }

    let client = WorldlandClient::from_config(&config.node)?;
    match client.health_check().await {
        Ok(health) => info!(
            chain_id = health.chain_id,
            block = health.block_number,
            endpoint = %health.endpoint,
            "Connected to node"
        ),
        Err(e) => warn!("Node health check failed: {}", e),
    }

    let persistence = Arc::new(PersistenceService::new(config.persistence.clone()));
    persistence.start()?;

    let recorder = Arc::clone(&persistence) as Arc<dyn Persistence>;
    let server = Arc::new(PoolServer::new(
        config,
        Arc::new(client),
        recorder,
        Arc::new(validator),
    ));
    spawn_terminate_listener(Arc::clone(&server));

    let result = server.run().await;

    persistence.stop().await?;
    let stats = persistence.stats();
    info!(
        shares = stats.shares_recorded,
        blocks = stats.blocks_recorded,
        "Pool stopped"
    );
    result
}

#[cfg(unix)]
fn spawn_terminate_listener(server: Arc<PoolServer>) {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                if term.recv().await.is_some() {
                    info!("Received SIGTERM");
                    server.shutdown();
                }
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    });
}

#[cfg(not(unix))]
fn spawn_terminate_listener(_server: Arc<PoolServer>) {}
