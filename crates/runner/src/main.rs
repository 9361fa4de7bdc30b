use std::sync::Arc;

use geotrackr_runner::{LoggingNotifier, RestSnapshotSource, RunnerConfig, load_config};
use geotrackr_sync::SyncClient;
use geotrackr_transport::FallbackConnector;
use log::{error, info};

fn print_help() {
    eprintln!(
        r#"GeoTrackr watch - follow live asset positions and zone crossings

USAGE:
    geotrackr-watch [OPTIONS]

OPTIONS:
    --config <PATH>     Load configuration from JSON file
    --help              Print this help message

ENVIRONMENT VARIABLES:
    GEOTRACKR_STREAM_URL            SockJS endpoint (default: http://localhost:8080/ws/location)
    GEOTRACKR_API_URL               REST API base (default: http://localhost:8080/api)
    GEOTRACKR_TOKEN                 Bearer token for both
    GEOTRACKR_HEARTBEAT_MS          Heart-beat interval (default: 10000)
    GEOTRACKR_RECONNECT_DELAY_MS    Delay before reconnecting (default: 5000)
    GEOTRACKR_UPGRADE_TIMEOUT_MS    WebSocket upgrade timeout (default: 5000)
    GEOTRACKR_POLL_INTERVAL_MS      Asset list refresh period, 0 disables (default: 5000)
    RUST_LOG                        Log level filter
"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(args[i].clone());
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            load_config(&path)?
        }
        None => RunnerConfig::default(),
    }
    .with_env()?;

    info!("Stream: {}", config.stream_url);
    info!("API: {}", config.api_url);

    let connector = Arc::new(FallbackConnector::sockjs(config.upgrade_timeout()));
    let source = Arc::new(RestSnapshotSource::new(
        config.api_base()?,
        config.token.clone(),
    ));

    let client = SyncClient::builder(config.sync_config()?, connector)
        .notifier(Arc::new(LoggingNotifier))
        .snapshot_source(source)
        .build();

    let mut connectivity = client.connectivity();
    tokio::spawn(async move {
        while connectivity.changed().await.is_ok() {
            let connection = connectivity.borrow_and_update().clone();
            match &connection.last_error {
                Some(e) => info!(
                    "Connection {} (retry {}, last error: {})",
                    connection.state, connection.retry_count, e
                ),
                None => info!("Connection {}", connection.state),
            }
        }
    });

    client.start().await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    client.stop().await?;

    let store = client.store();
    let stats = store.stats();
    info!(
        "Tracked {} assets: {} positions, {} crossings, {} duplicates dropped, {} snapshots merged",
        store.reconciled().len(),
        stats.positions_appended,
        stats.crossings_appended,
        stats.duplicates_dropped,
        stats.snapshots_merged
    );
    Ok(())
}
