//! ADS-B Feed Watcher CLI
//!
//! Polls the adsb.fi civilian and military feeds, enriches every aircraft with
//! reference data and logs an hourly traffic summary.

use clap::Parser;
use skywatch::{
    client::{ClientConfig, FeedClient, FeedEndpoints},
    dashboard::{Dashboard, DashboardConfig},
    geo::Coordinate,
    processor::IngestionProcessor,
    reference::{ReferenceConfig, ReferenceDataStore},
    scheduler::{FetchScheduler, ScheduleConfig},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "skywatch")]
#[command(about = "ADS-B feed watcher with aircraft type and operator enrichment", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SKYWATCH_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Aircraft type table (CSV)
    #[arg(long, env = "SKYWATCH_TYPE_TABLE", default_value = "data/ICAOList.csv")]
    type_table: PathBuf,

    /// Military operator table (CSV)
    #[arg(long, env = "SKYWATCH_OPERATOR_TABLE", default_value = "data/MilICAOOperatorLookUp.csv")]
    operator_table: PathBuf,

    /// Observer latitude in degrees
    #[arg(long, env = "SKYWATCH_LAT", default_value = "1.359297", allow_hyphen_values = true)]
    lat: f64,

    /// Observer longitude in degrees
    #[arg(long, env = "SKYWATCH_LON", default_value = "103.989348", allow_hyphen_values = true)]
    lon: f64,

    /// Civilian query radius in nautical miles
    #[arg(short, long, env = "SKYWATCH_RADIUS", default_value = "250")]
    radius: u32,

    /// Feed base URL
    #[arg(long, env = "SKYWATCH_BASE_URL", default_value = FeedEndpoints::DEFAULT_BASE_URL)]
    base_url: String,

    /// Civilian fetch interval in seconds
    #[arg(long, env = "SKYWATCH_CIVILIAN_INTERVAL", default_value = "30")]
    civilian_interval: u64,

    /// Military fetch interval in seconds
    #[arg(long, env = "SKYWATCH_MILITARY_INTERVAL", default_value = "900")]
    military_interval: u64,

    /// Offset of the military cadence in seconds
    #[arg(long, env = "SKYWATCH_MILITARY_STAGGER", default_value = "15")]
    military_stagger: u64,

    /// Summary interval in seconds
    #[arg(long, env = "SKYWATCH_SUMMARY_INTERVAL", default_value = "3600")]
    summary_interval: u64,

    /// Per-request timeout in seconds (none by default)
    #[arg(long, env = "SKYWATCH_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Reference data is required before any fetch happens
    let reference = ReferenceDataStore::load(&ReferenceConfig {
        type_table: cli.type_table.clone(),
        operator_table: cli.operator_table.clone(),
    })?;

    let observer = Coordinate::new(cli.lat, cli.lon)?;

    let schedule = ScheduleConfig {
        civilian_interval: Duration::from_secs(cli.civilian_interval),
        military_interval: Duration::from_secs(cli.military_interval),
        military_stagger: Duration::from_secs(cli.military_stagger),
        summary_interval: Duration::from_secs(cli.summary_interval),
    };

    let mut client_config = ClientConfig::default();
    if let Some(secs) = cli.request_timeout {
        client_config = client_config.with_timeout(Duration::from_secs(secs));
    }

    let endpoints = FeedEndpoints::new(cli.base_url.clone(), observer, cli.radius);

    tracing::info!("Starting skywatch");
    tracing::info!("Observer: {}", observer);
    tracing::info!("Civilian feed: {}", endpoints.civilian_url());
    tracing::info!("Military feed: {}", endpoints.military_url());

    let mut scheduler = FetchScheduler::new(
        FeedClient::new(client_config)?,
        IngestionProcessor::new(Arc::new(reference), observer),
        endpoints,
        Dashboard::new(DashboardConfig::default()),
        schedule,
    )?;
    let stats = scheduler.stats();

    let shutdown = CancellationToken::new();
    let scheduler_handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            scheduler.run(shutdown).await;
            scheduler
        })
    };

    // Handle Ctrl+C
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, shutting down...");
    shutdown.cancel();

    match scheduler_handle.await {
        Ok(scheduler) => {
            scheduler.dashboard().trigger_summary();
        }
        Err(e) => tracing::error!("Scheduler error: {}", e),
    }

    let final_stats = stats.snapshot();
    tracing::info!("Final statistics:");
    tracing::info!("  Civilian fetches: {}", final_stats.civilian_fetches);
    tracing::info!("  Military fetches: {}", final_stats.military_fetches);
    tracing::info!("  Fetch failures: {}", final_stats.fetch_failures);
    tracing::info!("  Decode failures: {}", final_stats.decode_failures);
    tracing::info!("  Records merged: {}", final_stats.records_merged);
    tracing::info!("  Summaries: {}", final_stats.summaries);

    Ok(())
}
