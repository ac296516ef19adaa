//! ADS-B feed watcher with reference data enrichment.
//!
//! This library provides functionality to:
//! - Fetch civilian and military aircraft data from the adsb.fi open data API
//! - Enrich each report with aircraft type and military operator data
//! - Compute the great-circle distance to a fixed observation point
//! - Keep a running picture of current traffic and type rarity
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │   Client    │───▶│  Processor  │───▶│  Dashboard  │
//! │   (HTTP)    │    │ (Decode +   │    │ (Aggregate) │
//! └─────────────┘    │  Enrich)    │    └─────────────┘
//!        ▲           └─────────────┘
//!        │                  ▲
//! ┌─────────────┐    ┌─────────────┐
//! │  Scheduler  │    │  Reference  │
//! │ (Dispatcher)│    │  Data + Geo │
//! └─────────────┘    └─────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use skywatch::{
//!     client::{ClientConfig, FeedClient, FeedEndpoints},
//!     dashboard::Dashboard,
//!     geo::Coordinate,
//!     processor::IngestionProcessor,
//!     reference::{ReferenceConfig, ReferenceDataStore},
//!     scheduler::{FetchScheduler, ScheduleConfig},
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reference = Arc::new(ReferenceDataStore::load(&ReferenceConfig::default())?);
//!     let observer = Coordinate::new(1.359297, 103.989348)?;
//!
//!     let mut scheduler = FetchScheduler::new(
//!         FeedClient::new(ClientConfig::default())?,
//!         IngestionProcessor::new(reference, observer),
//!         FeedEndpoints::new(FeedEndpoints::DEFAULT_BASE_URL, observer, 250),
//!         Dashboard::default(),
//!         ScheduleConfig::default(),
//!     )?;
//!
//!     scheduler.run(CancellationToken::new()).await;
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod dashboard;
pub mod geo;
pub mod processor;
pub mod protocol;
pub mod reference;
pub mod scheduler;
pub mod types;

pub use client::{ClientConfig, ClientError, FeedClient, FeedEndpoints, FeedSource};
pub use dashboard::{Dashboard, DashboardConfig, Summary};
pub use geo::{distance, Coordinate, Distance};
pub use processor::{IngestionProcessor, ProcessResult};
pub use protocol::parse_response;
pub use reference::{ReferenceConfig, ReferenceDataStore, ReferenceError};
pub use scheduler::{FetchScheduler, ScheduleConfig, SchedulerStats};
pub use types::{AircraftReport, EnrichedAircraft, FeedKind, IcaoAddress};
