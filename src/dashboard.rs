//! In-memory aggregate of the aircraft seen around the observation point.
//!
//! The dashboard keeps the current civilian and military traffic keyed by
//! ICAO address and counts, per type designator, how many distinct aircraft
//! have been seen since startup. Types with the fewest sightings are the
//! rarest. Mutation only happens from the scheduler's dispatcher task, so the
//! dashboard carries no locking of its own.

use crate::geo::Distance;
use crate::types::{EnrichedAircraft, FeedKind, IcaoAddress, UNKNOWN};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Retention settings for the current traffic picture.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Drop civilian aircraft not reported for this long
    pub civilian_stale_after: Duration,
    /// Drop military aircraft not reported for this long
    pub military_stale_after: Duration,
    /// Number of types listed in a summary
    pub summary_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            civilian_stale_after: Duration::from_secs(5 * 60),
            military_stale_after: Duration::from_secs(45 * 60),
            summary_limit: 20,
        }
    }
}

#[derive(Debug, Clone)]
struct Tracked {
    aircraft: EnrichedAircraft,
    last_seen: Instant,
}

/// Sighting count for one type designator.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSighting {
    pub type_code: String,
    pub model: String,
    pub aircraft: usize,
}

/// Point-in-time report produced by [`Dashboard::trigger_summary`].
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub civilian_current: usize,
    pub military_current: usize,
    pub distinct_aircraft: usize,
    /// Rarest types first
    pub types_by_rarity: Vec<TypeSighting>,
    /// Closest aircraft currently tracked, with its distance
    pub closest: Option<(IcaoAddress, Distance)>,
}

/// Current traffic and sighting statistics.
#[derive(Debug, Default)]
pub struct Dashboard {
    config: DashboardConfig,
    civilian: HashMap<IcaoAddress, Tracked>,
    military: HashMap<IcaoAddress, Tracked>,
    /// Distinct aircraft per type designator; untyped aircraft are left out
    sightings: HashMap<String, HashSet<IcaoAddress>>,
    models: HashMap<String, String>,
    seen: HashSet<IcaoAddress>,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Insert or update civilian aircraft.
    pub fn merge_civilian(&mut self, records: Vec<EnrichedAircraft>) {
        let stale_after = self.config.civilian_stale_after;
        self.merge(FeedKind::Civilian, records, stale_after);
    }

    /// Insert or update military aircraft.
    pub fn merge_military(&mut self, records: Vec<EnrichedAircraft>) {
        let stale_after = self.config.military_stale_after;
        self.merge(FeedKind::Military, records, stale_after);
    }

    fn merge(&mut self, kind: FeedKind, records: Vec<EnrichedAircraft>, stale_after: Duration) {
        let now = Instant::now();

        for aircraft in records {
            self.seen.insert(aircraft.icao);
            if aircraft.type_known {
                self.models
                    .entry(aircraft.type_code.clone())
                    .or_insert_with(|| aircraft.type_info.model.clone());
            }
            if aircraft.type_code != UNKNOWN {
                self.sightings
                    .entry(aircraft.type_code.clone())
                    .or_default()
                    .insert(aircraft.icao);
            }

            let current = match kind {
                FeedKind::Civilian => &mut self.civilian,
                FeedKind::Military => &mut self.military,
            };
            current.insert(aircraft.icao, Tracked { aircraft, last_seen: now });
        }

        let current = match kind {
            FeedKind::Civilian => &mut self.civilian,
            FeedKind::Military => &mut self.military,
        };
        let before = current.len();
        current.retain(|_, t| now.duration_since(t.last_seen) < stale_after);
        let dropped = before - current.len();
        if dropped > 0 {
            tracing::debug!(feed = %kind, dropped, "Dropped stale aircraft");
        }
    }

    /// Build a summary of the current picture and log it.
    pub fn trigger_summary(&self) -> Summary {
        let summary = self.summary();

        tracing::info!(
            civilian = summary.civilian_current,
            military = summary.military_current,
            distinct = summary.distinct_aircraft,
            types = self.sightings.len(),
            "Traffic summary"
        );
        for sighting in &summary.types_by_rarity {
            tracing::info!(
                type_code = %sighting.type_code,
                model = %sighting.model,
                aircraft = sighting.aircraft,
                "Type sighting"
            );
        }
        if let Some((icao, distance)) = summary.closest {
            tracing::info!(%icao, %distance, "Closest aircraft");
        }

        summary
    }

    pub fn summary(&self) -> Summary {
        let mut types_by_rarity: Vec<TypeSighting> = self
            .sightings
            .iter()
            .map(|(type_code, seen)| TypeSighting {
                type_code: type_code.clone(),
                model: self
                    .models
                    .get(type_code)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                aircraft: seen.len(),
            })
            .collect();
        types_by_rarity.sort_by(|a, b| {
            a.aircraft
                .cmp(&b.aircraft)
                .then_with(|| a.type_code.cmp(&b.type_code))
        });
        types_by_rarity.truncate(self.config.summary_limit);

        let closest = self
            .civilian
            .values()
            .chain(self.military.values())
            .filter_map(|t| t.aircraft.distance.map(|d| (t.aircraft.icao, d)))
            .min_by(|a, b| a.1.kilometers().total_cmp(&b.1.kilometers()));

        Summary {
            civilian_current: self.civilian.len(),
            military_current: self.military.len(),
            distinct_aircraft: self.seen.len(),
            types_by_rarity,
            closest,
        }
    }

    pub fn civilian(&self, icao: IcaoAddress) -> Option<&EnrichedAircraft> {
        self.civilian.get(&icao).map(|t| &t.aircraft)
    }

    pub fn military(&self, icao: IcaoAddress) -> Option<&EnrichedAircraft> {
        self.military.get(&icao).map(|t| &t.aircraft)
    }

    pub fn civilian_count(&self) -> usize {
        self.civilian.len()
    }

    pub fn military_count(&self) -> usize {
        self.military.len()
    }
}
