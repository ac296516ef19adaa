//! Decoding and enrichment of feed batches.

use crate::dashboard::Dashboard;
use crate::geo::{self, Coordinate};
use crate::protocol::{self, ParseError};
use crate::reference::{AircraftTypeRecord, ReferenceDataStore};
use crate::types::{AircraftReport, EnrichedAircraft, FeedKind, UNKNOWN};
use std::sync::Arc;

/// Outcome of processing one feed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessResult {
    /// Reports merged into the dashboard
    pub merged: usize,
    /// Entries the decoder could not turn into reports
    pub skipped: usize,
    /// Reports whose type designator was missing or not in the type table
    pub unknown_types: usize,
    /// Military reports whose operator could not be resolved
    pub unknown_operators: usize,
    /// Reports without a usable position
    pub without_position: usize,
}

/// Turns raw feed bytes into enriched dashboard updates.
pub struct IngestionProcessor {
    reference: Arc<ReferenceDataStore>,
    observer: Coordinate,
}

impl IngestionProcessor {
    pub fn new(reference: Arc<ReferenceDataStore>, observer: Coordinate) -> Self {
        Self {
            reference,
            observer,
        }
    }

    /// Decode `raw`, enrich every report and merge the batch into `dashboard`.
    ///
    /// A decode failure drops the whole batch and leaves the dashboard
    /// untouched. Missing reference data never drops a report.
    pub fn process(
        &self,
        kind: FeedKind,
        raw: &[u8],
        dashboard: &mut Dashboard,
    ) -> Result<ProcessResult, ParseError> {
        let response = protocol::parse_response(raw)?;

        let mut result = ProcessResult {
            skipped: response.skipped,
            ..Default::default()
        };

        let enriched: Vec<EnrichedAircraft> = response
            .aircraft
            .iter()
            .map(|report| {
                let aircraft = self.enrich(kind, report);
                if !aircraft.type_known {
                    result.unknown_types += 1;
                }
                if aircraft.operator.as_deref() == Some(UNKNOWN) {
                    result.unknown_operators += 1;
                }
                if aircraft.distance.is_none() {
                    result.without_position += 1;
                }
                aircraft
            })
            .collect();

        result.merged = enriched.len();

        match kind {
            FeedKind::Civilian => dashboard.merge_civilian(enriched),
            FeedKind::Military => dashboard.merge_military(enriched),
        }

        tracing::debug!(
            feed = %kind,
            server_now_ms = response.now_ms,
            server_total = response.total,
            merged = result.merged,
            skipped = result.skipped,
            unknown_types = result.unknown_types,
            unknown_operators = result.unknown_operators,
            "Processed batch"
        );

        Ok(result)
    }

    /// Attach distance, type and (for military reports) operator data.
    pub fn enrich(&self, kind: FeedKind, report: &AircraftReport) -> EnrichedAircraft {
        let distance = report
            .position()
            .map(|position| geo::distance(self.observer, position));

        let type_code = report.type_code.as_deref();
        let type_info = type_code.and_then(|code| self.reference.lookup_type(code));

        let operator = match kind {
            FeedKind::Civilian => None,
            FeedKind::Military => Some(
                report
                    .military_code()
                    .and_then(|code| self.reference.lookup_operator(code))
                    .unwrap_or(UNKNOWN)
                    .to_string(),
            ),
        };

        EnrichedAircraft {
            icao: report.icao,
            kind,
            callsign: report.callsign.clone(),
            registration: report.registration.clone(),
            type_code: type_code.unwrap_or(UNKNOWN).to_string(),
            type_known: type_info.is_some(),
            type_info: type_info.cloned().unwrap_or_else(AircraftTypeRecord::unknown),
            operator,
            distance,
            altitude: report.altitude,
        }
    }
}
