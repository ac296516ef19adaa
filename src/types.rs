//! Core data types for aircraft reports.

use crate::geo::{Coordinate, Distance};
use crate::reference::AircraftTypeRecord;
use std::fmt;
use std::str::FromStr;

/// Placeholder for reference data that could not be resolved.
pub const UNKNOWN: &str = "unknown";

/// Which upstream feed a batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Civilian,
    Military,
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Civilian => f.write_str("civilian"),
            Self::Military => f.write_str("military"),
        }
    }
}

/// ICAO 24-bit aircraft address.
///
/// Addresses that are not real ICAO allocations (TIS-B, MLAT tracks) are
/// prefixed with `~` by the feed and carry the temp flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IcaoAddress(pub u32);

impl IcaoAddress {
    const TEMP_FLAG: u32 = 1 << 24;

    pub const fn new(addr: u32) -> Self {
        Self(addr & 0x00FF_FFFF)
    }

    pub const fn temp(addr: u32) -> Self {
        Self((addr & 0x00FF_FFFF) | Self::TEMP_FLAG)
    }

    pub const fn is_temp(&self) -> bool {
        self.0 & Self::TEMP_FLAG != 0
    }

    pub const fn raw(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }
}

impl fmt::Display for IcaoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_temp() {
            write!(f, "~{:06x}", self.raw())
        } else {
            write!(f, "{:06x}", self.raw())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidIcaoAddress(pub String);

impl fmt::Display for InvalidIcaoAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid ICAO address: {:?}", self.0)
    }
}

impl std::error::Error for InvalidIcaoAddress {}

impl FromStr for IcaoAddress {
    type Err = InvalidIcaoAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (temp, digits) = match trimmed.strip_prefix('~') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        if digits.is_empty() || digits.len() > 6 {
            return Err(InvalidIcaoAddress(s.to_string()));
        }

        let addr = u32::from_str_radix(digits, 16).map_err(|_| InvalidIcaoAddress(s.to_string()))?;
        Ok(if temp { Self::temp(addr) } else { Self::new(addr) })
    }
}

/// Barometric altitude as reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Altitude {
    Feet(i32),
    Ground,
}

/// One decoded aircraft position report.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftReport {
    pub icao: IcaoAddress,
    pub callsign: Option<String>,
    pub registration: Option<String>,
    pub type_code: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub altitude: Option<Altitude>,
}

impl AircraftReport {
    pub fn new(icao: IcaoAddress) -> Self {
        Self {
            icao,
            callsign: None,
            registration: None,
            type_code: None,
            lat: None,
            lon: None,
            altitude: None,
        }
    }

    /// Position, if the report has one that is a valid coordinate.
    pub fn position(&self) -> Option<Coordinate> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Coordinate::new(lat, lon).ok(),
            _ => None,
        }
    }

    /// Code used to resolve the military operator: the three letter
    /// telephony designator that prefixes the callsign.
    pub fn military_code(&self) -> Option<&str> {
        let callsign = self.callsign.as_deref()?;
        let prefix = callsign.get(..3)?;
        prefix
            .chars()
            .all(|c| c.is_ascii_alphabetic())
            .then_some(prefix)
    }
}

/// A report after reference data and distance have been attached.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedAircraft {
    pub icao: IcaoAddress,
    pub kind: FeedKind,
    pub callsign: Option<String>,
    pub registration: Option<String>,
    /// Type designator, or [`UNKNOWN`] when the report has none
    pub type_code: String,
    pub type_info: AircraftTypeRecord,
    pub type_known: bool,
    /// Resolved operator for military reports
    pub operator: Option<String>,
    /// Distance from the observation point, if the report has a position
    pub distance: Option<Distance>,
    pub altitude: Option<Altitude>,
}
