//! Great-circle distance on a spherical earth.

use std::fmt;
use thiserror::Error;

/// Mean earth radius in kilometers used by the haversine calculation.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const KM_PER_NAUTICAL_MILE: f64 = 1.852;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("Latitude out of range [-90, 90]: {0}")]
    InvalidLatitude(f64),
    #[error("Longitude out of range [-180, 180]: {0}")]
    InvalidLongitude(f64),
}

/// A validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::InvalidLatitude(lat));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(GeoError::InvalidLongitude(lon));
        }
        Ok(Self { lat, lon })
    }

    pub fn latitude(&self) -> f64 {
        self.lat
    }

    pub fn longitude(&self) -> f64 {
        self.lon
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}

/// A distance, stored in kilometers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Distance(f64);

impl Distance {
    pub const ZERO: Self = Self(0.0);

    pub fn from_kilometers(km: f64) -> Self {
        Self(km)
    }

    pub fn kilometers(&self) -> f64 {
        self.0
    }

    pub fn nautical_miles(&self) -> f64 {
        self.0 / KM_PER_NAUTICAL_MILE
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} km", self.0)
    }
}

/// Haversine distance between two coordinates.
pub fn distance(p: Coordinate, q: Coordinate) -> Distance {
    let lat1 = p.lat.to_radians();
    let lat2 = q.lat.to_radians();
    let delta_lat = (q.lat - p.lat).to_radians();
    let delta_lon = (q.lon - p.lon).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    // rounding can push `a` a hair outside [0, 1] near the poles and antipodes
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    Distance(EARTH_RADIUS_KM * c)
}
