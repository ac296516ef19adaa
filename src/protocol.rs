//! Decoder for the adsb.fi v2 JSON feed format.

use crate::types::{AircraftReport, Altitude, IcaoAddress};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Empty payload")]
    Empty,
    #[error("Server returned error: {0}")]
    ServerResponse(String),
    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decoded feed response.
#[derive(Debug, Clone)]
pub struct FeedResponse {
    /// Server timestamp in milliseconds since epoch
    pub now_ms: Option<u64>,
    /// Aircraft count reported by the server
    pub total: Option<u64>,
    pub aircraft: Vec<AircraftReport>,
    /// Entries dropped because their address could not be parsed
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(alias = "aircraft")]
    ac: Vec<RawAircraft>,
    #[serde(default)]
    now: Option<f64>,
    #[serde(default)]
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAltitude {
    Feet(f64),
    Label(String),
}

#[derive(Debug, Deserialize)]
struct RawAircraft {
    hex: String,
    #[serde(default)]
    flight: Option<String>,
    #[serde(default)]
    r: Option<String>,
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    alt_baro: Option<RawAltitude>,
}

/// Parse a feed payload into aircraft reports.
pub fn parse_response(data: &[u8]) -> Result<FeedResponse, ParseError> {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let trimmed = &data[start..];
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    // Error pages come back as HTML even on the JSON endpoints
    if trimmed.starts_with(b"<") {
        let text = String::from_utf8_lossy(&trimmed[..trimmed.len().min(500)]);
        return Err(ParseError::ServerResponse(text.to_string()));
    }

    let raw: RawResponse = serde_json::from_slice(trimmed)?;

    let mut aircraft = Vec::with_capacity(raw.ac.len());
    let mut skipped = 0;
    for entry in raw.ac {
        match convert(entry) {
            Some(report) => aircraft.push(report),
            None => skipped += 1,
        }
    }

    Ok(FeedResponse {
        now_ms: raw.now.map(|n| n as u64),
        total: raw.total,
        aircraft,
        skipped,
    })
}

fn convert(raw: RawAircraft) -> Option<AircraftReport> {
    let icao: IcaoAddress = match raw.hex.parse() {
        Ok(icao) => icao,
        Err(e) => {
            tracing::debug!("Skipping aircraft: {}", e);
            return None;
        }
    };

    let altitude = raw.alt_baro.and_then(|alt| match alt {
        RawAltitude::Feet(ft) => Some(Altitude::Feet(ft.round() as i32)),
        RawAltitude::Label(label) if label.eq_ignore_ascii_case("ground") => Some(Altitude::Ground),
        RawAltitude::Label(_) => None,
    });

    Some(AircraftReport {
        icao,
        callsign: non_empty(raw.flight),
        registration: non_empty(raw.r),
        type_code: non_empty(raw.t),
        lat: raw.lat,
        lon: raw.lon,
        altitude,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "ac": [
            {"hex":"76cd64","type":"adsb_icao","flight":"SIA321  ","r":"9V-SKA","t":"A388",
             "alt_baro":37000,"gs":480.2,"track":312.5,"lat":1.95,"lon":104.51,"dbFlags":0},
            {"hex":"~2a0b1c","type":"tisb_other","alt_baro":"ground","lat":1.36,"lon":103.99},
            {"hex":"ae1461","flight":"RCH123 ","t":"C17","dbFlags":1},
            {"hex":"not-hex","t":"B738"}
        ],
        "msg":"No error","now":1718000000123,"total":4,"ctime":1718000000000,"ptime":3
    }"#;

    #[test]
    fn test_parse_sample() {
        let response = parse_response(SAMPLE.as_bytes()).unwrap();
        assert_eq!(response.now_ms, Some(1718000000123));
        assert_eq!(response.total, Some(4));
        assert_eq!(response.aircraft.len(), 3);
        assert_eq!(response.skipped, 1);

        let sia = &response.aircraft[0];
        assert_eq!(sia.icao, IcaoAddress::new(0x76cd64));
        assert_eq!(sia.callsign.as_deref(), Some("SIA321"));
        assert_eq!(sia.registration.as_deref(), Some("9V-SKA"));
        assert_eq!(sia.type_code.as_deref(), Some("A388"));
        assert_eq!(sia.altitude, Some(Altitude::Feet(37000)));
        assert!(sia.position().is_some());

        let tisb = &response.aircraft[1];
        assert!(tisb.icao.is_temp());
        assert_eq!(tisb.altitude, Some(Altitude::Ground));
        assert_eq!(tisb.type_code, None);

        let rch = &response.aircraft[2];
        assert_eq!(rch.military_code(), Some("RCH"));
        assert!(rch.position().is_none());
    }

    #[test]
    fn test_aircraft_alias() {
        let response = parse_response(br#"{"aircraft":[{"hex":"43c6f1"}]}"#).unwrap();
        assert_eq!(response.aircraft.len(), 1);
        assert_eq!(response.now_ms, None);
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(parse_response(b""), Err(ParseError::Empty)));
        assert!(matches!(parse_response(b"  \n"), Err(ParseError::Empty)));
        assert!(matches!(
            parse_response(b"<html><body>502 Bad Gateway</body></html>"),
            Err(ParseError::ServerResponse(_))
        ));
        assert!(matches!(parse_response(b"{\"ac\": [}"), Err(ParseError::Json(_))));
        assert!(matches!(parse_response(b"{\"msg\":\"No error\"}"), Err(ParseError::Json(_))));
    }
}
