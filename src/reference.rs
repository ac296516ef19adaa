//! Static reference tables used to enrich aircraft reports.
//!
//! Both tables are loaded once at startup from CSV files and are read-only
//! afterwards, so the store can be shared between tasks behind an `Arc`
//! without locking.
//!
//! The two loaders follow different row policies:
//! - the aircraft type table is strict: any malformed row aborts the load
//! - the military operator table skips rows without a code, everything else
//!   malformed still aborts the load

use crate::types::UNKNOWN;
use csv::StringRecord;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column count of the aircraft type table
/// (`aircraft TypeDesignator,Class,Number+Engine Type,"MANUFACTURER, Model"`).
pub const TYPE_TABLE_COLUMNS: usize = 4;
/// Column count of the military operator table (`operator,code`).
pub const OPERATOR_TABLE_COLUMNS: usize = 2;

const TYPE_TABLE: &str = "aircraft type";
const OPERATOR_TABLE: &str = "military operator";

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Reference data source {} unavailable: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unexpected {table} table header: expected {expected} columns, found {found}")]
    SchemaMismatch {
        table: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Malformed {table} table record at line {line}: {reason}")]
    RecordParseError {
        table: &'static str,
        line: u64,
        reason: String,
    },
}

/// Type information for one ICAO type designator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AircraftTypeRecord {
    /// ICAO class, e.g. `L2J` (landplane, two jets)
    pub class: String,
    /// Number and type of engines, e.g. `2/J`
    pub engine: String,
    /// Manufacturer and model, e.g. `BOEING 737-800`
    pub model: String,
}

impl AircraftTypeRecord {
    /// Placeholder for designators missing from the type table.
    pub fn unknown() -> Self {
        Self {
            class: UNKNOWN.to_string(),
            engine: UNKNOWN.to_string(),
            model: UNKNOWN.to_string(),
        }
    }
}

/// Operator name for one military code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilitaryOperatorRecord {
    pub operator: String,
}

/// Locations of the reference tables.
#[derive(Debug, Clone)]
pub struct ReferenceConfig {
    pub type_table: PathBuf,
    pub operator_table: PathBuf,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            type_table: PathBuf::from("data/ICAOList.csv"),
            operator_table: PathBuf::from("data/MilICAOOperatorLookUp.csv"),
        }
    }
}

/// Read-only lookup tables for aircraft types and military operators.
#[derive(Debug, Default)]
pub struct ReferenceDataStore {
    types: HashMap<String, AircraftTypeRecord>,
    operators: HashMap<String, MilitaryOperatorRecord>,
}

impl ReferenceDataStore {
    pub fn new(
        types: HashMap<String, AircraftTypeRecord>,
        operators: HashMap<String, MilitaryOperatorRecord>,
    ) -> Self {
        Self { types, operators }
    }

    /// Load both tables from the configured files.
    pub fn load(config: &ReferenceConfig) -> Result<Self, ReferenceError> {
        let types = build_type_map(&read_source(&config.type_table)?)?;
        let operators = build_operator_map(&read_source(&config.operator_table)?)?;

        tracing::info!(
            types = types.len(),
            operators = operators.len(),
            "Loaded reference data"
        );

        Ok(Self::new(types, operators))
    }

    pub fn lookup_type(&self, code: &str) -> Option<&AircraftTypeRecord> {
        self.types.get(code)
    }

    pub fn lookup_operator(&self, code: &str) -> Option<&str> {
        self.operators.get(code).map(|r| r.operator.as_str())
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn operator_count(&self) -> usize {
        self.operators.len()
    }
}

fn read_source(path: &Path) -> Result<Vec<u8>, ReferenceError> {
    fs::read(path).map_err(|source| ReferenceError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })
}

fn csv_error(table: &'static str, err: csv::Error) -> ReferenceError {
    ReferenceError::RecordParseError {
        table,
        line: err.position().map_or(0, |p| p.line()),
        reason: err.to_string(),
    }
}

/// Reject what the csv reader tolerates but a strict reader would not:
/// quotes that never close, fields running across lines and quotes in the
/// middle of a field. `raw` is the exact input the record was read from.
fn check_record(
    table: &'static str,
    record: &StringRecord,
    raw: &[u8],
) -> Result<(), ReferenceError> {
    let reason = if raw.iter().filter(|&&b| b == b'"').count() % 2 != 0 {
        Some("unterminated quoted field")
    } else if record
        .iter()
        .any(|field| field.contains(|c| c == '\n' || c == '\r'))
    {
        Some("field spans multiple lines")
    } else if record.iter().any(|field| field.contains('"')) {
        Some("stray quote in field")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ReferenceError::RecordParseError {
            table,
            line: record.position().map_or(0, |p| p.line()),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Read every data row of a table whose header must be exactly `expected`
/// columns wide. Any malformed row fails the whole table.
fn read_rows(
    data: &[u8],
    table: &'static str,
    expected: usize,
) -> Result<Vec<StringRecord>, ReferenceError> {
    let mut reader = csv::Reader::from_reader(data);

    let headers = reader
        .headers()
        .map_err(|err| csv_error(table, err))?
        .clone();
    let mut consumed = reader.position().byte() as usize;
    check_record(table, &headers, data.get(..consumed).unwrap_or_default())?;

    if headers.len() != expected {
        return Err(ReferenceError::SchemaMismatch {
            table,
            expected,
            found: headers.len(),
        });
    }

    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    while reader
        .read_record(&mut record)
        .map_err(|err| csv_error(table, err))?
    {
        let end = reader.position().byte() as usize;
        check_record(table, &record, data.get(consumed..end).unwrap_or_default())?;
        consumed = end;
        rows.push(record.clone());
    }

    Ok(rows)
}

/// Build the ICAO type designator -> type record map.
///
/// Fails on a header that is not exactly [`TYPE_TABLE_COLUMNS`] wide and on
/// the first malformed row. Duplicate designators keep the last row.
pub fn build_type_map(
    data: &[u8],
) -> Result<HashMap<String, AircraftTypeRecord>, ReferenceError> {
    let types = read_rows(data, TYPE_TABLE, TYPE_TABLE_COLUMNS)?
        .into_iter()
        .map(|record| {
            (
                record[0].to_string(),
                AircraftTypeRecord {
                    class: record[1].to_string(),
                    engine: record[2].to_string(),
                    model: record[3].to_string(),
                },
            )
        })
        .collect();

    Ok(types)
}

/// Build the military code -> operator map.
///
/// Column 0 holds the operator name, column 1 the code. Rows with an empty
/// code are skipped; any other malformed row fails the load.
pub fn build_operator_map(
    data: &[u8],
) -> Result<HashMap<String, MilitaryOperatorRecord>, ReferenceError> {
    let operators = read_rows(data, OPERATOR_TABLE, OPERATOR_TABLE_COLUMNS)?
        .into_iter()
        .filter(|record| !record[1].is_empty())
        .map(|record| {
            (
                record[1].to_string(),
                MilitaryOperatorRecord {
                    operator: record[0].to_string(),
                },
            )
        })
        .collect();

    Ok(operators)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TYPE_CSV: &str = "\
aircraft TypeDesignator,Class,Number+Engine Type,\"MANUFACTURER, Model\"
B738,L2J,2/J,\"BOEING 737-800\"
A388,L4J,4/J,\"AIRBUS A-380-800\"
C130,L4T,4/T,\"LOCKHEED C-130 Hercules\"
";

    const OPERATOR_CSV: &str = "\
Operator,Code
Royal Air Force,RRR
United States Air Force,RCH
Republic of Singapore Air Force,
Royal Australian Air Force,ASY
";

    #[test]
    fn test_unseeded_store() {
        let store = ReferenceDataStore::default();
        assert!(store.lookup_type("B738").is_none());
        assert!(store.lookup_operator("RRR").is_none());
        assert!(store.lookup_type("").is_none());
    }

    #[test]
    fn test_type_map() {
        let types = build_type_map(TYPE_CSV.as_bytes()).unwrap();
        assert_eq!(types.len(), 3);

        let b738 = &types["B738"];
        assert_eq!(b738.class, "L2J");
        assert_eq!(b738.engine, "2/J");
        assert_eq!(b738.model, "BOEING 737-800");
        assert!(!types.contains_key("aircraft TypeDesignator"));
    }

    #[test]
    fn test_type_map_last_write_wins() {
        let csv = "\
a,b,c,d
B738,L2J,2/J,first
B738,L2J,2/J,second
";
        let types = build_type_map(csv.as_bytes()).unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types["B738"].model, "second");
    }

    #[test]
    fn test_type_map_header_arity() {
        let csv = "a,b,c\nB738,L2J,2/J\n";
        match build_type_map(csv.as_bytes()) {
            Err(ReferenceError::SchemaMismatch { expected, found, .. }) => {
                assert_eq!(expected, 4);
                assert_eq!(found, 3);
            }
            other => panic!("expected SchemaMismatch, got {:?}", other),
        }

        assert!(matches!(
            build_type_map("".as_bytes()),
            Err(ReferenceError::SchemaMismatch { found: 0, .. })
        ));
    }

    #[test]
    fn test_type_map_malformed_row_is_fatal() {
        let csv = "a,b,c,d\nB738,L2J,2/J,ok\nA320,L2J\nA388,L4J,4/J,ok\n";
        assert!(matches!(
            build_type_map(csv.as_bytes()),
            Err(ReferenceError::RecordParseError { .. })
        ));
    }

    fn parse_error_line(result: Result<impl std::fmt::Debug, ReferenceError>) -> u64 {
        match result {
            Err(ReferenceError::RecordParseError { line, .. }) => line,
            other => panic!("expected RecordParseError, got {:?}", other),
        }
    }

    #[test]
    fn test_type_map_unterminated_quote_is_fatal() {
        // the open quote would otherwise swallow every following row
        let csv = "a,b,c,d\nB738,L2J,2/J,\"BOEING 737\nA388,L4J,4/J,AIRBUS\nC130,L4T,4/T,LOCKHEED\n";
        assert_eq!(parse_error_line(build_type_map(csv.as_bytes())), 2);

        let last_row = "a,b,c,d\nB738,L2J,2/J,ok\nA388,L4J,4/J,\"AIRBUS";
        assert_eq!(parse_error_line(build_type_map(last_row.as_bytes())), 3);
    }

    #[test]
    fn test_type_map_bare_quote_is_fatal() {
        let csv = "a,b,c,d\nA388,L4J,4/J,AIRBUS\nB738,L2J,2/J,BOEING \"737\" 800\n";
        assert_eq!(parse_error_line(build_type_map(csv.as_bytes())), 3);
    }

    #[test]
    fn test_type_map_multiline_field_is_fatal() {
        let csv = "a,b,c,d\nB738,L2J,2/J,\"BOEING\n737\"\n";
        assert_eq!(parse_error_line(build_type_map(csv.as_bytes())), 2);
    }

    #[test]
    fn test_operator_map_bad_quoting_is_fatal() {
        let bare = "Operator,Code\nRAF \"x\" y,RRR\n";
        assert_eq!(parse_error_line(build_operator_map(bare.as_bytes())), 2);

        let unterminated = "Operator,Code\nUnited States Air Force,RCH\n\"Royal Air Force,RRR\nRAAF,ASY\n";
        assert_eq!(parse_error_line(build_operator_map(unterminated.as_bytes())), 3);
    }

    #[test]
    fn test_quoted_fields_with_commas_load() {
        let csv = "a,b,c,d\nB738,L2J,2/J,\"BOEING, 737-800\"\r\nA388,L4J,4/J,\"AIRBUS, A-380\"\r\n";
        let types = build_type_map(csv.as_bytes()).unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(types["B738"].model, "BOEING, 737-800");
        assert_eq!(types["A388"].model, "AIRBUS, A-380");
    }

    #[test]
    fn test_operator_map_skips_empty_codes() {
        let operators = build_operator_map(OPERATOR_CSV.as_bytes()).unwrap();
        assert_eq!(operators.len(), 3);
        assert_eq!(operators["RRR"].operator, "Royal Air Force");
        assert_eq!(operators["RCH"].operator, "United States Air Force");
        assert_eq!(operators["ASY"].operator, "Royal Australian Air Force");
        assert!(!operators.contains_key(""));
    }

    #[test]
    fn test_operator_map_errors() {
        assert!(matches!(
            build_operator_map("Operator,Code,Extra\nRAF,RRR,x\n".as_bytes()),
            Err(ReferenceError::SchemaMismatch { expected: 2, found: 3, .. })
        ));
        assert!(matches!(
            build_operator_map("Operator,Code\nRAF\n".as_bytes()),
            Err(ReferenceError::RecordParseError { .. })
        ));
    }

    #[test]
    fn test_operator_map_last_write_wins() {
        let csv = "Operator,Code\nOld Name,RRR\nNew Name,RRR\n";
        let operators = build_operator_map(csv.as_bytes()).unwrap();
        assert_eq!(operators["RRR"].operator, "New Name");
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempdir().unwrap();
        let config = ReferenceConfig {
            type_table: dir.path().join("types.csv"),
            operator_table: dir.path().join("operators.csv"),
        };
        fs::write(&config.type_table, TYPE_CSV).unwrap();
        fs::write(&config.operator_table, OPERATOR_CSV).unwrap();

        let store = ReferenceDataStore::load(&config).unwrap();
        assert_eq!(store.type_count(), 3);
        assert_eq!(store.operator_count(), 3);
        assert_eq!(store.lookup_type("A388").unwrap().class, "L4J");
        assert_eq!(store.lookup_operator("ASY"), Some("Royal Australian Air Force"));
        assert_eq!(store.lookup_type("ZZZZ"), None);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let config = ReferenceConfig {
            type_table: dir.path().join("missing.csv"),
            operator_table: dir.path().join("also_missing.csv"),
        };

        match ReferenceDataStore::load(&config) {
            Err(ReferenceError::SourceUnavailable { path, .. }) => {
                assert_eq!(path, config.type_table);
            }
            other => panic!("expected SourceUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_load_unreadable_source() {
        let dir = tempdir().unwrap();
        let operators = dir.path().join("operators.csv");
        fs::write(&operators, OPERATOR_CSV).unwrap();
        let config = ReferenceConfig {
            type_table: dir.path().to_path_buf(),
            operator_table: operators,
        };

        match ReferenceDataStore::load(&config) {
            Err(ReferenceError::SourceUnavailable { path, .. }) => {
                assert_eq!(path, config.type_table);
            }
            other => panic!("expected SourceUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_real_tables_load() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let store = ReferenceDataStore::load(&ReferenceConfig {
            type_table: root.join("data/ICAOList.csv"),
            operator_table: root.join("data/MilICAOOperatorLookUp.csv"),
        })
        .unwrap();

        assert_eq!(store.lookup_type("C17").unwrap().model, "BOEING, C-17 Globemaster 3");
        assert_eq!(store.lookup_operator("RCH"), Some("United States Air Force"));
        assert!(store.lookup_operator("").is_none());
    }
}
