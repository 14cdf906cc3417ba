//! Delimited location file parsing.
//!
//! Input files are comma separated with RFC 4180 quoting. The first row is a
//! header and is discarded. Data rows need at least [`MIN_COLUMNS`] columns:
//!
//! | column | field |
//! |--------|-------|
//! | 0 | prefecture |
//! | 1 | municipality |
//! | 2 | address line 1 |
//! | 3 | address line 2 (optional) |
//! | 4 | block/lot (optional) |
//! | 9 | latitude |
//! | 10 | longitude |
//!
//! Every other column is ignored. The first bad row aborts the file.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8;
use csv::{Position, ReaderBuilder, StringRecord, StringRecordsIntoIter};
use jusho_core::{CoordinateError, LocationRecord};
use jusho_fs::open_utf8_file;
use thiserror::Error;

/// Minimum number of columns in a data row.
pub const MIN_COLUMNS: usize = 11;

const PREFECTURE_COLUMN: usize = 0;
const MUNICIPALITY_COLUMN: usize = 1;
const ADDRESS_1_COLUMN: usize = 2;
const ADDRESS_2_COLUMN: usize = 3;
const BLOCK_LOT_COLUMN: usize = 4;
const LATITUDE_COLUMN: usize = 9;
const LONGITUDE_COLUMN: usize = 10;

/// Coordinate column that failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateField {
    /// Column 9.
    Latitude,
    /// Column 10.
    Longitude,
}

impl fmt::Display for CoordinateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
        })
    }
}

/// Errors raised while parsing one location file.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The file could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        /// File being parsed.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file did not contain a header row.
    #[error("{path} is empty; expected a header row")]
    MissingHeader {
        /// File being parsed.
        path: Utf8PathBuf,
    },
    /// The byte stream was not valid delimited UTF-8 text.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File being parsed.
        path: Utf8PathBuf,
        /// Decoder error returned by `csv`.
        #[source]
        source: csv::Error,
    },
    /// A data row had too few columns.
    #[error("{path}:{line}: row has {length} columns, expected at least {}", MIN_COLUMNS)]
    MalformedRecord {
        /// File being parsed.
        path: Utf8PathBuf,
        /// 1-based line number of the row.
        line: u64,
        /// Number of columns found.
        length: usize,
    },
    /// A coordinate column was not a finite, in-range decimal number.
    #[error("{path}:{line}: invalid {field} value {value:?}")]
    MalformedCoordinate {
        /// File being parsed.
        path: Utf8PathBuf,
        /// 1-based line number of the row.
        line: u64,
        /// Offending column.
        field: CoordinateField,
        /// Raw column text.
        value: String,
    },
}

impl ParseError {
    /// File the error refers to.
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::Open { path, .. }
            | Self::MissingHeader { path }
            | Self::Read { path, .. }
            | Self::MalformedRecord { path, .. }
            | Self::MalformedCoordinate { path, .. } => path,
        }
    }
}

/// A location file that can be read from the start any number of times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvLocationSource {
    path: Utf8PathBuf,
}

impl CsvLocationSource {
    /// Describe the file at `path` without opening it.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Open the file, discard the header row and stream its records.
    ///
    /// Each call starts again from the beginning of the file.
    pub fn records(&self) -> Result<LocationRecords, ParseError> {
        let file = open_utf8_file(&self.path).map_err(|source| ParseError::Open {
            path: self.path.clone(),
            source,
        })?;
        let mut rows = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(file)
            .into_records();
        match rows.next() {
            None => Err(ParseError::MissingHeader {
                path: self.path.clone(),
            }),
            Some(Err(source)) => Err(ParseError::Read {
                path: self.path.clone(),
                source,
            }),
            Some(Ok(_header)) => Ok(LocationRecords {
                path: self.path.clone(),
                rows,
                line: 1,
                failed: false,
            }),
        }
    }

    /// Parse the whole file, stopping at the first invalid row.
    pub fn read_all(&self) -> Result<Vec<LocationRecord>, ParseError> {
        self.records()?.collect()
    }
}

/// Parse every record in the location file at `path`.
///
/// # Examples
/// ```no_run
/// use camino::Utf8Path;
/// use jusho_data::parse_location_file;
///
/// let records = parse_location_file(Utf8Path::new("data/13_tokyo.csv"))?;
/// println!("parsed {} records", records.len());
/// # Ok::<(), jusho_data::ParseError>(())
/// ```
pub fn parse_location_file(path: &Utf8Path) -> Result<Vec<LocationRecord>, ParseError> {
    CsvLocationSource::new(path).read_all()
}

/// Streaming iterator over the data rows of one location file.
///
/// The iterator yields at most one error and then stops.
pub struct LocationRecords {
    path: Utf8PathBuf,
    rows: StringRecordsIntoIter<fs_utf8::File>,
    line: u64,
    failed: bool,
}

impl fmt::Debug for LocationRecords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationRecords")
            .field("path", &self.path)
            .field("line", &self.line)
            .finish_non_exhaustive()
    }
}

impl Iterator for LocationRecords {
    type Item = Result<LocationRecord, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = match self.rows.next()? {
            Ok(row) => {
                self.line = row.position().map_or(self.line + 1, Position::line);
                parse_row(&self.path, self.line, &row)
            }
            Err(source) => Err(ParseError::Read {
                path: self.path.clone(),
                source,
            }),
        };
        self.failed = result.is_err();
        Some(result)
    }
}

fn parse_row(path: &Utf8Path, line: u64, row: &StringRecord) -> Result<LocationRecord, ParseError> {
    if row.len() < MIN_COLUMNS {
        return Err(ParseError::MalformedRecord {
            path: path.to_path_buf(),
            line,
            length: row.len(),
        });
    }
    let column = |index: usize| row.get(index).unwrap_or_default();
    let malformed = |field: CoordinateField, value: &str| ParseError::MalformedCoordinate {
        path: path.to_path_buf(),
        line,
        field,
        value: value.to_owned(),
    };

    let raw_latitude = column(LATITUDE_COLUMN);
    let raw_longitude = column(LONGITUDE_COLUMN);
    let latitude = parse_decimal(raw_latitude)
        .ok_or_else(|| malformed(CoordinateField::Latitude, raw_latitude))?;
    let longitude = parse_decimal(raw_longitude)
        .ok_or_else(|| malformed(CoordinateField::Longitude, raw_longitude))?;

    let record = LocationRecord::new(
        column(PREFECTURE_COLUMN),
        column(MUNICIPALITY_COLUMN),
        column(ADDRESS_1_COLUMN),
        latitude,
        longitude,
    )
    .map_err(|err| match err {
        CoordinateError::Latitude(_) => malformed(CoordinateField::Latitude, raw_latitude),
        CoordinateError::Longitude(_) => malformed(CoordinateField::Longitude, raw_longitude),
    })?;

    Ok(record
        .with_address_2(column(ADDRESS_2_COLUMN))
        .with_block_lot(column(BLOCK_LOT_COLUMN)))
}

fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    const HEADER: &str = "都道府県名,市区町村名,大字町丁目名,小字,街区符号,座標系,X,Y,住居表示,緯度,経度\n";

    #[fixture]
    fn dir() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("utf-8 temp path");
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    #[rstest]
    fn parses_rows_after_the_header(dir: TempDir) {
        let path = write(
            &dir,
            "tokyo.csv",
            &format!(
                "{HEADER}東京都,千代田区,丸の内,,,9,0,0,1,35.681236,139.767125\n\
                 東京都,千代田区,丸の内,二丁目,7-3,9,0,0,1, 35.6795 , 139.7640 ,extra\n"
            ),
        );
        let records = parse_location_file(&path).expect("parse file");
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.prefecture, "東京都");
        assert_eq!(first.address_2, None);
        assert_eq!(first.block_lot, None);
        assert_eq!(first.latitude, 35.681236);
        assert_eq!(first.longitude, 139.767125);

        let second = &records[1];
        assert_eq!(second.address_2.as_deref(), Some("二丁目"));
        assert_eq!(second.block_lot.as_deref(), Some("7-3"));
        assert_eq!(second.latitude, 35.6795);
    }

    #[rstest]
    fn header_only_file_yields_nothing(dir: TempDir) {
        let path = write(&dir, "header.csv", HEADER);
        assert!(parse_location_file(&path).expect("parse file").is_empty());
    }

    #[rstest]
    fn empty_file_is_missing_its_header(dir: TempDir) {
        let path = write(&dir, "empty.csv", "");
        let err = parse_location_file(&path).expect_err("empty file should fail");
        assert!(matches!(err, ParseError::MissingHeader { .. }));
    }

    #[rstest]
    fn short_rows_abort_the_file(dir: TempDir) {
        let path = write(
            &dir,
            "short.csv",
            &format!(
                "{HEADER}東京都,千代田区,丸の内,,,9,0,0,1,35.681236,139.767125\n東京都,千代田区\n"
            ),
        );
        let err = parse_location_file(&path).expect_err("short row should fail");
        assert!(matches!(
            err,
            ParseError::MalformedRecord {
                line: 3,
                length: 2,
                ..
            }
        ));
    }

    #[rstest]
    #[case("abc", "139.0", CoordinateField::Latitude, "abc")]
    #[case("35.0", "", CoordinateField::Longitude, "")]
    #[case("NaN", "139.0", CoordinateField::Latitude, "NaN")]
    #[case("95.0", "139.0", CoordinateField::Latitude, "95.0")]
    #[case("35.0", "-181", CoordinateField::Longitude, "-181")]
    fn bad_coordinates_abort_the_file(
        dir: TempDir,
        #[case] latitude: &str,
        #[case] longitude: &str,
        #[case] expected_field: CoordinateField,
        #[case] expected_value: &str,
    ) {
        let path = write(
            &dir,
            "bad.csv",
            &format!("{HEADER}東京都,千代田区,丸の内,,,9,0,0,1,{latitude},{longitude}\n"),
        );
        let err = parse_location_file(&path).expect_err("bad coordinate should fail");
        match err {
            ParseError::MalformedCoordinate {
                line, field, value, ..
            } => {
                assert_eq!(line, 2);
                assert_eq!(field, expected_field);
                assert_eq!(value, expected_value);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[rstest]
    fn invalid_utf8_is_a_read_error(dir: TempDir) {
        let path = Utf8PathBuf::from_path_buf(dir.path().join("latin1.csv")).expect("utf-8 path");
        let mut bytes = HEADER.as_bytes().to_vec();
        bytes.extend_from_slice(b"\xff\xfe,x,y,,,9,0,0,1,35.0,139.0\n");
        std::fs::write(&path, bytes).expect("write fixture");
        let err = parse_location_file(&path).expect_err("invalid utf-8 should fail");
        assert!(matches!(err, ParseError::Read { .. }));
    }

    #[rstest]
    fn missing_files_fail_to_open(dir: TempDir) {
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.csv")).expect("utf-8 path");
        let err = parse_location_file(&path).expect_err("missing file should fail");
        assert!(matches!(err, ParseError::Open { .. }));
        assert_eq!(err.path(), path);
    }

    #[rstest]
    fn sources_can_be_read_repeatedly(dir: TempDir) {
        let path = write(
            &dir,
            "again.csv",
            &format!("{HEADER}東京都,千代田区,丸の内,,,9,0,0,1,35.681236,139.767125\n"),
        );
        let source = CsvLocationSource::new(path);
        let first = source.read_all().expect("first pass");
        let second = source.read_all().expect("second pass");
        assert_eq!(first, second);
    }

    #[rstest]
    fn iteration_stops_after_the_first_error(dir: TempDir) {
        let path = write(
            &dir,
            "stop.csv",
            &format!(
                "{HEADER}short\n東京都,千代田区,丸の内,,,9,0,0,1,35.681236,139.767125\n"
            ),
        );
        let mut records = CsvLocationSource::new(path).records().expect("open file");
        assert!(matches!(records.next(), Some(Err(_))));
        assert!(records.next().is_none());
    }
}
