//! Addressable points of the reference dataset.

use geo::Coord;
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Valid latitude range in degrees.
pub const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;

/// Valid longitude range in degrees.
pub const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

/// Errors returned when a coordinate pair falls outside WGS84 bounds.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    /// Latitude was not finite or not within `[-90, 90]`.
    #[error("latitude {0} is not a finite value in [-90, 90]")]
    Latitude(f64),
    /// Longitude was not finite or not within `[-180, 180]`.
    #[error("longitude {0} is not a finite value in [-180, 180]")]
    Longitude(f64),
}

/// Check that a latitude/longitude pair is finite and within WGS84 bounds.
///
/// # Examples
/// ```
/// use jusho_core::{CoordinateError, validate_coordinate};
///
/// assert!(validate_coordinate(35.681236, 139.767125).is_ok());
/// assert_eq!(
///     validate_coordinate(95.0, 139.0),
///     Err(CoordinateError::Latitude(95.0))
/// );
/// ```
pub fn validate_coordinate(latitude: f64, longitude: f64) -> Result<(), CoordinateError> {
    if !latitude.is_finite() || !LATITUDE_RANGE.contains(&latitude) {
        return Err(CoordinateError::Latitude(latitude));
    }
    if !longitude.is_finite() || !LONGITUDE_RANGE.contains(&longitude) {
        return Err(CoordinateError::Longitude(longitude));
    }
    Ok(())
}

/// One addressable point: decomposed Japanese address plus WGS84 position.
///
/// Optional address lines are `None` rather than empty strings.
///
/// # Examples
/// ```
/// use jusho_core::LocationRecord;
///
/// # fn main() -> Result<(), jusho_core::CoordinateError> {
/// let record = LocationRecord::new("東京都", "千代田区", "丸の内", 35.681236, 139.767125)?
///     .with_address_2("一丁目")
///     .with_block_lot("");
/// assert_eq!(record.address_2.as_deref(), Some("一丁目"));
/// assert_eq!(record.block_lot, None);
/// assert_eq!(record.coord().x, 139.767125);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocationRecord {
    /// Prefecture (都道府県).
    pub prefecture: String,
    /// Municipality (市区町村).
    pub municipality: String,
    /// First address line, usually the town or district name.
    #[cfg_attr(feature = "serde", serde(rename = "address1"))]
    pub address_1: String,
    /// Second address line (丁目 and similar), when present.
    #[cfg_attr(feature = "serde", serde(rename = "address2"))]
    pub address_2: Option<String>,
    /// Block and lot designation, when present.
    pub block_lot: Option<String>,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl LocationRecord {
    /// Validate the coordinates and construct a record without optional lines.
    pub fn new(
        prefecture: impl Into<String>,
        municipality: impl Into<String>,
        address_1: impl Into<String>,
        latitude: f64,
        longitude: f64,
    ) -> Result<Self, CoordinateError> {
        validate_coordinate(latitude, longitude)?;
        Ok(Self {
            prefecture: prefecture.into(),
            municipality: municipality.into(),
            address_1: address_1.into(),
            address_2: None,
            block_lot: None,
            latitude,
            longitude,
        })
    }

    /// Set the second address line; empty text clears it.
    #[must_use]
    pub fn with_address_2(mut self, address_2: impl Into<String>) -> Self {
        self.address_2 = non_empty(address_2.into());
        self
    }

    /// Set the block/lot designation; empty text clears it.
    #[must_use]
    pub fn with_block_lot(mut self, block_lot: impl Into<String>) -> Self {
        self.block_lot = non_empty(block_lot.into());
        self
    }

    /// Position as a `geo` coordinate (`x = longitude`, `y = latitude`).
    pub const fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }

    /// Concatenated address text used for text matching.
    ///
    /// Block/lot designations are excluded so searches target place names.
    pub fn full_address(&self) -> String {
        let mut text = String::with_capacity(
            self.prefecture.len() + self.municipality.len() + self.address_1.len(),
        );
        text.push_str(&self.prefecture);
        text.push_str(&self.municipality);
        text.push_str(&self.address_1);
        if let Some(line) = &self.address_2 {
            text.push_str(line);
        }
        text
    }
}

fn non_empty(text: String) -> Option<String> {
    (!text.is_empty()).then_some(text)
}

/// A stored [`LocationRecord`] together with its store-assigned identifier.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Location {
    /// Identifier assigned by the reference store.
    pub id: u64,
    /// Address and position.
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub record: LocationRecord,
}

impl Location {
    /// Pair a record with its identifier.
    pub const fn new(id: u64, record: LocationRecord) -> Self {
        Self { id, record }
    }
}
