//! Forward and reverse address resolution.
//!
//! [`Resolver`] validates user input and delegates to the configured
//! [`TextSearch`] and [`NearestSearch`] gateways. It never ranks or measures
//! anything itself.

use geo::Coord;
use thiserror::Error;

use crate::{
    CoordinateError, Location, NearestSearch, StoreError, TextSearch, validate_coordinate,
};

/// Maximum number of forward geocoding results.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Radius in metres searched by reverse geocoding.
pub const DEFAULT_SEARCH_RADIUS_M: f64 = 10_000.0;

/// Input rejected before any store query is issued.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InvalidArgument {
    /// Forward geocoding received empty or whitespace-only text.
    #[error("missing required query parameter 'q'")]
    EmptyQuery,
    /// Latitude was not finite or outside `[-90, 90]`.
    #[error("invalid latitude {0}")]
    Latitude(f64),
    /// Longitude was not finite or outside `[-180, 180]`.
    #[error("invalid longitude {0}")]
    Longitude(f64),
}

impl From<CoordinateError> for InvalidArgument {
    fn from(value: CoordinateError) -> Self {
        match value {
            CoordinateError::Latitude(latitude) => Self::Latitude(latitude),
            CoordinateError::Longitude(longitude) => Self::Longitude(longitude),
        }
    }
}

/// Errors returned by [`Resolver`].
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The request was rejected without querying the store.
    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),
    /// The query gateway failed.
    #[error("query failed: {source}")]
    Upstream {
        /// Gateway failure.
        #[source]
        source: StoreError,
    },
    /// Nothing lies within the reverse geocoding radius.
    #[error("no location found within the search radius")]
    NoMatch,
}

/// Stable classification of resolution outcomes for user-facing surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller supplied invalid input.
    BadRequest,
    /// The input was valid but nothing matched.
    NotFound,
    /// The store failed.
    Internal,
}

impl ErrorClass {
    /// HTTP-style status code for the class.
    pub const fn status_code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Internal => 500,
        }
    }
}

/// Message reported when reverse geocoding finds nothing in range.
pub const NO_MATCH_MESSAGE: &str = "no location found within the search radius";

/// Message reported for any upstream failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

impl ResolveError {
    /// Classify the error.
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidArgument(_) => ErrorClass::BadRequest,
            Self::NoMatch => ErrorClass::NotFound,
            Self::Upstream { .. } => ErrorClass::Internal,
        }
    }

    /// Message safe to show to end users. Upstream details are withheld.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidArgument(InvalidArgument::Latitude(_)) => "invalid latitude".to_owned(),
            Self::InvalidArgument(InvalidArgument::Longitude(_)) => "invalid longitude".to_owned(),
            Self::InvalidArgument(err) => err.to_string(),
            Self::NoMatch => NO_MATCH_MESSAGE.to_owned(),
            Self::Upstream { .. } => INTERNAL_ERROR_MESSAGE.to_owned(),
        }
    }
}

/// Resolution service over a text index and a spatial index.
///
/// Both gateways may be the same value, typically borrowed.
///
/// # Examples
/// ```
/// use geo::Coord;
/// use jusho_core::{Location, NearestSearch, Resolver, StoreError, TextSearch};
///
/// struct Empty;
///
/// impl TextSearch for Empty {
///     fn search_by_text(&self, _: &str, _: usize) -> Result<Vec<Location>, StoreError> {
///         Ok(Vec::new())
///     }
/// }
///
/// impl NearestSearch for Empty {
///     fn find_nearest(&self, _: Coord<f64>, _: f64) -> Result<Option<Location>, StoreError> {
///         Ok(None)
///     }
/// }
///
/// let resolver = Resolver::new(Empty, Empty);
/// assert!(resolver.geocode("丸の内").expect("geocode").is_empty());
/// assert!(resolver.geocode("  ").is_err());
/// assert!(resolver.reverse_geocode(35.68, 139.76).expect("reverse").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Resolver<T, N> {
    text: T,
    nearest: N,
    search_limit: usize,
    search_radius_m: f64,
}

impl<T, N> Resolver<T, N>
where
    T: TextSearch,
    N: NearestSearch,
{
    /// Create a resolver with the default limit and radius.
    pub const fn new(text: T, nearest: N) -> Self {
        Self {
            text,
            nearest,
            search_limit: DEFAULT_SEARCH_LIMIT,
            search_radius_m: DEFAULT_SEARCH_RADIUS_M,
        }
    }

    /// Override the maximum number of forward results.
    #[must_use]
    pub const fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    /// Override the reverse geocoding radius in metres.
    #[must_use]
    pub const fn with_search_radius(mut self, radius_m: f64) -> Self {
        self.search_radius_m = radius_m;
        self
    }

    /// Resolve address text to ranked candidate locations.
    ///
    /// An empty vector is a successful no-match.
    pub fn geocode(&self, query: &str) -> Result<Vec<Location>, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(InvalidArgument::EmptyQuery.into());
        }
        self.text
            .search_by_text(query, self.search_limit)
            .map_err(|source| ResolveError::Upstream { source })
    }

    /// Resolve a coordinate to the nearest known location within the radius.
    ///
    /// `Ok(None)` is a successful no-match.
    pub fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Location>, ResolveError> {
        validate_coordinate(latitude, longitude).map_err(InvalidArgument::from)?;
        let origin = Coord {
            x: longitude,
            y: latitude,
        };
        self.nearest
            .find_nearest(origin, self.search_radius_m)
            .map_err(|source| ResolveError::Upstream { source })
    }

    /// Like [`Resolver::reverse_geocode`], but a no-match is reported as
    /// [`ResolveError::NoMatch`].
    pub fn require_nearest(&self, latitude: f64, longitude: f64) -> Result<Location, ResolveError> {
        self.reverse_geocode(latitude, longitude)?.ok_or(ResolveError::NoMatch)
    }
}
