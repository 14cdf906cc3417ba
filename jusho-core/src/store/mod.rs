//! Gateways to the reference store.
//!
//! [`ReferenceStore`] is the write-side gateway used by ingestion: atomic bulk
//! inserts, the processed-file ledger and post-import verification.
//! [`TextSearch`] and [`NearestSearch`] are the two read capabilities the
//! resolution service relies on. Ranking and spatial indexing are the
//! implementer's concern; callers only depend on these contracts.

use geo::Coord;
use thiserror::Error;

use crate::{Location, LocationRecord};

#[cfg(feature = "store-sqlite")]
mod schema;
#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use schema::{SCHEMA_VERSION, SchemaError, initialise_schema};
#[cfg(feature = "store-sqlite")]
pub use sqlite::{LOCATION_COLUMNS, SqliteLocationIndex, SqliteLocationIndexError, read_location};

/// Boxed error used to carry backend-specific failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by reference store gateways.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The operation observed a cancellation request and rolled back.
    #[error("{operation} was cancelled")]
    Cancelled {
        /// Operation that was interrupted.
        operation: &'static str,
    },
    /// The backing engine rejected or failed the operation.
    #[error("failed to {operation}: {source}")]
    Backend {
        /// Operation that failed.
        operation: &'static str,
        /// Engine-specific cause.
        #[source]
        source: BoxError,
    },
    /// A count could not be represented by the backing engine.
    #[error("count {count} exceeds the range supported by the store")]
    CountOutOfRange {
        /// Offending value.
        count: u64,
    },
}

impl StoreError {
    /// Wrap an engine error raised while performing `operation`.
    pub fn backend(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }

    /// Whether this error reports a cancelled operation.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Write-side gateway used by the ingestion pipeline.
///
/// # Contract
///
/// - [`bulk_insert`](Self::bulk_insert) is atomic: either every record becomes
///   visible or none do.
/// - [`is_file_processed`](Self::is_file_processed) is read-only and safe to
///   call before any mutation.
/// - [`mark_file_processed`](Self::mark_file_processed) is an idempotent
///   upsert: the first writer wins and duplicates are silently ignored.
pub trait ReferenceStore {
    /// Insert all records as one atomic batch, returning the number inserted.
    fn bulk_insert(&mut self, records: &[LocationRecord]) -> Result<u64, StoreError>;

    /// Whether a ledger entry exists for `file_id`.
    fn is_file_processed(&self, file_id: &str) -> Result<bool, StoreError>;

    /// Record `file_id` as processed with `record_count` rows.
    fn mark_file_processed(&mut self, file_id: &str, record_count: u64) -> Result<(), StoreError>;

    /// Total number of stored locations.
    fn count_rows(&self) -> Result<u64, StoreError>;

    /// Fetch an arbitrary stored location, used to probe structural validity
    /// after an import. Returns `None` when the store is empty.
    fn sample_row(&self) -> Result<Option<Location>, StoreError>;
}

/// Rank-search capability over stored address text.
pub trait TextSearch {
    /// Return at most `limit` locations matching `query`, best match first.
    ///
    /// An empty result is a valid outcome.
    fn search_by_text(&self, query: &str, limit: usize) -> Result<Vec<Location>, StoreError>;
}

/// Nearest-point capability over stored coordinates.
pub trait NearestSearch {
    /// Return the stored location closest to `origin` (`x = longitude`,
    /// `y = latitude`) by great-circle distance, provided it lies within
    /// `radius_m` metres. `Ok(None)` means nothing is close enough.
    fn find_nearest(
        &self,
        origin: Coord<f64>,
        radius_m: f64,
    ) -> Result<Option<Location>, StoreError>;
}

impl<T: TextSearch + ?Sized> TextSearch for &T {
    fn search_by_text(&self, query: &str, limit: usize) -> Result<Vec<Location>, StoreError> {
        (**self).search_by_text(query, limit)
    }
}

impl<T: NearestSearch + ?Sized> NearestSearch for &T {
    fn find_nearest(
        &self,
        origin: Coord<f64>,
        radius_m: f64,
    ) -> Result<Option<Location>, StoreError> {
        (**self).find_nearest(origin, radius_m)
    }
}

/// Split a free-text query into search terms on Unicode whitespace,
/// including the ideographic space.
pub fn search_terms(query: &str) -> Vec<&str> {
    query.split_whitespace().collect()
}
