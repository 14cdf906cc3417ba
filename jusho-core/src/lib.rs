//! Core domain types and gateways for the Jusho address reference set.
//!
//! The crate defines the [`LocationRecord`] model, the store capability
//! traits used by ingestion ([`ReferenceStore`]) and resolution
//! ([`TextSearch`], [`NearestSearch`]), and the [`Resolver`] service that
//! validates user input before delegating to those gateways. With the
//! `store-sqlite` feature it also provides the SQLite schema and a read-side
//! [`SqliteLocationIndex`].

mod cancel;
mod location;
pub mod resolve;
pub mod store;
pub mod test_support;

pub use cancel::CancellationToken;
pub use location::{
    CoordinateError, LATITUDE_RANGE, LONGITUDE_RANGE, Location, LocationRecord,
    validate_coordinate,
};
pub use resolve::{
    DEFAULT_SEARCH_LIMIT, DEFAULT_SEARCH_RADIUS_M, ErrorClass, InvalidArgument, ResolveError,
    Resolver,
};
pub use store::{NearestSearch, ReferenceStore, StoreError, TextSearch};
#[cfg(feature = "store-sqlite")]
pub use store::{SqliteLocationIndex, SqliteLocationIndexError};
