//! Facade crate for the Jusho address reference set.
//!
//! This crate re-exports the core domain types and resolution service, and
//! exposes the SQLite query index and the ingestion pipeline behind feature
//! flags.

#![forbid(unsafe_code)]

pub use jusho_core::{
    CancellationToken, CoordinateError, ErrorClass, InvalidArgument, Location, LocationRecord,
    NearestSearch, ReferenceStore, ResolveError, Resolver, StoreError, TextSearch,
};

#[cfg(feature = "store-sqlite")]
pub use jusho_core::{SqliteLocationIndex, SqliteLocationIndexError};

#[cfg(feature = "ingest")]
pub use jusho_data::{
    CsvLocationSource, ImportError, ImportRun, ImportSummary, Importer, ParseError,
    SingleFileReport, SqliteReferenceStore,
};
