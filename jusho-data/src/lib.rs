//! Ingestion of the Jusho address reference set.
//!
//! Responsibilities:
//! - Parse delimited location files into validated records.
//! - Persist records and the processed-file ledger in SQLite.
//! - Coordinate single-file and directory imports with per-file failure
//!   isolation.
//!
//! Boundaries:
//! - Domain types and gateway traits live in `jusho-core`.
//! - Query-time resolution lives in `jusho-core`; this crate only writes.
//!
//! Invariants:
//! - A file is ledgered only after all of its records were inserted.
//! - No global mutable state.

pub mod import;
pub mod parse;
pub mod store;

pub use import::{
    FailureStage, FileFailure, FileOutcome, FileReport, ImportError, ImportRun, ImportSummary,
    Importer, SOURCE_EXTENSION, SingleFileReport,
};
pub use parse::{
    CoordinateField, CsvLocationSource, LocationRecords, MIN_COLUMNS, ParseError,
    parse_location_file,
};
pub use store::{LedgerEntry, OpenStoreError, SqliteReferenceStore};
