//! SQLite reference store used by ingestion.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use jusho_core::{
    CancellationToken, Location, LocationRecord, ReferenceStore, StoreError,
    store::{LOCATION_COLUMNS, SchemaError, initialise_schema, read_location},
};
use jusho_fs::ensure_parent_dir;
use rusqlite::{Connection, Error as SqliteError, OptionalExtension, params};
use thiserror::Error;

/// Rows inserted between cancellation checks inside a bulk insert.
const CANCELLATION_CHECK_INTERVAL: usize = 500;

const INSERT_LOCATION: &str = "INSERT INTO locations
    (prefecture, municipality, address_1, address_2, block_lot, lat, lon)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

/// Errors raised when opening the reference store.
#[derive(Debug, Error)]
pub enum OpenStoreError {
    /// Failed to create the parent directory for the database.
    #[error("failed to create parent directory for {path}: {source}")]
    CreateDirectory {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}: {source}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Creating or validating the schema failed.
    #[error("failed to initialise schema in {path}: {source}")]
    Schema {
        /// Database path.
        path: Utf8PathBuf,
        /// Schema error.
        #[source]
        source: SchemaError,
    },
}

/// Persisted processed-file ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// File identifier.
    pub file_id: String,
    /// Completion time in RFC 3339 UTC, e.g. `2024-05-01T09:30:00Z`.
    pub processed_at: String,
    /// Number of records inserted from the file.
    pub record_count: u64,
}

/// Read-write reference store backed by a SQLite database.
#[derive(Debug)]
pub struct SqliteReferenceStore {
    connection: Connection,
    path: Utf8PathBuf,
    cancellation: Option<CancellationToken>,
}

impl SqliteReferenceStore {
    /// Open or create the database at `path` and initialise its schema.
    ///
    /// Parent directories are created as needed.
    pub fn open(path: &Utf8Path) -> Result<Self, OpenStoreError> {
        ensure_parent_dir(path).map_err(|source| OpenStoreError::CreateDirectory {
            path: path.to_path_buf(),
            source,
        })?;
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| OpenStoreError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::initialise(connection, path.to_path_buf())
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, OpenStoreError> {
        let path = Utf8PathBuf::from(":memory:");
        let connection = Connection::open_in_memory().map_err(|source| OpenStoreError::Open {
            path: path.clone(),
            source,
        })?;
        Self::initialise(connection, path)
    }

    fn initialise(mut connection: Connection, path: Utf8PathBuf) -> Result<Self, OpenStoreError> {
        if let Err(source) = initialise_schema(&mut connection) {
            return Err(OpenStoreError::Schema { path, source });
        }
        Ok(Self {
            connection,
            path,
            cancellation: None,
        })
    }

    /// Abort bulk inserts once `token` reports cancellation.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Location of the database file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Read the ledger entry for `file_id`, if any.
    pub fn ledger_entry(&self, file_id: &str) -> Result<Option<LedgerEntry>, StoreError> {
        const OPERATION: &str = "read processed file";
        let row = self
            .connection
            .query_row(
                "SELECT file_path, processed_at, record_count
                 FROM processed_files WHERE file_path = ?1",
                [file_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()
            .map_err(|source| StoreError::backend(OPERATION, source))?;
        row.map(|(file_id, processed_at, count)| {
            let record_count = u64::try_from(count)
                .map_err(|source| StoreError::backend(OPERATION, source))?;
            Ok(LedgerEntry {
                file_id,
                processed_at,
                record_count,
            })
        })
        .transpose()
    }

    /// Insert `records` in one transaction, consulting `stop` before the
    /// first row, every [`CANCELLATION_CHECK_INTERVAL`] rows and before
    /// committing. A `true` answer rolls the transaction back.
    fn insert_until<F>(
        &mut self,
        records: &[LocationRecord],
        mut stop: F,
    ) -> Result<u64, StoreError>
    where
        F: FnMut() -> bool,
    {
        const OPERATION: &str = "insert locations";
        let cancelled = || StoreError::Cancelled {
            operation: OPERATION,
        };
        if stop() {
            return Err(cancelled());
        }

        let transaction = self
            .connection
            .transaction()
            .map_err(|source| StoreError::backend(OPERATION, source))?;
        let mut inserted: u64 = 0;
        {
            let mut statement = transaction
                .prepare_cached(INSERT_LOCATION)
                .map_err(|source| StoreError::backend(OPERATION, source))?;
            for (index, record) in records.iter().enumerate() {
                if index > 0 && index % CANCELLATION_CHECK_INTERVAL == 0 && stop() {
                    // Dropping the transaction rolls it back.
                    return Err(cancelled());
                }
                statement
                    .execute(params![
                        record.prefecture,
                        record.municipality,
                        record.address_1,
                        record.address_2,
                        record.block_lot,
                        record.latitude,
                        record.longitude,
                    ])
                    .map_err(|source| StoreError::backend(OPERATION, source))?;
                inserted += 1;
            }
        }
        if stop() {
            return Err(cancelled());
        }
        transaction
            .commit()
            .map_err(|source| StoreError::backend(OPERATION, source))?;
        Ok(inserted)
    }
}

impl ReferenceStore for SqliteReferenceStore {
    fn bulk_insert(&mut self, records: &[LocationRecord]) -> Result<u64, StoreError> {
        let token = self.cancellation.clone();
        self.insert_until(records, || {
            token.as_ref().is_some_and(CancellationToken::is_cancelled)
        })
    }

    fn is_file_processed(&self, file_id: &str) -> Result<bool, StoreError> {
        self.connection
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM processed_files WHERE file_path = ?1)",
                [file_id],
                |row| row.get(0),
            )
            .map_err(|source| StoreError::backend("look up processed file", source))
    }

    fn mark_file_processed(&mut self, file_id: &str, record_count: u64) -> Result<(), StoreError> {
        let count = i64::try_from(record_count)
            .map_err(|_| StoreError::CountOutOfRange {
                count: record_count,
            })?;
        self.connection
            .execute(
                "INSERT INTO processed_files (file_path, record_count) VALUES (?1, ?2)
                 ON CONFLICT(file_path) DO NOTHING",
                params![file_id, count],
            )
            .map(|_| ())
            .map_err(|source| StoreError::backend("mark file processed", source))
    }

    fn count_rows(&self) -> Result<u64, StoreError> {
        const OPERATION: &str = "count locations";
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))
            .map_err(|source| StoreError::backend(OPERATION, source))?;
        u64::try_from(count).map_err(|source| StoreError::backend(OPERATION, source))
    }

    fn sample_row(&self) -> Result<Option<Location>, StoreError> {
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations ORDER BY id LIMIT 1");
        self.connection
            .query_row(&sql, [], read_location)
            .optional()
            .map_err(|source| StoreError::backend("sample stored location", source))
    }
}
