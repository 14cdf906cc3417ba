//! SQLite schema for the reference store.

use rusqlite::{Connection, Error as SqliteError, OptionalExtension, Transaction};
use thiserror::Error;

/// Schema version written by this build.
pub const SCHEMA_VERSION: i64 = 1;

/// Initialise the reference store schema inside an existing SQLite database.
///
/// Creates the `locations` and `processed_files` tables, their indexes and
/// the schema version table in one transaction. Existing installations must
/// already match [`SCHEMA_VERSION`]; mismatches are rejected so migrations can
/// be applied explicitly.
///
/// # Examples
/// ```
/// use rusqlite::Connection;
/// use jusho_core::store::initialise_schema;
///
/// let mut conn = Connection::open_in_memory().expect("create in-memory database");
/// initialise_schema(&mut conn).expect("create schema");
///
/// let version: i64 = conn
///     .query_row("SELECT version FROM jusho_schema_version LIMIT 1", [], |row| row.get(0))
///     .expect("read schema version");
/// assert_eq!(version, 1);
/// ```
pub fn initialise_schema(connection: &mut Connection) -> Result<(), SchemaError> {
    let transaction = connection
        .transaction()
        .map_err(|source| SchemaError::Migration {
            step: "begin schema transaction",
            source,
        })?;

    create_tables(&transaction)?;
    create_indexes(&transaction)?;
    ensure_schema_version(&transaction)?;

    transaction
        .commit()
        .map_err(|source| SchemaError::Migration {
            step: "commit schema transaction",
            source,
        })?;

    Ok(())
}

fn create_tables(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create locations",
        "CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            prefecture TEXT NOT NULL,
            municipality TEXT NOT NULL,
            address_1 TEXT NOT NULL,
            address_2 TEXT,
            block_lot TEXT,
            lat REAL NOT NULL CHECK (lat BETWEEN -90.0 AND 90.0),
            lon REAL NOT NULL CHECK (lon BETWEEN -180.0 AND 180.0),
            full_address TEXT GENERATED ALWAYS AS (
                prefecture || municipality || address_1 || coalesce(address_2, '')
            ) STORED
        )",
    )?;
    run_migration_step(
        transaction,
        "create processed_files",
        "CREATE TABLE IF NOT EXISTS processed_files (
            file_path TEXT PRIMARY KEY CHECK (length(trim(file_path)) > 0),
            processed_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
            record_count INTEGER NOT NULL CHECK (record_count >= 0)
        ) WITHOUT ROWID",
    )
}

fn create_indexes(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "index locations coordinates",
        "CREATE INDEX IF NOT EXISTS idx_locations_lat_lon ON locations(lat, lon)",
    )?;
    run_migration_step(
        transaction,
        "index locations prefecture",
        "CREATE INDEX IF NOT EXISTS idx_locations_prefecture
            ON locations(prefecture, municipality)",
    )
}

fn ensure_schema_version(transaction: &Transaction<'_>) -> Result<(), SchemaError> {
    run_migration_step(
        transaction,
        "create schema version table",
        "CREATE TABLE IF NOT EXISTS jusho_schema_version (
            version INTEGER PRIMARY KEY CHECK (version > 0),
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        ) WITHOUT ROWID",
    )?;

    let existing_version: Option<i64> = transaction
        .query_row(
            "SELECT version FROM jusho_schema_version LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|source| SchemaError::Migration {
            step: "read schema version",
            source,
        })?;

    match existing_version {
        Some(version) if version == SCHEMA_VERSION => {}
        Some(found) => {
            return Err(SchemaError::VersionMismatch {
                expected: SCHEMA_VERSION,
                found,
            });
        }
        None => {
            transaction
                .execute(
                    "INSERT INTO jusho_schema_version (version) VALUES (?1)",
                    [SCHEMA_VERSION],
                )
                .map_err(|source| SchemaError::Migration {
                    step: "record schema version",
                    source,
                })?;
        }
    }

    Ok(())
}

fn run_migration_step(
    transaction: &Transaction<'_>,
    step: &'static str,
    sql: &str,
) -> Result<(), SchemaError> {
    transaction
        .execute(sql, [])
        .map(|_| ())
        .map_err(|source| SchemaError::Migration { step, source })
}

/// Errors raised when initialising the reference store schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A migration statement failed.
    #[error("failed to execute migration step '{step}': {source}")]
    Migration {
        /// Human-readable migration step.
        step: &'static str,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// The database was created by an incompatible build.
    #[error(
        "expected schema version {expected} but found {found}; apply migrations before retrying"
    )]
    VersionMismatch {
        /// Version supported by this build.
        expected: i64,
        /// Version recorded in the database.
        found: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn connection() -> Connection {
        Connection::open_in_memory().expect("open in-memory database")
    }

    #[rstest]
    fn initialisation_is_idempotent(mut connection: Connection) {
        initialise_schema(&mut connection).expect("first initialisation");
        initialise_schema(&mut connection).expect("second initialisation");

        let versions: i64 = connection
            .query_row("SELECT COUNT(*) FROM jusho_schema_version", [], |row| {
                row.get(0)
            })
            .expect("count versions");
        assert_eq!(versions, 1);
    }

    #[rstest]
    fn rejects_foreign_schema_versions(mut connection: Connection) {
        initialise_schema(&mut connection).expect("initialise");
        connection
            .execute("UPDATE jusho_schema_version SET version = 7", [])
            .expect("tamper with version");

        let err = initialise_schema(&mut connection).expect_err("mismatch should fail");
        assert!(matches!(
            err,
            SchemaError::VersionMismatch {
                expected: SCHEMA_VERSION,
                found: 7
            }
        ));
    }

    #[rstest]
    fn full_address_is_generated(mut connection: Connection) {
        initialise_schema(&mut connection).expect("initialise");
        connection
            .execute(
                "INSERT INTO locations (prefecture, municipality, address_1, address_2, lat, lon)
                 VALUES ('東京都', '千代田区', '丸の内', NULL, 35.681236, 139.767125)",
                [],
            )
            .expect("insert location");
        let full: String = connection
            .query_row("SELECT full_address FROM locations", [], |row| row.get(0))
            .expect("read generated column");
        assert_eq!(full, "東京都千代田区丸の内");
    }

    #[rstest]
    fn coordinate_checks_reject_out_of_range_rows(mut connection: Connection) {
        initialise_schema(&mut connection).expect("initialise");
        let outcome = connection.execute(
            "INSERT INTO locations (prefecture, municipality, address_1, lat, lon)
             VALUES ('東京都', '千代田区', '丸の内', 95.0, 139.0)",
            [],
        );
        assert!(outcome.is_err(), "CHECK constraint should reject latitude 95");
    }
}
