//! Test-only, in-memory store implementations used by unit and behaviour
//! tests across the workspace.

use std::{collections::BTreeMap, fmt};

use geo::{Coord, Distance, Haversine, Point};

use crate::{
    Location, LocationRecord, NearestSearch, ReferenceStore, StoreError, TextSearch,
    store::search_terms,
};

type InsertPredicate = Box<dyn Fn(&[LocationRecord]) -> bool + Send + Sync>;

/// In-memory store implementing every store capability.
///
/// Searches perform a linear scan and are intended only for small datasets.
/// Ranking mirrors the SQLite index: more matched terms first, then shorter
/// address text, then lower identifiers. Failures can be injected per
/// operation to exercise error handling.
#[derive(Default)]
pub struct MemoryStore {
    rows: Vec<Location>,
    ledger: BTreeMap<String, u64>,
    insert_calls: usize,
    fail_insert_when: Option<InsertPredicate>,
    cancel_insert_when: Option<InsertPredicate>,
    fail_ledger_writes: bool,
    fail_lookups: bool,
    fail_queries: bool,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("rows", &self.rows.len())
            .field("ledger", &self.ledger)
            .field("insert_calls", &self.insert_calls)
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Create a store pre-populated with `records`, numbered from 1.
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = LocationRecord>,
    {
        let mut store = Self::default();
        for record in records {
            store.push(record);
        }
        store
    }

    /// Fail any bulk insert whose batch satisfies `predicate`.
    #[must_use]
    pub fn fail_insert_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[LocationRecord]) -> bool + Send + Sync + 'static,
    {
        self.fail_insert_when = Some(Box::new(predicate));
        self
    }

    /// Report any bulk insert whose batch satisfies `predicate` as cancelled,
    /// leaving no rows behind.
    #[must_use]
    pub fn cancel_insert_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[LocationRecord]) -> bool + Send + Sync + 'static,
    {
        self.cancel_insert_when = Some(Box::new(predicate));
        self
    }

    /// Fail every ledger write.
    #[must_use]
    pub fn fail_ledger_writes(mut self) -> Self {
        self.fail_ledger_writes = true;
        self
    }

    /// Fail every ledger lookup.
    #[must_use]
    pub fn fail_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    /// Fail every text and nearest query.
    #[must_use]
    pub fn fail_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    /// Stored rows in insertion order.
    pub fn rows(&self) -> &[Location] {
        &self.rows
    }

    /// Ledger entries keyed by file identifier.
    pub fn ledger(&self) -> &BTreeMap<String, u64> {
        &self.ledger
    }

    /// Number of bulk insert attempts, including failed ones.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls
    }

    fn push(&mut self, record: LocationRecord) {
        let id = self.rows.len() as u64 + 1;
        self.rows.push(Location::new(id, record));
    }

    fn check_queries(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.fail_queries {
            return Err(injected(operation));
        }
        Ok(())
    }
}

fn injected(operation: &'static str) -> StoreError {
    StoreError::backend(operation, std::io::Error::other("injected failure"))
}

impl ReferenceStore for MemoryStore {
    fn bulk_insert(&mut self, records: &[LocationRecord]) -> Result<u64, StoreError> {
        self.insert_calls += 1;
        if self
            .fail_insert_when
            .as_ref()
            .is_some_and(|predicate| predicate(records))
        {
            return Err(injected("insert locations"));
        }
        if self
            .cancel_insert_when
            .as_ref()
            .is_some_and(|predicate| predicate(records))
        {
            return Err(StoreError::Cancelled {
                operation: "insert locations",
            });
        }
        for record in records {
            self.push(record.clone());
        }
        Ok(records.len() as u64)
    }

    fn is_file_processed(&self, file_id: &str) -> Result<bool, StoreError> {
        if self.fail_lookups {
            return Err(injected("look up processed file"));
        }
        Ok(self.ledger.contains_key(file_id))
    }

    fn mark_file_processed(&mut self, file_id: &str, record_count: u64) -> Result<(), StoreError> {
        if self.fail_ledger_writes {
            return Err(injected("mark file processed"));
        }
        self.ledger
            .entry(file_id.to_owned())
            .or_insert(record_count);
        Ok(())
    }

    fn count_rows(&self) -> Result<u64, StoreError> {
        Ok(self.rows.len() as u64)
    }

    fn sample_row(&self) -> Result<Option<Location>, StoreError> {
        Ok(self.rows.first().cloned())
    }
}

impl TextSearch for MemoryStore {
    fn search_by_text(&self, query: &str, limit: usize) -> Result<Vec<Location>, StoreError> {
        self.check_queries("search locations by text")?;
        let terms = search_terms(query);
        let mut scored: Vec<(usize, usize, &Location)> = self
            .rows
            .iter()
            .filter_map(|location| {
                let text = location.record.full_address();
                let score = terms.iter().filter(|term| text.contains(**term)).count();
                (score > 0).then(|| (score, text.chars().count(), location))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.id.cmp(&b.2.id))
        });
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, _, location)| location.clone())
            .collect())
    }
}

impl NearestSearch for MemoryStore {
    fn find_nearest(
        &self,
        origin: Coord<f64>,
        radius_m: f64,
    ) -> Result<Option<Location>, StoreError> {
        self.check_queries("find nearest location")?;
        let centre = Point::from(origin);
        Ok(self
            .rows
            .iter()
            .map(|location| {
                let distance = Haversine.distance(centre, Point::from(location.record.coord()));
                (distance, location)
            })
            .filter(|(distance, _)| *distance <= radius_m)
            .min_by(|(da, a), (db, b)| da.total_cmp(db).then(a.id.cmp(&b.id)))
            .map(|(_, location)| location.clone()))
    }
}

/// Write `records` to a fresh SQLite reference store at `path`.
#[cfg(feature = "store-sqlite")]
pub fn write_sqlite_locations(
    path: &std::path::Path,
    records: &[LocationRecord],
) -> Result<(), crate::store::BoxError> {
    let mut connection = rusqlite::Connection::open(path)?;
    crate::store::initialise_schema(&mut connection)?;
    let transaction = connection.transaction()?;
    {
        let mut statement = transaction.prepare(
            "INSERT INTO locations
                (prefecture, municipality, address_1, address_2, block_lot, lat, lon)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for record in records {
            statement.execute(rusqlite::params![
                record.prefecture,
                record.municipality,
                record.address_1,
                record.address_2,
                record.block_lot,
                record.latitude,
                record.longitude,
            ])?;
        }
    }
    transaction.commit()?;
    Ok(())
}
