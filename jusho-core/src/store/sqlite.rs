//! SQLite-backed read index for address resolution.

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use geo::{Coord, Distance, Haversine, Point};
use rstar::{AABB, RTree, primitives::GeomWithData};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params_from_iter, types::Type};
use thiserror::Error;

use crate::{Location, LocationRecord};

use super::{NearestSearch, StoreError, TextSearch, search_terms};

/// Columns selected when materialising a [`Location`] with [`read_location`].
pub const LOCATION_COLUMNS: &str =
    "id, prefecture, municipality, address_1, address_2, block_lot, lat, lon";

/// Mean length of one degree of latitude in metres.
const METRES_PER_DEGREE: f64 = 111_195.08;

/// Widening applied to the candidate envelope so the great-circle filter
/// never misses a point the rectangle approximation cut off.
const ENVELOPE_MARGIN: f64 = 1.05;

/// Upper bound on query terms bound into one search statement.
const MAX_SEARCH_TERMS: usize = 16;

type IndexedPoint = GeomWithData<[f64; 2], u64>;

/// Error raised when opening the SQLite read index.
#[derive(Debug, Error)]
pub enum SqliteLocationIndexError {
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Loading coordinates into the in-memory R\*-tree failed.
    #[error("failed to load location coordinates: {0}")]
    LoadIndex(#[source] rusqlite::Error),
}

/// Read-only resolution index over a reference store database.
///
/// Text queries run against SQLite directly. Coordinates are loaded into an
/// R\*-tree when the index is opened, so rows imported afterwards are only
/// visible to nearest-point queries once the index is reopened.
pub struct SqliteLocationIndex {
    connection: Mutex<Connection>,
    points: RTree<IndexedPoint>,
}

impl fmt::Debug for SqliteLocationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteLocationIndex")
            .field("points", &self.points.size())
            .finish_non_exhaustive()
    }
}

impl SqliteLocationIndex {
    /// Open the database at `path` read-only and index its coordinates.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SqliteLocationIndexError> {
        let path = path.as_ref();
        let connection = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|source| SqliteLocationIndexError::OpenDatabase {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_connection(connection)
    }

    /// Build an index over an already-open connection.
    pub fn from_connection(connection: Connection) -> Result<Self, SqliteLocationIndexError> {
        let entries = load_points(&connection).map_err(SqliteLocationIndexError::LoadIndex)?;
        Ok(Self {
            connection: Mutex::new(connection),
            points: RTree::bulk_load(entries),
        })
    }

    /// Number of indexed coordinates.
    pub fn len(&self) -> usize {
        self.points.size()
    }

    /// Whether the index holds no coordinates.
    pub fn is_empty(&self) -> bool {
        self.points.size() == 0
    }

    fn lock(&self, operation: &'static str) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection.lock().map_err(|_| {
            StoreError::backend(
                operation,
                std::io::Error::other("connection lock poisoned"),
            )
        })
    }

    fn load_location(&self, id: u64) -> Result<Option<Location>, StoreError> {
        const OPERATION: &str = "load nearest location";
        let connection = self.lock(OPERATION)?;
        let sql = format!("SELECT {LOCATION_COLUMNS} FROM locations WHERE id = ?1");
        let mut statement = connection
            .prepare_cached(&sql)
            .map_err(|source| StoreError::backend(OPERATION, source))?;
        statement
            .query_row([id], read_location)
            .optional()
            .map_err(|source| StoreError::backend(OPERATION, source))
    }
}

impl TextSearch for SqliteLocationIndex {
    fn search_by_text(&self, query: &str, limit: usize) -> Result<Vec<Location>, StoreError> {
        const OPERATION: &str = "search locations by text";
        let mut terms = search_terms(query);
        terms.truncate(MAX_SEARCH_TERMS);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let sql = text_search_sql(terms.len(), limit);
        let connection = self.lock(OPERATION)?;
        let mut statement = connection
            .prepare(&sql)
            .map_err(|source| StoreError::backend(OPERATION, source))?;
        let rows = statement
            .query_map(params_from_iter(terms.iter()), read_location)
            .map_err(|source| StoreError::backend(OPERATION, source))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|source| StoreError::backend(OPERATION, source))
    }
}

impl NearestSearch for SqliteLocationIndex {
    fn find_nearest(
        &self,
        origin: Coord<f64>,
        radius_m: f64,
    ) -> Result<Option<Location>, StoreError> {
        if !(radius_m.is_finite() && radius_m >= 0.0) {
            return Ok(None);
        }

        let envelopes = search_envelopes(origin, radius_m);
        let centre = Point::from(origin);
        let nearest = envelopes
            .iter()
            .flat_map(|envelope| self.points.locate_in_envelope(envelope))
            .map(|entry| {
                let [lon, lat] = *entry.geom();
                (Haversine.distance(centre, Point::new(lon, lat)), entry.data)
            })
            .filter(|(distance, _)| *distance <= radius_m)
            .min_by(|(da, ia), (db, ib)| da.total_cmp(db).then(ia.cmp(ib)));

        match nearest {
            Some((_, id)) => self.load_location(id),
            None => Ok(None),
        }
    }
}

/// Materialise a [`Location`] from a row selected with [`LOCATION_COLUMNS`].
pub fn read_location(row: &Row<'_>) -> rusqlite::Result<Location> {
    let id: u64 = row.get(0)?;
    let latitude: f64 = row.get(6)?;
    let longitude: f64 = row.get(7)?;
    let mut record = LocationRecord::new(
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
        latitude,
        longitude,
    )
    .map_err(|err| rusqlite::Error::FromSqlConversionFailure(6, Type::Real, Box::new(err)))?;
    record.address_2 = row.get(4)?;
    record.block_lot = row.get(5)?;
    Ok(Location::new(id, record))
}

fn load_points(connection: &Connection) -> rusqlite::Result<Vec<IndexedPoint>> {
    let mut statement = connection.prepare("SELECT id, lon, lat FROM locations")?;
    let rows = statement.query_map([], |row| {
        let id: u64 = row.get(0)?;
        let lon: f64 = row.get(1)?;
        let lat: f64 = row.get(2)?;
        Ok(GeomWithData::new([lon, lat], id))
    })?;
    rows.collect()
}

fn text_search_sql(term_count: usize, limit: usize) -> String {
    let score = (1..=term_count)
        .map(|n| format!("(instr(full_address, ?{n}) > 0)"))
        .collect::<Vec<_>>()
        .join(" + ");
    format!(
        "SELECT {LOCATION_COLUMNS} FROM (
            SELECT {LOCATION_COLUMNS}, full_address, {score} AS score FROM locations
        )
        WHERE score > 0
        ORDER BY score DESC, length(full_address) ASC, id ASC
        LIMIT {limit}"
    )
}

/// Bounding boxes covering `radius_m` around `origin`.
///
/// A box that crosses the antimeridian is paired with a copy shifted by 360°
/// so points stored on the far side are still candidates.
fn search_envelopes(origin: Coord<f64>, radius_m: f64) -> Vec<AABB<[f64; 2]>> {
    let lat_span = radius_m / METRES_PER_DEGREE * ENVELOPE_MARGIN;
    let cos_lat = origin.y.to_radians().cos().abs().max(1e-6);
    let lon_span = (radius_m / (METRES_PER_DEGREE * cos_lat) * ENVELOPE_MARGIN).min(360.0);
    let (west, east) = (origin.x - lon_span, origin.x + lon_span);
    let (south, north) = (origin.y - lat_span, origin.y + lat_span);

    let mut envelopes = vec![AABB::from_corners([west, south], [east, north])];
    if west < -180.0 {
        envelopes.push(AABB::from_corners([west + 360.0, south], [180.0, north]));
    }
    if east > 180.0 {
        envelopes.push(AABB::from_corners([-180.0, south], [east - 360.0, north]));
    }
    envelopes
}
