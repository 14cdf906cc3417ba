//! Property-based tests for the parse → insert → query round trip.
//!
//! # Invariants tested
//!
//! - **Field fidelity:** every well-formed row reads back from the store with
//!   the same address text and coordinates.
//! - **Nearest self-match:** reverse geocoding a stored coordinate returns a
//!   location at exactly that coordinate.

use geo::Coord;
use jusho_core::{NearestSearch, ReferenceStore, SqliteLocationIndex, TextSearch};
use jusho_data::{SqliteReferenceStore, parse_location_file};
use proptest::prelude::*;

mod support;

use support::{InputDir, location_row};

fn address_text() -> impl Strategy<Value = String> {
    "[あ-ん一-龥]{1,8}"
}

fn row_strategy() -> impl Strategy<Value = (String, String, String, f64, f64)> {
    (
        address_text(),
        address_text(),
        address_text(),
        -90.0_f64..=90.0,
        -180.0_f64..=180.0,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: parsed rows survive insertion and query unchanged.
    #[test]
    fn rows_round_trip_through_the_store(rows in prop::collection::vec(row_strategy(), 1..6)) {
        let inputs = InputDir::new();
        let lines: Vec<String> = rows
            .iter()
            .map(|(pref, muni, addr, lat, lon)| location_row(pref, muni, addr, *lat, *lon))
            .collect();
        let path = inputs.write_rows("input.csv", &lines);

        let records = parse_location_file(&path).expect("parse generated file");
        prop_assert_eq!(records.len(), rows.len());
        for (record, (pref, muni, addr, lat, lon)) in records.iter().zip(&rows) {
            prop_assert_eq!(&record.prefecture, pref);
            prop_assert_eq!(&record.municipality, muni);
            prop_assert_eq!(&record.address_1, addr);
            prop_assert_eq!(record.latitude, *lat);
            prop_assert_eq!(record.longitude, *lon);
        }

        let database = inputs.root().join("jusho.db");
        let mut store = SqliteReferenceStore::open(&database).expect("open store");
        let inserted = store.bulk_insert(&records).expect("insert records");
        prop_assert_eq!(inserted, records.len() as u64);
        drop(store);

        let index = SqliteLocationIndex::open(&database).expect("open index");
        for record in &records {
            let found = index
                .search_by_text(&record.full_address(), records.len())
                .expect("text search");
            prop_assert!(found.iter().any(|location| &location.record == record));

            let origin = Coord { x: record.longitude, y: record.latitude };
            let nearest = index
                .find_nearest(origin, 1.0)
                .expect("nearest search")
                .expect("a stored location at the origin");
            prop_assert_eq!(nearest.record.latitude, record.latitude);
            prop_assert_eq!(nearest.record.longitude, record.longitude);
        }
    }
}
