//! Behavioural tests for `Resolver` backed by the in-memory store.

use std::cell::RefCell;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use jusho_core::{
    ErrorClass, Location, LocationRecord, ResolveError, Resolver, test_support::MemoryStore,
};

#[derive(Debug)]
enum Outcome {
    Forward(Vec<Location>),
    Reverse(Option<Location>),
}

#[derive(Debug, Default)]
struct ResolutionWorld {
    store: RefCell<MemoryStore>,
    outcome: RefCell<Option<Result<Outcome, ResolveError>>>,
}

impl ResolutionWorld {
    fn geocode(&self, query: &str) {
        let store = self.store.borrow();
        let resolver = Resolver::new(&*store, &*store);
        let outcome = resolver.geocode(query).map(Outcome::Forward);
        self.outcome.replace(Some(outcome));
    }

    fn reverse(&self, latitude: f64, longitude: f64) {
        let store = self.store.borrow();
        let resolver = Resolver::new(&*store, &*store);
        let outcome = resolver
            .reverse_geocode(latitude, longitude)
            .map(Outcome::Reverse);
        self.outcome.replace(Some(outcome));
    }

    fn error_class(&self) -> ErrorClass {
        match self.outcome.borrow().as_ref() {
            Some(Err(err)) => err.class(),
            other => panic!("expected a resolution error, got {other:?}"),
        }
    }
}

#[fixture]
fn world() -> ResolutionWorld {
    ResolutionWorld::default()
}

fn tokyo_station() -> LocationRecord {
    LocationRecord::new("東京都", "千代田区", "丸の内", 35.681236, 139.767125)
        .expect("valid record")
}

#[given("a resolver over a store holding Tokyo Station")]
fn given_store(world: &ResolutionWorld) {
    world
        .store
        .replace(MemoryStore::with_records([tokyo_station()]));
}

#[given("a resolver over a failing store")]
fn given_failing_store(world: &ResolutionWorld) {
    world
        .store
        .replace(MemoryStore::with_records([tokyo_station()]).fail_queries());
}

#[when("I geocode an empty query")]
fn geocode_empty(world: &ResolutionWorld) {
    world.geocode("");
}

#[when("I geocode the text Marunouchi")]
fn geocode_marunouchi(world: &ResolutionWorld) {
    world.geocode("丸の内");
}

#[when("I reverse geocode latitude 95 and longitude 139")]
fn reverse_out_of_range(world: &ResolutionWorld) {
    world.reverse(95.0, 139.0);
}

#[when("I reverse geocode the coordinates of Tokyo Station")]
fn reverse_tokyo(world: &ResolutionWorld) {
    world.reverse(35.681236, 139.767125);
}

#[when("I reverse geocode the coordinates of Sapporo")]
fn reverse_sapporo(world: &ResolutionWorld) {
    world.reverse(43.0687, 141.3508);
}

#[then("the resolver rejects the request as a bad request")]
fn then_bad_request(world: &ResolutionWorld) {
    assert_eq!(world.error_class(), ErrorClass::BadRequest);
}

#[then("the resolver reports an internal error")]
fn then_internal(world: &ResolutionWorld) {
    assert_eq!(world.error_class(), ErrorClass::Internal);
}

#[then("the resolver returns the Tokyo Station record")]
fn then_tokyo(world: &ResolutionWorld) {
    let outcome = world.outcome.borrow();
    match outcome.as_ref() {
        Some(Ok(Outcome::Reverse(Some(location)))) => {
            assert_eq!(location.record, tokyo_station());
        }
        other => panic!("expected the Tokyo Station record, got {other:?}"),
    }
}

#[then("the resolver reports no match")]
fn then_no_match(world: &ResolutionWorld) {
    let outcome = world.outcome.borrow();
    assert!(
        matches!(outcome.as_ref(), Some(Ok(Outcome::Reverse(None)))),
        "expected a no-match outcome, got {outcome:?}"
    );
}

#[scenario(path = "tests/features/resolution.feature", index = 0)]
fn empty_query(world: ResolutionWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/resolution.feature", index = 1)]
fn out_of_range_latitude(world: ResolutionWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/resolution.feature", index = 2)]
fn reverse_round_trip(world: ResolutionWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/resolution.feature", index = 3)]
fn reverse_no_match(world: ResolutionWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/resolution.feature", index = 4)]
fn upstream_failure(world: ResolutionWorld) {
    let _ = world;
}
