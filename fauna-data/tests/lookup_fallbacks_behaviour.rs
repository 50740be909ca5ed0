//! Behavioural coverage for best-effort geocoding and the facts fallback.

use std::cell::RefCell;
use std::sync::Arc;

use fauna_core::AnimalFacts;
use fauna_data::test_support::StubTransport;
use fauna_data::{FactsConfig, FactsProvider, GeocodingConfig, GeocodingProvider};
use geo::Coord;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tokio::runtime::Builder;

fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build Tokio runtime")
        .block_on(future)
}

#[derive(Default)]
struct LookupWorld {
    transport: RefCell<Option<Arc<StubTransport>>>,
    point: RefCell<Option<Coord<f64>>>,
    facts: RefCell<Vec<AnimalFacts>>,
}

impl LookupWorld {
    fn transport(&self) -> Arc<StubTransport> {
        self.transport
            .borrow()
            .clone()
            .expect("a stub service must be configured")
    }

    fn look_up_facts(&self, name: &str) {
        let provider = FactsProvider::new(self.transport(), FactsConfig::new(Some("key".to_owned())));
        let facts = block_on(provider.lookup(name)).expect("facts lookup succeeds");
        self.facts.replace(facts);
    }
}

#[fixture]
fn world() -> LookupWorld {
    LookupWorld::default()
}

// --- Given steps ---

#[given("a geocoder without matches")]
fn empty_geocoder(world: &LookupWorld) {
    let transport = StubTransport::new().route("/search", r#"{"type": "FeatureCollection", "features": []}"#);
    world.transport.replace(Some(Arc::new(transport)));
}

#[given("a facts service knowing only leopards")]
fn leopard_facts(world: &LookupWorld) {
    let transport = StubTransport::new().route("name=", "[]").route(
        "name=leopard",
        r#"[
            {"name": "Leopard", "locations": ["Africa", "Asia"]},
            {"name": "Snow Leopard", "locations": ["Asia"]}
        ]"#,
    );
    world.transport.replace(Some(Arc::new(transport)));
}

// --- When steps ---

#[when("\"Atlantis\" is geocoded")]
fn geocode_atlantis(world: &LookupWorld) {
    let provider = GeocodingProvider::new(world.transport(), GeocodingConfig::default());
    world.point.replace(block_on(provider.geocode_single("Atlantis")));
}

#[when("facts for \"snow leopard\" are looked up")]
fn snow_leopard_facts(world: &LookupWorld) {
    world.look_up_facts("snow leopard");
}

#[when("facts for \"clouded leopard\" are looked up")]
fn clouded_leopard_facts(world: &LookupWorld) {
    world.look_up_facts("clouded leopard");
}

// --- Then steps ---

#[then("no coordinates are returned")]
fn no_coordinates(world: &LookupWorld) {
    assert!(world.point.borrow().is_none());
}

#[then("the facts service was queried twice")]
fn queried_twice(world: &LookupWorld) {
    let urls: Vec<String> = world
        .transport()
        .requests()
        .iter()
        .map(|request| request.url().to_string())
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://api.api-ninjas.com/v1/animals?name=snow+leopard",
            "https://api.api-ninjas.com/v1/animals?name=leopard",
        ]
    );
}

#[then("the facts name \"Snow Leopard\"")]
fn facts_name_snow_leopard(world: &LookupWorld) {
    let names: Vec<String> = world.facts.borrow().iter().map(|entry| entry.name.clone()).collect();
    assert_eq!(names, vec!["Snow Leopard"]);
}

#[then("2 fact entries are returned")]
fn two_entries(world: &LookupWorld) {
    assert_eq!(world.facts.borrow().len(), 2);
}

// --- Scenario registrations ---

macro_rules! register_scenario {
    ($fn_name:ident, $title:literal) => {
        #[scenario(path = "tests/features/lookup_fallbacks.feature", name = $title)]
        fn $fn_name(world: LookupWorld) {
            let _ = world;
        }
    };
}

register_scenario!(
    geocoding_without_results,
    "geocoding a place with no results yields nothing"
);
register_scenario!(
    facts_fall_back_to_last_word,
    "a multi-word animal name falls back to its last word"
);
register_scenario!(
    unfiltered_fallback_is_kept,
    "an unfiltered fallback is kept when nothing matches the full name"
);
