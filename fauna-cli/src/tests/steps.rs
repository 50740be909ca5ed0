//! Behaviour-driven step definitions driving the observations command.

use super::helpers::{
    Database, Invocation, TAXONOMY, TAXONOMY_ROUTE, invoke, robin_transport, with_robin_sightings,
};
use super::*;
use fauna_data::test_support::StubTransport;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;

/// Scenario state shared by every observations step.
struct ObservationsWorld {
    database: Database,
    transport: RefCell<StubTransport>,
    sent: RefCell<Option<Arc<StubTransport>>>,
    invocation: RefCell<Option<Invocation>>,
}

impl ObservationsWorld {
    fn new() -> Self {
        Self {
            database: Database::new(),
            transport: RefCell::new(StubTransport::new()),
            sent: RefCell::new(None),
            invocation: RefCell::new(None),
        }
    }

    fn run(&self, args: &[&str]) {
        let transport = Arc::new(self.transport.take());
        let database = self.database.arg();
        let argv: Vec<&str> = args
            .iter()
            .copied()
            .chain(["--database", database.as_str()])
            .collect();
        let invocation = invoke(&argv, Arc::clone(&transport));
        self.sent.replace(Some(transport));
        self.invocation.replace(Some(invocation));
    }

    fn observation_count(&self) -> usize {
        self.invocation
            .borrow()
            .as_ref()
            .expect("command ran")
            .items()
            .len()
    }
}

#[fixture]
fn world() -> ObservationsWorld {
    ObservationsWorld::new()
}

// --- Given steps ---

#[given("a taxonomy listing two robin species")]
fn robin_taxonomy(#[from(world)] world: &ObservationsWorld) {
    let transport = world.transport.take();
    world
        .transport
        .replace(transport.route(TAXONOMY_ROUTE, TAXONOMY));
}

#[given("the United States reports overlapping robin sightings")]
fn overlapping_sightings(#[from(world)] world: &ObservationsWorld) {
    let transport = world.transport.take();
    world.transport.replace(with_robin_sightings(transport));
}

#[given("robin sightings were already collected")]
fn robins_collected(#[from(world)] world: &ObservationsWorld) {
    world.transport.replace(robin_transport());
    world.run(&[
        "observations",
        "--region",
        "US",
        "--species",
        "robin",
        "--ebird-api-key",
        "test-key",
    ]);
    assert_eq!(world.observation_count(), 3, "seeding run should store three sightings");
}

// --- When steps ---

#[when("I run the observations command for robins in the USA")]
fn observe_robins_in_usa(#[from(world)] world: &ObservationsWorld) {
    world.run(&[
        "observations",
        "--region",
        "usa",
        "--species",
        "Robin",
        "--ebird-api-key",
        "test-key",
    ]);
}

#[when("I ask for stored robin observations")]
fn stored_robins(#[from(world)] world: &ObservationsWorld) {
    world.run(&[
        "observations",
        "--species",
        "robin",
        "--ebird-api-key",
        "test-key",
    ]);
}

#[when("I run the observations command for robins in Narnia")]
fn observe_robins_in_narnia(#[from(world)] world: &ObservationsWorld) {
    world.run(&[
        "observations",
        "--region",
        "Narnia",
        "--species",
        "robin",
        "--ebird-api-key",
        "test-key",
    ]);
}

#[when("I run the observations command with a blank eBird key")]
fn observe_without_key(#[from(world)] world: &ObservationsWorld) {
    world.run(&["observations", "--region", "US", "--ebird-api-key", ""]);
}

// --- Then steps ---

#[then("the command succeeds")]
fn command_succeeds(#[from(world)] world: &ObservationsWorld) {
    let borrowed = world.invocation.borrow();
    let invocation = borrowed.as_ref().expect("command ran");
    if let Err(err) = &invocation.result {
        panic!("expected success, found {err}");
    }
}

#[then("3 observations are printed")]
fn three_printed(#[from(world)] world: &ObservationsWorld) {
    assert_eq!(world.observation_count(), 3);
}

#[then("the record history holds a raw and a normalized payload")]
fn history_holds_both_kinds(#[from(world)] world: &ObservationsWorld) {
    let history = invoke(
        &[
            "history",
            "bird-observations",
            "--database",
            &world.database.arg(),
        ],
        Arc::new(StubTransport::new()),
    );
    let kinds: Vec<String> = history
        .items()
        .iter()
        .filter_map(|record| record["tags"]["payload-kind"].as_str().map(str::to_owned))
        .collect();
    assert_eq!(kinds, vec!["normalized", "raw"]);
}

#[then("no request reached the observation service")]
fn nothing_sent(#[from(world)] world: &ObservationsWorld) {
    let sent = world.sent.borrow();
    let transport = sent.as_ref().expect("command ran");
    assert!(transport.requests().is_empty());
}

#[then("the command fails naming the region \"Narnia\"")]
fn fails_on_region(#[from(world)] world: &ObservationsWorld) {
    let borrowed = world.invocation.borrow();
    match &borrowed.as_ref().expect("command ran").result {
        Err(CliError::UnknownRegion { name }) => assert_eq!(name, "Narnia"),
        other => panic!("expected UnknownRegion, found {other:?}"),
    }
}

#[then("the command reports that the \"ebird-api-key\" flag is missing")]
fn reports_missing_key(#[from(world)] world: &ObservationsWorld) {
    let borrowed = world.invocation.borrow();
    match &borrowed.as_ref().expect("command ran").result {
        Err(CliError::MissingArgument { field, env }) => {
            assert_eq!(*field, ARG_EBIRD_API_KEY);
            assert_eq!(*env, ENV_EBIRD_API_KEY);
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

// --- Scenario registrations ---

macro_rules! register_observations_scenario {
    ($fn_name:ident, $scenario_title:literal) => {
        #[scenario(path = "tests/features/observations_command.feature", name = $scenario_title)]
        fn $fn_name(#[from(world)] world: ObservationsWorld) {
            let _ = world;
        }
    };
}

register_observations_scenario!(
    aggregating_robins_in_one_country,
    "aggregating robins in one country prints deduplicated sightings"
);
register_observations_scenario!(
    stored_observations_skip_the_service,
    "stored observations are served without contacting the service"
);
register_observations_scenario!(unknown_region_is_rejected, "an unknown region is rejected");
register_observations_scenario!(
    observations_need_an_ebird_key,
    "the observations command needs an eBird key"
);
