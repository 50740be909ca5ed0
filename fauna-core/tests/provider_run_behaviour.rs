//! Behavioural coverage for the provider run lifecycle against SQLite.

use std::cell::RefCell;

use fauna_core::test_support::StubProvider;
use fauna_core::{
    PayloadKind, Provider, RecordQuery, RecordStatus, RecordStore, RunSummary,
    SqliteRecordStore, TransportError, run_provider,
};
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

#[fixture]
fn provider() -> RefCell<Option<StubProvider>> {
    RefCell::new(None)
}

#[fixture]
fn store() -> RefCell<Option<SqliteRecordStore>> {
    RefCell::new(None)
}

#[fixture]
fn summary() -> RefCell<Option<RunSummary>> {
    RefCell::new(None)
}

fn stored_records(store: &RefCell<Option<SqliteRecordStore>>) -> Vec<fauna_core::Record> {
    let guard = store.borrow();
    let store = guard.as_ref().expect("store must be initialised");
    store
        .find(&RecordQuery::new(fauna_core::DataSource::Facts))
        .expect("query records")
}

// --- Given steps ---

#[given("a provider returning two items")]
fn provider_with_items(#[from(provider)] provider: &RefCell<Option<StubProvider>>) {
    *provider.borrow_mut() = Some(StubProvider::with_items(vec![
        "cheetah".to_owned(),
        "king cheetah".to_owned(),
    ]));
}

#[given("a provider failing with a network error")]
fn provider_with_error(#[from(provider)] provider: &RefCell<Option<StubProvider>>) {
    *provider.borrow_mut() = Some(StubProvider::with_error(TransportError::Network {
        url: "https://api.example.test/v1/animals".to_owned(),
        message: "connection refused".to_owned(),
    }));
}

#[given("a SQLite record store")]
fn sqlite_store(#[from(store)] store: &RefCell<Option<SqliteRecordStore>>) {
    *store.borrow_mut() = Some(SqliteRecordStore::open_in_memory().expect("open store"));
}

// --- When steps ---

#[when("the provider runs")]
fn provider_runs(
    #[from(provider)] provider: &RefCell<Option<StubProvider>>,
    #[from(store)] store: &RefCell<Option<SqliteRecordStore>>,
    #[from(summary)] summary: &RefCell<Option<RunSummary>>,
) {
    let provider_guard = provider.borrow();
    let stub = provider_guard.as_ref().expect("provider must be initialised");
    let store_guard = store.borrow();
    let records = store_guard.as_ref().expect("store must be initialised");
    *summary.borrow_mut() = Some(block_on(run_provider(stub, "cheetah", records)));
}

// --- Then steps ---

#[then("the run reports 2 items")]
fn run_reports_items(#[from(summary)] summary: &RefCell<Option<RunSummary>>) {
    assert_eq!(
        summary.borrow().as_ref(),
        Some(&RunSummary::Success { item_count: 2 })
    );
}

#[then("the run reports a failure mentioning \"connection refused\"")]
fn run_reports_failure(#[from(summary)] summary: &RefCell<Option<RunSummary>>) {
    let borrowed = summary.borrow();
    match borrowed.as_ref() {
        Some(RunSummary::Failed { error }) => assert!(error.contains("connection refused")),
        other => panic!("expected a failed summary, got {other:?}"),
    }
}

#[then("the store holds a raw record and a normalized record")]
fn store_holds_both_forms(#[from(store)] store: &RefCell<Option<SqliteRecordStore>>) {
    let records = stored_records(store);
    assert_eq!(records.len(), 2, "expected two records, got {records:?}");
    let normalized = records
        .iter()
        .find(|record| record.payload_kind() == Some(PayloadKind::Normalized))
        .expect("normalized record");
    assert_eq!(
        normalized.payload,
        Some(serde_json::json!(["CHEETAH", "KING CHEETAH"]))
    );
    assert!(
        records
            .iter()
            .any(|record| record.payload_kind() == Some(PayloadKind::Raw))
    );
    assert!(records.iter().all(|record| record.status == RecordStatus::Success));
}

#[then("the store holds one failed record without payload")]
fn store_holds_failure(#[from(store)] store: &RefCell<Option<SqliteRecordStore>>) {
    let records = stored_records(store);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RecordStatus::Failed);
    assert!(records[0].payload.is_none());
    assert!(records[0].error_message.is_some());
}

#[then("the store holds 4 records for the provider")]
fn store_holds_history(
    #[from(provider)] provider: &RefCell<Option<StubProvider>>,
    #[from(store)] store: &RefCell<Option<SqliteRecordStore>>,
) {
    let guard = provider.borrow();
    let stub = guard.as_ref().expect("provider must be initialised");
    assert_eq!(stub.fetch_count(), 2);
    assert_eq!(stub.source(), fauna_core::DataSource::Facts);
    assert_eq!(stored_records(store).len(), 4);
}

// --- Scenario registrations ---

macro_rules! register_scenario {
    ($fn_name:ident, $title:literal) => {
        #[scenario(path = "tests/features/provider_run.feature", name = $title)]
        fn $fn_name(
            provider: RefCell<Option<StubProvider>>,
            store: RefCell<Option<SqliteRecordStore>>,
            summary: RefCell<Option<RunSummary>>,
        ) {
            let _ = (provider, store, summary);
        }
    };
}

register_scenario!(
    successful_run_stores_both_forms,
    "a successful run stores raw and normalized records"
);
register_scenario!(
    failed_run_stores_failure,
    "a failed run stores a single failed record"
);
register_scenario!(
    repeated_runs_accumulate,
    "repeated runs accumulate history"
);
