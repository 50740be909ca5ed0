//! Test helpers for driving CLI commands against stubbed upstream services.

use super::*;
use camino::{Utf8Path, Utf8PathBuf};
use fauna_data::test_support::{StubTransport, ebird_body, sighting};
use serde_json::Value;
use tempfile::TempDir;

pub(super) const TAXONOMY_ROUTE: &str = "/ref/taxonomy";

pub(super) const TAXONOMY: &str = r#"[
    {"comName": "Eurasian Wren", "sciName": "Troglodytes troglodytes", "speciesCode": "winwre4"},
    {"comName": "Rufous-backed Robin", "sciName": "Turdus rufopalliatus", "speciesCode": "rubrob"},
    {"comName": "American Robin", "sciName": "Turdus migratorius", "speciesCode": "amerob"}
]"#;

pub(super) fn block_on<F>(future: F) -> F::Output
where
    F: std::future::Future,
{
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build Tokio runtime")
        .block_on(future)
}

/// Upstream answering robin queries with one sighting shared between codes.
pub(super) fn robin_transport() -> StubTransport {
    with_robin_sightings(StubTransport::new().route(TAXONOMY_ROUTE, TAXONOMY))
}

/// Add robin sightings for both taxonomy codes to `transport`.
pub(super) fn with_robin_sightings(transport: StubTransport) -> StubTransport {
    transport
        .route(
            "/recent/amerob",
            ebird_body(&[
                sighting("OBS-A", "American Robin"),
                sighting("OBS-B", "American Robin"),
            ]),
        )
        .route(
            "/recent/rubrob",
            ebird_body(&[
                sighting("OBS-B", "American Robin"),
                sighting("OBS-C", "Rufous-backed Robin"),
            ]),
        )
}

/// A throwaway record database.
pub(super) struct Database {
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl Database {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("records.db"))
            .expect("utf-8 database path");
        Self { _dir: dir, path }
    }

    pub(super) fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub(super) fn arg(&self) -> String {
        self.path.to_string()
    }
}

/// Outcome and captured stdout of one CLI invocation.
#[derive(Debug)]
pub(super) struct Invocation {
    pub(super) result: Result<(), CliError>,
    pub(super) output: String,
}

impl Invocation {
    pub(super) fn json(&self) -> Value {
        if let Err(err) = &self.result {
            panic!("command failed: {err}");
        }
        serde_json::from_str(&self.output).expect("command prints JSON")
    }

    pub(super) fn items(&self) -> Vec<Value> {
        match self.json() {
            Value::Array(items) => items,
            other => panic!("expected a JSON array, found {other}"),
        }
    }
}

/// Parse `args` as `fauna <args>` and run the command against `transport`.
pub(super) fn invoke(args: &[&str], transport: Arc<StubTransport>) -> Invocation {
    let argv = std::iter::once("fauna").chain(args.iter().copied());
    let mut output = Vec::new();
    let result = Cli::try_parse_from(argv)
        .map_err(CliError::ArgumentParsing)
        .and_then(|cli| block_on(run_command(cli.command, transport, &mut output)));
    Invocation {
        result,
        output: String::from_utf8(output).expect("utf-8 output"),
    }
}
