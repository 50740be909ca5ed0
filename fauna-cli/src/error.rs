//! Error types emitted by the fauna CLI.
//!
//! Keep this error type reasonably small, as every command returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;

use fauna_core::{ParseDataSourceError, ProviderError, StoreError};
use fauna_data::http::ClientBuildError;
use thiserror::Error;

/// Errors emitted by the fauna CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A region name matched no known country.
    #[error("unknown region {name:?}; use a country name, a two-letter code or \"world\"")]
    UnknownRegion { name: String },
    /// A data source name matched no provider.
    #[error(transparent)]
    UnknownSource(#[from] ParseDataSourceError),
    /// A `--status` filter was neither `success` nor `failed`.
    #[error("unknown record status {value:?}; expected \"success\" or \"failed\"")]
    UnknownStatus { value: String },
    /// A `--kind` filter was neither `raw` nor `normalized`.
    #[error("unknown payload kind {value:?}; expected \"raw\" or \"normalized\"")]
    UnknownPayloadKind { value: String },
    /// Building the HTTP client failed.
    #[error(transparent)]
    BuildClient(#[from] ClientBuildError),
    /// Starting the async runtime failed.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Opening the record database failed.
    #[error("failed to open record database at {path}: {source}")]
    OpenStore {
        path: Utf8PathBuf,
        #[source]
        source: StoreError,
    },
    /// Reading records back from the store failed.
    #[error("failed to read records: {0}")]
    ReadRecords(#[source] StoreError),
    /// Reading the image to identify failed.
    #[error("failed to read image at {path}: {source}")]
    ReadImage {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// An upstream provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
