//! The `history` command: recent records persisted for one source.

use std::io::Write;
use camino::Utf8PathBuf;
use clap::Parser;
use fauna_core::{DataSource, PayloadKind, RecordQuery, RecordStatus};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, ARG_KIND, ARG_LIMIT, ARG_SOURCE, ARG_STATUS, CliError, ENV_HISTORY_SOURCE,
    database_or_default, open_store, write_json,
};

const DEFAULT_HISTORY_LIMIT: usize = 20;

/// CLI arguments for the `history` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Print the newest records stored for a source \
                 (image-recognition, facts, geocoding or bird-observations), \
                 optionally restricted to one status or payload kind.",
    about = "Show recent records persisted for a source"
)]
#[ortho_config(prefix = "FAUNA")]
pub(crate) struct HistoryArgs {
    /// Data source whose records are listed.
    #[arg(value_name = ARG_SOURCE)]
    #[serde(default)]
    pub(crate) source: Option<String>,
    /// Only records with this status (success or failed).
    #[arg(long = ARG_STATUS, value_name = "status")]
    #[serde(default)]
    pub(crate) status: Option<String>,
    /// Only records with this payload kind (raw or normalized).
    #[arg(long = ARG_KIND, value_name = "kind")]
    #[serde(default)]
    pub(crate) kind: Option<String>,
    /// Maximum number of records printed.
    #[arg(long = ARG_LIMIT, value_name = "count")]
    #[serde(default)]
    pub(crate) limit: Option<usize>,
    /// SQLite database holding persisted records.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
}

impl HistoryArgs {
    pub(crate) fn into_config(self) -> Result<HistoryConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        HistoryConfig::try_from(merged)
    }
}

/// Resolved `history` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HistoryConfig {
    pub(crate) query: RecordQuery,
    pub(crate) database: Utf8PathBuf,
}

impl TryFrom<HistoryArgs> for HistoryConfig {
    type Error = CliError;

    fn try_from(args: HistoryArgs) -> Result<Self, Self::Error> {
        let source: DataSource = args
            .source
            .ok_or(CliError::MissingArgument {
                field: ARG_SOURCE,
                env: ENV_HISTORY_SOURCE,
            })?
            .parse()?;

        let mut query =
            RecordQuery::new(source).limit(args.limit.unwrap_or(DEFAULT_HISTORY_LIMIT));
        if let Some(value) = args.status {
            let status = RecordStatus::parse(value.trim())
                .ok_or(CliError::UnknownStatus { value })?;
            query = query.status(status);
        }
        if let Some(value) = args.kind {
            let kind =
                PayloadKind::parse(value.trim()).ok_or(CliError::UnknownPayloadKind { value })?;
            query = query.payload_kind(kind);
        }
        Ok(Self {
            query,
            database: database_or_default(args.database),
        })
    }
}

pub(crate) fn run_history(config: &HistoryConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    let store = open_store(&config.database)?;
    let records = store.find(&config.query).map_err(CliError::ReadRecords)?;
    log::info!(
        "found {} {} records in {}",
        records.len(),
        config.query.source,
        config.database
    );
    write_json(writer, &records)
}
