//! Import command implementation for the Jusho CLI.

use std::{io::Write, time::Duration};

use camino::Utf8PathBuf;
use clap::Parser;
use jusho_core::CancellationToken;
use jusho_data::{Importer, SqliteReferenceStore};
use log::warn;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, ARG_IMPORT_DIRECTORY, ARG_IMPORT_FILE, ARG_IMPORT_TIMEOUT, CliError,
    DEFAULT_DATABASE, ENV_IMPORT_DIRECTORY, ENV_IMPORT_FILE, require_directory, require_file,
    write_line,
};

/// CLI arguments for the `import` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "import",
    long_about = "Import location files into the reference store. A single \
                 file is imported and verified without touching the \
                 processed-file ledger; a directory is walked recursively \
                 for files ending in .csv, matched case-insensitively so \
                 .CSV files are included, and files already recorded in \
                 the ledger are skipped.",
    about = "Import location files into the reference store"
)]
#[ortho_config(prefix = "JUSHO")]
pub(crate) struct ImportArgs {
    /// Import one location file.
    #[arg(long = ARG_IMPORT_FILE, value_name = "path")]
    #[serde(default)]
    pub(crate) file: Option<Utf8PathBuf>,
    /// Import every location file below a directory.
    #[arg(long = ARG_IMPORT_DIRECTORY, value_name = "dir")]
    #[serde(default)]
    pub(crate) directory: Option<Utf8PathBuf>,
    /// Path to the SQLite reference store (default `jusho.db`).
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Stop the import once this many seconds have elapsed.
    #[arg(long = ARG_IMPORT_TIMEOUT, value_name = "seconds")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

impl ImportArgs {
    pub(crate) fn into_config(self) -> Result<ImportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ImportConfig::try_from(merged)
    }
}

/// What an import reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ImportSource {
    /// One file, imported and verified without a ledger entry.
    File(Utf8PathBuf),
    /// A directory tree, imported with ledger bookkeeping.
    Directory(Utf8PathBuf),
}

/// Resolved `import` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImportConfig {
    pub(crate) source: ImportSource,
    pub(crate) database: Utf8PathBuf,
    pub(crate) timeout: Option<Duration>,
}

impl ImportConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        match &self.source {
            ImportSource::File(path) => require_file(path, ARG_IMPORT_FILE),
            ImportSource::Directory(path) => require_directory(path, ARG_IMPORT_DIRECTORY),
        }
    }

    fn cancellation(&self) -> CancellationToken {
        self.timeout.map_or_else(CancellationToken::new, |timeout| {
            CancellationToken::new().with_timeout(timeout)
        })
    }
}

impl TryFrom<ImportArgs> for ImportConfig {
    type Error = CliError;

    fn try_from(args: ImportArgs) -> Result<Self, Self::Error> {
        let source = match (args.file, args.directory) {
            (Some(file), None) => ImportSource::File(file),
            (None, Some(directory)) => ImportSource::Directory(directory),
            (Some(_), Some(_)) => {
                return Err(CliError::ConflictingImportSources {
                    file: ARG_IMPORT_FILE,
                    directory: ARG_IMPORT_DIRECTORY,
                });
            }
            (None, None) => {
                return Err(CliError::MissingImportSource {
                    file: ARG_IMPORT_FILE,
                    directory: ARG_IMPORT_DIRECTORY,
                    file_env: ENV_IMPORT_FILE,
                    directory_env: ENV_IMPORT_DIRECTORY,
                });
            }
        };
        let database = args
            .database
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE));
        Ok(Self {
            source,
            database,
            timeout: args.timeout_secs.map(Duration::from_secs),
        })
    }
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_import_with(args, &mut stdout)
}

pub(crate) fn run_import_with(args: ImportArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = resolve_import_config(args)?;
    let cancellation = config.cancellation();
    let store =
        SqliteReferenceStore::open(&config.database)?.with_cancellation(cancellation.clone());
    let mut importer = Importer::new(store).with_cancellation(cancellation);

    match &config.source {
        ImportSource::File(path) => {
            let report = importer.import_file(path)?;
            write_line(writer, &report)
        }
        ImportSource::Directory(root) => {
            let run = importer.import_directory(root)?;
            let summary = run.summary();
            write_line(writer, &summary)?;
            if run.cancelled {
                warn!("import of {root} stopped at the deadline");
                return Err(CliError::ImportCancelled { summary });
            }
            Ok(())
        }
    }
}

fn resolve_import_config(args: ImportArgs) -> Result<ImportConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ImportConfig, CliError> {
    let merged = ImportArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ImportConfig::try_from(merged)
}
