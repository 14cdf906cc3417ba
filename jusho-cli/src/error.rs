//! Error types emitted by the Jusho CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use jusho_core::{ErrorClass, ResolveError, SqliteLocationIndexError};
use jusho_data::{ImportError, ImportSummary, OpenStoreError};
use thiserror::Error;

/// Errors emitted by the Jusho CLI.
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
    /// Neither import source was supplied.
    #[error("import needs one of --{file} or --{directory} (or {file_env} / {directory_env})")]
    MissingImportSource {
        file: &'static str,
        directory: &'static str,
        file_env: &'static str,
        directory_env: &'static str,
    },
    /// Both import sources were supplied.
    #[error("--{file} and --{directory} cannot be used together")]
    ConflictingImportSources {
        file: &'static str,
        directory: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a directory.
    #[error("{field} path {path:?} exists but is not a directory")]
    SourcePathNotDirectory {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Opening the reference store for writing failed.
    #[error(transparent)]
    OpenStore(#[from] OpenStoreError),
    /// Opening the query index failed.
    #[error(transparent)]
    OpenIndex(#[from] SqliteLocationIndexError),
    /// A fatal import failure.
    #[error(transparent)]
    Import(#[from] ImportError),
    /// The directory import stopped at the deadline.
    #[error("import cancelled before completion ({summary})")]
    ImportCancelled { summary: ImportSummary },
    /// Resolution rejected the input, found nothing, or the index failed.
    #[error("{message}")]
    Resolve {
        message: String,
        #[source]
        source: ResolveError,
    },
    /// Serialising command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

impl From<ResolveError> for CliError {
    fn from(source: ResolveError) -> Self {
        Self::Resolve {
            message: source.public_message(),
            source,
        }
    }
}

impl CliError {
    /// Resolution class of the failure, when it came from the resolver.
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            Self::Resolve { source, .. } => Some(source.class()),
            _ => None,
        }
    }
}
