//! Command-line interface for importing and querying the Jusho address
//! reference set.
#![forbid(unsafe_code)]

use std::{fmt::Display, io::Write};

use camino::Utf8Path;
use clap::{Parser, Subcommand};

mod error;
mod import;
mod resolve;

pub use error::CliError;

use import::{ImportArgs, run_import};
use resolve::{GeocodeArgs, ReverseArgs, run_geocode, run_reverse};

const ARG_DATABASE: &str = "database";
const ARG_IMPORT_FILE: &str = "file";
const ARG_IMPORT_DIRECTORY: &str = "directory";
const ARG_IMPORT_TIMEOUT: &str = "timeout-secs";
const ARG_GEOCODE_QUERY: &str = "query";
const ARG_GEOCODE_LIMIT: &str = "limit";
const ARG_REVERSE_LATITUDE: &str = "lat";
const ARG_REVERSE_LONGITUDE: &str = "lon";
const ARG_REVERSE_RADIUS: &str = "radius-m";
const ENV_IMPORT_FILE: &str = "JUSHO_CMDS_IMPORT_FILE";
const ENV_IMPORT_DIRECTORY: &str = "JUSHO_CMDS_IMPORT_DIRECTORY";
const ENV_GEOCODE_QUERY: &str = "JUSHO_CMDS_GEOCODE_QUERY";
const ENV_REVERSE_LATITUDE: &str = "JUSHO_CMDS_REVERSE_LAT";
const ENV_REVERSE_LONGITUDE: &str = "JUSHO_CMDS_REVERSE_LON";

/// Database used when no `--database` is configured.
const DEFAULT_DATABASE: &str = "jusho.db";

/// Run the Jusho CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Import(args) => run_import(args),
        Command::Geocode(args) => run_geocode(args),
        Command::Reverse(args) => run_reverse(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "jusho",
    about = "Import and query the Japanese address reference set",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import location files into the reference store.
    Import(ImportArgs),
    /// Resolve address text to candidate locations.
    Geocode(GeocodeArgs),
    /// Resolve a coordinate to the nearest known location.
    Reverse(ReverseArgs),
}

/// Require `path` to name an existing regular file.
fn require_file(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match jusho_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(inspect_error(path, field, source)),
    }
}

/// Require `path` to name an existing directory.
fn require_directory(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match jusho_fs::dir_is_dir(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotDirectory {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) => Err(inspect_error(path, field, source)),
    }
}

fn inspect_error(path: &Utf8Path, field: &'static str, source: std::io::Error) -> CliError {
    if source.kind() == std::io::ErrorKind::NotFound {
        CliError::MissingSourcePath {
            field,
            path: path.to_path_buf(),
        }
    } else {
        CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }
    }
}

fn write_line(writer: &mut dyn Write, line: &dyn Display) -> Result<(), CliError> {
    writeln!(writer, "{line}").map_err(CliError::WriteOutput)
}

#[cfg(test)]
mod tests;
