//! Geocode and reverse commands for the Jusho CLI.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use jusho_core::{DEFAULT_SEARCH_LIMIT, DEFAULT_SEARCH_RADIUS_M, Resolver, SqliteLocationIndex};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_DATABASE, ARG_GEOCODE_LIMIT, ARG_GEOCODE_QUERY, ARG_REVERSE_LATITUDE,
    ARG_REVERSE_LONGITUDE, ARG_REVERSE_RADIUS, CliError, DEFAULT_DATABASE, ENV_GEOCODE_QUERY,
    ENV_REVERSE_LATITUDE, ENV_REVERSE_LONGITUDE, require_file,
};

/// CLI arguments for the `geocode` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "geocode",
    long_about = "Search the reference store for locations whose full address \
                 contains the query's whitespace-separated terms. Results are \
                 printed as JSON, best match first.",
    about = "Resolve address text to candidate locations"
)]
#[ortho_config(prefix = "JUSHO")]
pub(crate) struct GeocodeArgs {
    /// Address text to search for.
    #[arg(value_name = "query")]
    #[serde(default)]
    pub(crate) query: Option<String>,
    /// Path to the SQLite reference store (default `jusho.db`).
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Maximum number of results (default 10).
    #[arg(long = ARG_GEOCODE_LIMIT, value_name = "count")]
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

impl GeocodeArgs {
    pub(crate) fn into_config(self) -> Result<GeocodeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        GeocodeConfig::try_from(merged)
    }
}

/// Resolved `geocode` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GeocodeConfig {
    pub(crate) query: String,
    pub(crate) database: Utf8PathBuf,
    pub(crate) limit: usize,
}

impl TryFrom<GeocodeArgs> for GeocodeConfig {
    type Error = CliError;

    fn try_from(args: GeocodeArgs) -> Result<Self, Self::Error> {
        let query = args.query.ok_or(CliError::MissingArgument {
            field: ARG_GEOCODE_QUERY,
            env: ENV_GEOCODE_QUERY,
        })?;
        Ok(Self {
            query,
            database: database_or_default(args.database),
            limit: args.limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
        })
    }
}

/// CLI arguments for the `reverse` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "reverse",
    allow_negative_numbers = true,
    long_about = "Find the stored location nearest to a WGS84 coordinate \
                 within the search radius and print it as JSON.",
    about = "Resolve a coordinate to the nearest known location"
)]
#[ortho_config(prefix = "JUSHO")]
pub(crate) struct ReverseArgs {
    /// Latitude in decimal degrees.
    #[arg(long = ARG_REVERSE_LATITUDE, value_name = "degrees")]
    #[serde(default)]
    pub(crate) lat: Option<f64>,
    /// Longitude in decimal degrees.
    #[arg(long = ARG_REVERSE_LONGITUDE, value_name = "degrees")]
    #[serde(default)]
    pub(crate) lon: Option<f64>,
    /// Path to the SQLite reference store (default `jusho.db`).
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Search radius in metres (default 10000).
    #[arg(long = ARG_REVERSE_RADIUS, value_name = "metres")]
    #[serde(default)]
    pub(crate) radius_m: Option<f64>,
}

impl ReverseArgs {
    pub(crate) fn into_config(self) -> Result<ReverseConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ReverseConfig::try_from(merged)
    }
}

/// Resolved `reverse` command configuration.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReverseConfig {
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
    pub(crate) database: Utf8PathBuf,
    pub(crate) radius_m: f64,
}

impl TryFrom<ReverseArgs> for ReverseConfig {
    type Error = CliError;

    fn try_from(args: ReverseArgs) -> Result<Self, Self::Error> {
        let latitude = args.lat.ok_or(CliError::MissingArgument {
            field: ARG_REVERSE_LATITUDE,
            env: ENV_REVERSE_LATITUDE,
        })?;
        let longitude = args.lon.ok_or(CliError::MissingArgument {
            field: ARG_REVERSE_LONGITUDE,
            env: ENV_REVERSE_LONGITUDE,
        })?;
        Ok(Self {
            latitude,
            longitude,
            database: database_or_default(args.database),
            radius_m: args.radius_m.unwrap_or(DEFAULT_SEARCH_RADIUS_M),
        })
    }
}

fn database_or_default(database: Option<Utf8PathBuf>) -> Utf8PathBuf {
    database.unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE))
}

/// Open the query index, refusing to create a database that is not there.
fn open_index(database: &Utf8Path) -> Result<SqliteLocationIndex, CliError> {
    require_file(database, ARG_DATABASE)?;
    Ok(SqliteLocationIndex::open(database)?)
}

pub(crate) fn run_geocode(args: GeocodeArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_geocode_with(args, &mut stdout)
}

pub(crate) fn run_geocode_with(args: GeocodeArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let index = open_index(&config.database)?;
    let resolver = Resolver::new(&index, &index).with_search_limit(config.limit);
    let locations = resolver.geocode(&config.query)?;
    write_json(writer, &locations)
}

pub(crate) fn run_reverse(args: ReverseArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_reverse_with(args, &mut stdout)
}

pub(crate) fn run_reverse_with(args: ReverseArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = args.into_config()?;
    let index = open_index(&config.database)?;
    let resolver = Resolver::new(&index, &index).with_search_radius(config.radius_m);
    let location = resolver.require_nearest(config.latitude, config.longitude)?;
    write_json(writer, &location)
}

fn write_json<T: Serialize + ?Sized>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerialiseOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn geocode_config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<GeocodeConfig, CliError> {
    let merged = GeocodeArgs::merge_from_layers(layers).map_err(CliError::from)?;
    GeocodeConfig::try_from(merged)
}
