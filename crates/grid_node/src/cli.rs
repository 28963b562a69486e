//! Command-line interface handling for the grid node.
//!
//! Options given here override the matching configuration file settings.

use crate::config::RoutingMode;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the routing mode
    pub mode: Option<RoutingMode>,
}

impl CliArgs {
    /// Builds the clap command describing every option.
    pub fn command() -> Command {
        Command::new("Grid Node")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Simulator node hosting regions and routing agent hand-offs")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("grid_node.toml"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("mode")
                    .short('m')
                    .long("mode")
                    .value_name("MODE")
                    .help("Routing mode: local (hosted regions only) or hybrid (remote fallback)")
                    .value_parser(["local", "hybrid"]),
            )
    }

    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&Self::command().get_matches())
    }

    /// Parses an explicit argument list.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&Self::command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &clap::ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("grid_node.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            mode: matches
                .get_one::<String>("mode")
                .and_then(|mode| mode.parse().ok()),
        }
    }
}
