//! Command-line interface handling for the AOI server.
//!
//! Every option overrides the matching setting from the configuration file.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
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
    /// Optional override for the number of simulated watchers
    pub watchers: Option<usize>,
    /// Optional override for the number of simulated objects
    pub objects: Option<usize>,
    /// Optional override for the number of simulation steps, 0 runs until a signal
    pub ticks: Option<u64>,
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: PathBuf::from(
                matches
                    .get_one::<String>("config")
                    .expect("Default config path should always be set"),
            ),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            watchers: matches.get_one::<usize>("watchers").copied(),
            objects: matches.get_one::<usize>("objects").copied(),
            ticks: matches.get_one::<u64>("ticks").copied(),
        }
    }
}

fn command() -> Command {
    Command::new("AOI Server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Area-of-interest visibility service with a built-in world simulation")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("aoi.toml"),
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
                .help("Output logs and visibility updates in JSON format")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("watchers")
                .long("watchers")
                .value_name("N")
                .help("Number of simulated players with vision")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("objects")
                .long("objects")
                .value_name("N")
                .help("Number of simulated monsters without vision")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("ticks")
                .long("ticks")
                .value_name("N")
                .help("Stop after N simulation steps (0 runs until interrupted)")
                .value_parser(value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_from(args: &[&str]) -> CliArgs {
        let matches = command().try_get_matches_from(args).unwrap();
        CliArgs::from_matches(&matches)
    }

    #[test]
    fn test_defaults() {
        let args = parse_from(&["aoi_server"]);
        assert_eq!(args.config_path, PathBuf::from("aoi.toml"));
        assert_eq!(args.log_level, None);
        assert!(!args.json_logs);
        assert_eq!(args.watchers, None);
        assert_eq!(args.ticks, None);
    }

    #[test]
    fn test_overrides() {
        let args = parse_from(&[
            "aoi_server",
            "-c",
            "custom.toml",
            "-l",
            "debug",
            "--json-logs",
            "--watchers",
            "3",
            "--objects",
            "40",
            "--ticks",
            "25",
        ]);
        assert_eq!(args.config_path, PathBuf::from("custom.toml"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.watchers, Some(3));
        assert_eq!(args.objects, Some(40));
        assert_eq!(args.ticks, Some(25));
    }

    #[test]
    fn test_rejects_non_numeric_counts() {
        assert!(command()
            .try_get_matches_from(["aoi_server", "--watchers", "many"])
            .is_err());
    }
}
