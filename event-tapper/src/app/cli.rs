//! Command-Line Interface

use crate::app::output::EventFilter;
use crate::capture::fields::FIELD_KEY_RANGE;
use crate::capture::{TapLocation, TapPlacement};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Event Tapper - Monitor system events like keyboard and mouse input
#[derive(Parser, Debug)]
#[command(name = "event-tap")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Monitor events until interrupted or the duration elapses
    Monitor(MonitorArgs),

    /// List the known event fields
    Fields {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        write: bool,
    },
}

#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct MonitorArgs {
    /// Duration to run the monitor (in seconds). Omit for continuous monitoring.
    #[arg(short, long, allow_negative_numbers = true)]
    pub duration: Option<f64>,

    /// Location to monitor events from
    #[arg(short, long, value_enum)]
    pub location: Option<LocationArg>,

    /// Placement of the event tap
    #[arg(short, long, value_enum)]
    pub placement: Option<PlacementArg>,

    /// Minimum interval between delivered events (ms, 0 = every event)
    #[arg(long)]
    pub throttle_ms: Option<u64>,

    /// Filter events by type
    #[arg(long, value_enum, default_value_t = EventFilter::All)]
    pub types: EventFilter,

    /// Raw values of field keys to display. By default, all fields are included.
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub fields: Vec<u32>,

    /// Include labels for known fields
    #[arg(long)]
    pub labeled_fields: bool,

    /// Output events as JSON, one object per line
    #[arg(long)]
    pub json: bool,

    /// Include timestamp in output
    #[arg(short, long)]
    pub timestamp: bool,
}

impl MonitorArgs {
    /// Requested field keys, or the full decoded range
    pub fn field_keys(&self) -> Vec<u32> {
        if self.fields.is_empty() {
            FIELD_KEY_RANGE.collect()
        } else {
            self.fields.clone()
        }
    }

    /// Session duration; negative, non-finite or out-of-range values mean
    /// "until stopped"
    pub fn duration(&self) -> Option<Duration> {
        self.duration
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationArg {
    Hid,
    Session,
    AnnotatedSession,
}

impl From<LocationArg> for TapLocation {
    fn from(arg: LocationArg) -> Self {
        match arg {
            LocationArg::Hid => TapLocation::Hid,
            LocationArg::Session => TapLocation::Session,
            LocationArg::AnnotatedSession => TapLocation::AnnotatedSession,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementArg {
    Head,
    Tail,
}

impl From<PlacementArg> for TapPlacement {
    fn from(arg: PlacementArg) -> Self {
        match arg {
            PlacementArg::Head => TapPlacement::Head,
            PlacementArg::Tail => TapPlacement::Tail,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn monitor(args: &[&str]) -> MonitorArgs {
        let mut argv = vec!["event-tap", "monitor"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Monitor(args) => args,
            other => panic!("Expected Monitor command, got {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_monitor_defaults() {
        let args = monitor(&[]);
        assert!(args.duration().is_none());
        assert!(args.location.is_none());
        assert!(args.placement.is_none());
        assert!(args.throttle_ms.is_none());
        assert_eq!(args.types, EventFilter::All);
        assert_eq!(args.field_keys().len(), 201);
        assert!(!args.labeled_fields);
        assert!(!args.json);
        assert!(!args.timestamp);
    }

    #[test]
    fn test_cli_parse_monitor_with_all_options() {
        let args = monitor(&[
            "--duration", "2.5",
            "--location", "annotated-session",
            "--placement", "tail",
            "--throttle-ms", "0",
            "--types", "keyboard",
            "--fields", "9,10,12",
            "--labeled-fields",
            "--json",
            "--timestamp",
        ]);

        assert_eq!(args.duration(), Some(Duration::from_millis(2500)));
        assert_eq!(args.location.map(TapLocation::from), Some(TapLocation::AnnotatedSession));
        assert_eq!(args.placement.map(TapPlacement::from), Some(TapPlacement::Tail));
        assert_eq!(args.throttle_ms, Some(0));
        assert_eq!(args.types, EventFilter::Keyboard);
        assert_eq!(args.field_keys(), vec![9, 10, 12]);
        assert!(args.labeled_fields);
        assert!(args.json);
        assert!(args.timestamp);
    }

    #[test]
    fn test_cli_monitor_shorthands() {
        let args = monitor(&["-d", "10", "-l", "hid", "-p", "head", "-t"]);
        assert_eq!(args.duration(), Some(Duration::from_secs(10)));
        assert_eq!(args.location, Some(LocationArg::Hid));
        assert_eq!(args.placement, Some(PlacementArg::Head));
        assert!(args.timestamp);
    }

    #[test]
    fn test_cli_negative_duration_means_continuous() {
        let args = monitor(&["--duration=-1"]);
        assert!(args.duration().is_none());
    }

    #[test]
    fn test_cli_huge_duration_means_continuous() {
        assert!(monitor(&["--duration", "1e30"]).duration().is_none());
        assert!(monitor(&["--duration", "inf"]).duration().is_none());
        assert!(monitor(&["--duration", "NaN"]).duration().is_none());
        assert_eq!(
            monitor(&["--duration", "0"]).duration(),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_cli_invalid_location_fails() {
        let result = Cli::try_parse_from(["event-tap", "monitor", "--location", "kernel"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_fields_command() {
        let cli = Cli::try_parse_from(["event-tap", "fields", "--json"]).unwrap();
        match cli.command {
            Commands::Fields { json } => assert!(json),
            _ => panic!("Expected Fields command"),
        }
    }

    #[test]
    fn test_cli_parse_config_command() {
        let cli = Cli::try_parse_from(["event-tap", "config"]).unwrap();
        match cli.command {
            Commands::Config { write } => assert!(!write),
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from([
            "event-tap",
            "-v",
            "--config",
            "/path/to/config.toml",
            "monitor",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.toml")));
    }

    #[test]
    fn test_cli_verify_command_structure() {
        let cmd = Cli::command();
        cmd.clone().debug_assert();

        let subcommands: Vec<_> = cmd.get_subcommands().map(|s| s.get_name()).collect();
        assert!(subcommands.contains(&"monitor"));
        assert!(subcommands.contains(&"fields"));
        assert!(subcommands.contains(&"config"));
    }
}
