//! Command-line surface.
//!
//! Configuration-file *management* (create/show/add/remove/update service)
//! is an external collaborator's concern; this binary implements only the
//! `start` subcommand that actually runs the engine. Any other subcommand
//! name is rejected with an explicit "not supported by this build" message
//! rather than silently ignored.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".monitoring")
        .join("monitoring-config.json")
}

#[derive(Parser, Debug)]
#[command(name = "monitoring")]
#[command(version = concat!("Ver:", env!("CARGO_PKG_VERSION")))]
#[command(about = "HTTP/HTTPS availability monitor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the monitoring engine.
    Start(StartArgs),
    /// Configuration file management (create/show/add/remove/update
    /// service) is not implemented by this build.
    Config,
}

#[derive(Parser, Debug)]
pub struct StartArgs {
    /// Path to the JSON configuration file.
    #[arg(long = "config", short = 'c', default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Overrides the configured export batch size.
    #[arg(long = "export-batch-size")]
    pub export_batch_size: Option<usize>,

    /// Overrides the configured export interval, in seconds.
    #[arg(long = "export-interval")]
    pub export_interval: Option<u64>,

    /// Send the systemd readiness datagram after the agent starts.
    #[arg(long = "notify-systemd", short = 'n', visible_alias = "ns")]
    pub notify_systemd: bool,

    /// Skip the interactive confirmation prompt.
    #[arg(long = "yes", short = 'y')]
    pub yes: bool,

    /// Increase log verbosity: -v, -vv, -vvv.
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_with_defaults() {
        let cli = Cli::parse_from(["monitoring", "start"]);
        match cli.command {
            Command::Start(args) => {
                assert!(!args.yes);
                assert!(!args.notify_systemd);
                assert_eq!(args.verbosity, 0);
            }
            _ => panic!("expected start subcommand"),
        }
    }

    #[test]
    fn parses_start_with_overrides() {
        let cli = Cli::parse_from([
            "monitoring",
            "start",
            "--config",
            "/tmp/foo.json",
            "--export-batch-size",
            "100",
            "--export-interval",
            "30",
            "--notify-systemd",
            "--yes",
            "-vv",
        ]);
        match cli.command {
            Command::Start(args) => {
                assert_eq!(args.config, PathBuf::from("/tmp/foo.json"));
                assert_eq!(args.export_batch_size, Some(100));
                assert_eq!(args.export_interval, Some(30));
                assert!(args.notify_systemd);
                assert!(args.yes);
                assert_eq!(args.verbosity, 2);
            }
            _ => panic!("expected start subcommand"),
        }
    }
}
