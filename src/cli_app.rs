//! Top-level CLI definition and dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use jfr_harvester::core::config::Config;
use jfr_harvester::core::errors::Result;
use jfr_harvester::daemon::service::HarvesterDaemon;

/// JFR Harvester — collects JVM flight-recording telemetry.
#[derive(Debug, Parser)]
#[command(
    name = "jfrh",
    author,
    version,
    about = "JFR Harvester - JVM flight-recording telemetry collector",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the harvest daemon until stopped.
    Daemon(DaemonArgs),
    /// Run exactly one harvest cycle, deliver, and exit.
    Once(OnceArgs),
    /// View configuration state.
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct DaemonArgs {
    /// Override harvest interval in milliseconds.
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Args, Default)]
struct OnceArgs {
    /// Override spool directory to drain.
    #[arg(long, value_name = "PATH")]
    spool_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Clone, Subcommand, Default)]
enum ConfigAction {
    /// Print the effective configuration as TOML.
    #[default]
    Show,
    /// Print the config file path in use.
    Path,
}

/// Dispatch the parsed CLI.
pub fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Daemon(args) => {
            let mut config = config;
            if let Some(interval_ms) = args.interval_ms {
                config.harvest.interval_ms = interval_ms;
            }
            let mut daemon = HarvesterDaemon::init_with_spool(config)?;
            daemon.run()
        }
        Command::Once(args) => {
            let mut config = config;
            if let Some(spool_dir) = &args.spool_dir {
                config.paths.spool_dir.clone_from(spool_dir);
            }
            let mut daemon = HarvesterDaemon::init_with_spool(config)?;
            let report = daemon.run_once()?;
            println!(
                "cycle {}: {} records -> {} items ({})",
                report.sequence,
                report.records,
                report.items,
                if report.enqueued {
                    "delivered"
                } else {
                    "nothing to deliver"
                }
            );
            Ok(())
        }
        Command::Config(args) => match args.action {
            ConfigAction::Show => {
                let rendered =
                    toml::to_string_pretty(&config).map_err(|e| {
                        jfr_harvester::core::errors::HarvestError::Serialization {
                            context: "toml",
                            details: e.to_string(),
                        }
                    })?;
                print!("{rendered}");
                Ok(())
            }
            ConfigAction::Path => {
                println!("{}", config.paths.config_file.display());
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_daemon_with_interval() {
        let cli = Cli::parse_from(["jfrh", "daemon", "--interval-ms", "500"]);
        match cli.command {
            Command::Daemon(args) => assert_eq!(args.interval_ms, Some(500)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_config_show() {
        let cli = Cli::parse_from(["jfrh", "config", "show"]);
        assert!(matches!(
            cli.command,
            Command::Config(ConfigArgs {
                action: ConfigAction::Show
            })
        ));
    }
}
