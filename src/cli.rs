use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};

use crate::config::Config;
use crate::diagnostics::{self, Console};
use crate::log_sink::{ChannelId, LogSink};
use crate::maintenance::{Catalog, FsRemover, Launcher, OperationKind, RunContext};
use crate::privilege::SystemPrivilege;
use crate::process::ShellRunner;
use crate::tui;
use crate::ui_channel::{ui_channel, UiReceiver};

pub mod commands;

use commands::{config_command, logs_command, run_command};

#[derive(Parser)]
#[command(name = "maintkit")]
#[command(version)]
#[command(about = "Run system health checks, disk cleanup and drive optimization")]
#[command(
    long_about = "maintkit sequences Windows maintenance tools (DISM, sfc, defrag) and a \
    temp-folder cleanup, streaming their output to per-operation log files.\n\n\
    Examples:\n  \
    maintkit                        # Open the dashboard\n  \
    maintkit run health-check       # Run the health check without the dashboard\n  \
    maintkit run disk-cleanup --json\n  \
    maintkit logs show sfc-scannow  # Print one log channel\n  \
    maintkit logs clear             # Empty every log channel"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Increase diagnostic verbosity (-v, -vv for more)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Use this config file instead of the default location
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive dashboard (default)
    Tui,

    /// Run one operation in the foreground
    #[command(visible_alias = "r")]
    Run {
        #[arg(value_enum)]
        operation: OperationKind,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show, clear or locate log channels
    Logs {
        #[command(subcommand)]
        action: LogsAction,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum LogsAction {
    /// Print a channel's content
    Show {
        #[arg(value_enum)]
        channel: ChannelId,
    },
    /// Empty one channel, or all of them
    Clear {
        #[arg(value_enum)]
        channel: Option<ChannelId>,
    },
    /// Print the log directory and channel files
    Path,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Everything a front end needs to start runs and watch them.
pub struct Runtime {
    pub launcher: Launcher,
    pub receiver: UiReceiver,
}

/// Wire the real collaborators together from `config`.
pub fn bootstrap(config: &Config) -> anyhow::Result<Runtime> {
    let sink = Arc::new(LogSink::new(config.log_dir()));
    let (events, receiver) = ui_channel();
    let ctx = RunContext {
        sink: Arc::clone(&sink),
        runner: Arc::new(ShellRunner::new(std::time::Duration::from_millis(
            config.defragment.poll_interval_ms,
        ))),
        gate: Arc::new(SystemPrivilege::new(sink)),
        remover: Arc::new(FsRemover),
        events,
        progress_reset_delay: config.progress_reset_delay(),
    };
    let catalog = Catalog::from_config(config).context("Failed to build operations")?;
    Ok(Runtime {
        launcher: Launcher::new(ctx, catalog),
        receiver,
    })
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => Config::load_from(path),
            None => Ok(Config::load()),
        }
    }

    pub fn run(self) -> anyhow::Result<()> {
        let config = self.load_config()?;
        let level = config.logging.level.raised(self.verbose);

        match self.command.unwrap_or(Commands::Tui) {
            Commands::Tui => {
                diagnostics::init(&config.log_dir(), level, Console::Silent);
                tui::run(&config)
            }
            Commands::Run { operation, json } => {
                diagnostics::init(&config.log_dir(), level, Console::Stderr);
                run_command::handle_run(&config, operation, json)
            }
            Commands::Logs { action } => {
                diagnostics::init(&config.log_dir(), level, Console::Stderr);
                logs_command::handle_logs(&config, action)
            }
            Commands::Config { action } => {
                config_command::handle_config(&config, self.config.as_deref(), action)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_json() {
        let cli = Cli::try_parse_from(["maintkit", "run", "disk-cleanup", "--json", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Some(Commands::Run {
                operation: OperationKind::DiskCleanup,
                json: true
            })
        ));
    }

    #[test]
    fn test_parse_logs_clear_without_channel() {
        let cli = Cli::try_parse_from(["maintkit", "logs", "clear"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Logs {
                action: LogsAction::Clear { channel: None }
            })
        ));

        let cli = Cli::try_parse_from(["maintkit", "logs", "show", "sfc-scannow"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Logs {
                action: LogsAction::Show {
                    channel: ChannelId::SfcScannow
                }
            })
        ));
    }

    #[test]
    fn test_no_subcommand_means_dashboard() {
        let cli = Cli::try_parse_from(["maintkit"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_bootstrap_with_temp_log_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.logging.dir = Some(temp_dir.path().to_path_buf());
        let runtime = bootstrap(&config).unwrap();
        assert_eq!(runtime.launcher.context().sink.dir(), temp_dir.path());
        assert!(!runtime.launcher.is_running(OperationKind::HealthCheck));
    }
}
