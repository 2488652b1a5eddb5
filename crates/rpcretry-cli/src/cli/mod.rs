//! CLI for the rpcretry interceptor.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use commands::{run_completions, run_config, run_simulate, SimulateArgs};

/// Top-level CLI for the rpcretry unary retry interceptor.
#[derive(Debug, Parser)]
#[command(name = "rpcretry")]
#[command(about = "rpcretry: retry middleware for unary RPC calls", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Backoff policy selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Send one request through the retry interceptor to a simulated flaky service.
    Simulate {
        /// Number of failures before the service answers.
        #[arg(long, default_value = "3", value_name = "K")]
        failures: u32,

        /// Fail with PermissionDenied (never retried) instead of Unavailable.
        #[arg(long)]
        non_retryable: bool,

        /// Fully qualified procedure name used for log labels.
        #[arg(long, default_value = "/rpcretry.demo.v1.EchoService/Echo")]
        procedure: String,

        /// Settings file to use instead of the default config.toml.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Override max attempts (<= 0 retries without bound).
        #[arg(long, value_name = "N", allow_negative_numbers = true)]
        max_attempts: Option<i64>,

        /// Override the backoff policy (built-in defaults for that policy).
        #[arg(long, value_enum)]
        backoff: Option<BackoffKind>,

        /// Simulated latency of each attempt, in milliseconds.
        #[arg(long, default_value = "0", value_name = "MS")]
        latency_ms: u64,
    },

    /// Print the effective retry settings.
    Config {
        /// Print only the settings file path.
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions on stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Simulate {
                failures,
                non_retryable,
                procedure,
                config,
                max_attempts,
                backoff,
                latency_ms,
            } => {
                let args = SimulateArgs {
                    failures,
                    non_retryable,
                    procedure,
                    config,
                    max_attempts,
                    backoff,
                    latency_ms,
                };
                run_simulate(args).await?;
            }
            CliCommand::Config { path } => run_config(path)?,
            CliCommand::Completions { shell } => run_completions(shell, &mut Cli::command()),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
