use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tart_deploy::TARTCONF_FILENAME;
use tracing::level_filters::LevelFilter;
use url::Url;

/// How `tart report` prints a saved report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ReportFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "tart")]
#[command(
    author,
    version,
    about = "Deploy a set of interdependent smart contracts in order"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "TART_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the tart configuration file, or to a directory containing `Tart.toml`.
    #[arg(short, long, alias = "conf", env = "TART_CONFIG", default_value = TARTCONF_FILENAME)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write an example configuration deploying the SAED token suite.
    Init {
        /// Overwrite an existing configuration file.
        #[arg(long)]
        force: bool,
    },

    /// Print the deployment order and the constructor arguments of each contract.
    Plan,

    /// Deploy the configured contracts and save the deployment report.
    Deploy {
        /// The URL of the node's JSON-RPC endpoint. Overrides `network.rpc_url`.
        #[arg(long, alias = "rpc")]
        rpc_url: Option<Url>,

        /// Redeploy all contracts.
        /// If not provided and the saved report matches the plan, nothing is deployed.
        #[arg(long, default_value_t = false)]
        redeploy: bool,
    },

    /// Print the saved deployment report.
    Report {
        /// Output format.
        #[arg(long, default_value_t = ReportFormat::Table)]
        format: ReportFormat,
    },
}
