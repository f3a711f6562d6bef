//! tart deploys a set of interdependent smart contracts to an Ethereum node, in order.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command, ReportFormat};
use tart_deploy::{Deployer, DeploymentReport, PlanAborted, TARTCONF_FILENAME, results_table};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let config_path = if cli.config.is_dir() {
        cli.config.join(TARTCONF_FILENAME)
    } else {
        cli.config.clone()
    };

    match cli.command {
        Command::Init { force } => {
            if config_path.exists() && !force {
                anyhow::bail!(
                    "{} already exists, use --force to overwrite it",
                    config_path.display()
                );
            }
            Deployer::example().save_to_file(&config_path)?;
        }

        Command::Plan => {
            let deployer = Deployer::load_from_file(&config_path)?;
            let plan = deployer.plan()?;
            print!("{plan}");
        }

        Command::Deploy { rpc_url, redeploy } => {
            let mut deployer = Deployer::load_from_file(&config_path)?;
            if let Some(rpc_url) = rpc_url {
                deployer.network.rpc_url = rpc_url;
            }

            tracing::info!(
                config_path = %config_path.display(),
                rpc_url = %deployer.network.rpc_url,
                contracts = deployer.contracts.len(),
                "Loading deployment from config file..."
            );

            match deployer.deploy(redeploy).await {
                Ok(report) => println!("{report}"),
                Err(err) => {
                    // Contracts confirmed before the failing step are still on chain.
                    if let Some(aborted) = err.downcast_ref::<PlanAborted>() {
                        if !aborted.completed.is_empty() {
                            println!("{}", results_table(&aborted.completed));
                        }
                    }
                    return Err(err);
                }
            }
        }

        Command::Report { format } => {
            let deployer = Deployer::load_from_file(&config_path)?;
            let report = DeploymentReport::load_from_file(&deployer.report)
                .context("No deployment report found, run `tart deploy` first")?;

            match format {
                ReportFormat::Table => println!("{report}"),
                ReportFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialize report")?
                ),
            }
        }
    }

    Ok(())
}
