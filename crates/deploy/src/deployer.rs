use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{
    ArtifactDir, ArtifactProvider, ChainClient, ConstructorArg, ContractSpec, DeploymentFingerprint,
    DeploymentPlan, DeploymentReport, JsonRpcClient, NetworkConfig, Orchestrator, PlanAborted,
    TARTCONF_FILENAME, config, load_artifacts,
};

/// Main deployer: the network to deploy to, where to find artifacts and which contracts
/// to deploy.
///
/// This struct can be serialized to/from TOML format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployer {
    /// Directory holding the compiled artifacts.
    pub artifacts_dir: PathBuf,
    /// Where the deployment report is written.
    pub report: PathBuf,
    /// Target node and confirmation settings.
    pub network: NetworkConfig,
    /// Contracts to deploy. The deployment order is derived from their references.
    #[serde(default)]
    pub contracts: Vec<ContractSpec>,
}

impl Default for Deployer {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("build/contracts"),
            report: PathBuf::from("deployments.json"),
            network: NetworkConfig::default(),
            contracts: Vec::new(),
        }
    }
}

impl Deployer {
    /// The SAED token suite: three tokens owned by the deployer, then the swap
    /// contract bound to them.
    pub fn example() -> Self {
        let token = |name: &str| ContractSpec::new(name).arg(ConstructorArg::Deployer);

        Self {
            contracts: vec![
                token("SAED"),
                token("SUSD"),
                token("USDT"),
                ContractSpec::new("SAEDSwap")
                    .arg(ConstructorArg::Contract("SAED".to_string()))
                    .arg(ConstructorArg::Contract("SUSD".to_string()))
                    .arg(ConstructorArg::Contract("USDT".to_string())),
            ],
            ..Self::default()
        }
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize deployer config to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, with `TART_` environment overrides.
    ///
    /// When `path` is a directory, `Tart.toml` inside it is loaded. Relative
    /// `artifacts_dir` and `report` paths are resolved against the file's directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file or directory not found: {}",
                path.display()
            ));
        }

        let config_path = if path.is_dir() {
            path.join(TARTCONF_FILENAME)
        } else {
            path.to_path_buf()
        };

        let mut config: Self = config::load_layered(&Self::default(), &config_path)?;

        // Relative paths are relative to the configuration file.
        if let Some(base) = config_path.parent() {
            config.artifacts_dir = base.join(&config.artifacts_dir);
            config.report = base.join(&config.report);
        }

        tracing::info!(path = %config_path.display(), "Configuration loaded");
        Ok(config)
    }

    /// The deployment order for the configured contracts.
    pub fn plan(&self) -> Result<DeploymentPlan> {
        DeploymentPlan::from_graph(self.contracts.clone()).context("Invalid deployment plan")
    }

    /// Connect to the configured node and deploy the plan.
    pub async fn deploy(self, redeploy: bool) -> Result<DeploymentReport> {
        tracing::info!("Starting deployment process...");

        let plan = self.plan()?;
        let artifacts = ArtifactDir::new(&self.artifacts_dir);
        let client = JsonRpcClient::connect(&self.network)
            .await
            .with_context(|| format!("Failed to connect to {}", self.network.rpc_url))?;

        self.deploy_with(&plan, &artifacts, &client, redeploy).await
    }

    /// Deploy `plan` through `client` and save the report.
    ///
    /// Every artifact is read once; the same bytecode is fingerprinted and submitted.
    /// Submission is skipped when the saved report was produced from an identical
    /// fingerprint and all of its contracts still have code on chain, unless `redeploy`
    /// is set. A failed run saves nothing; its [`PlanAborted`] error is returned as is.
    pub async fn deploy_with<A, C>(
        &self,
        plan: &DeploymentPlan,
        artifacts: &A,
        client: &C,
        redeploy: bool,
    ) -> Result<DeploymentReport>
    where
        A: ArtifactProvider,
        C: ChainClient,
    {
        let artifacts = load_artifacts(plan, artifacts).map_err(Self::aborted)?;
        let plan_hash =
            DeploymentFingerprint::new(client.chain_id(), client.deployer(), plan, &artifacts)?
                .compute_hash();

        // Deploy if redeploy is set or if the saved report does not describe this exact
        // plan, live on this chain.
        if !redeploy {
            if let Some(existing) = DeploymentReport::load_if_exists(&self.report)? {
                if existing.plan_hash != plan_hash {
                    tracing::info!(
                        report = %self.report.display(),
                        "Plan changed since the last deployment, redeploying"
                    );
                } else if let Some(missing) = Self::first_without_code(client, &existing).await? {
                    tracing::warn!(
                        report = %self.report.display(),
                        contract = %missing,
                        "Contract from the saved report has no code on chain, redeploying"
                    );
                } else {
                    tracing::info!(
                        report = %self.report.display(),
                        plan_hash = %plan_hash,
                        "Contracts already deployed, skipping deployment"
                    );
                    return Ok(existing);
                }
            }
        }

        tracing::info!(
            contracts = plan.len(),
            chain_id = client.chain_id(),
            deployer = %client.deployer(),
            "Deploying contracts..."
        );

        let results = Orchestrator::new(&artifacts, client)
            .execute(plan)
            .await
            .map_err(Self::aborted)?;

        let report =
            DeploymentReport::new(client.chain_id(), client.deployer(), plan_hash, results);
        report.save_to_file(&self.report)?;

        tracing::info!("✓ Deployment complete!");
        Ok(report)
    }

    /// Name of the first reported contract whose address holds no code.
    async fn first_without_code<C: ChainClient>(
        client: &C,
        report: &DeploymentReport,
    ) -> Result<Option<String>> {
        for contract in &report.contracts {
            let code = client.code_at(contract.address).await.with_context(|| {
                format!("Failed to check deployment of `{}`", contract.name)
            })?;
            if code.is_empty() {
                return Ok(Some(contract.name.clone()));
            }
        }
        Ok(None)
    }

    /// Log an aborted run and turn it into the returned error.
    fn aborted(aborted: PlanAborted) -> anyhow::Error {
        for result in &aborted.completed {
            tracing::warn!(
                contract = %result.name,
                address = %result.address,
                "Contract remains deployed from the aborted run"
            );
        }

        let (contract, step) = (aborted.error.contract().to_string(), aborted.step + 1);
        let error = anyhow::Error::new(aborted);
        tracing::error!(
            contract = %contract,
            step,
            error = %format!("{error:#}"),
            "Deployment failed"
        );
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_example_plan_order() {
        let plan = Deployer::example().plan().unwrap();
        let names: Vec<_> = plan.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["SAED", "SUSD", "USDT", "SAEDSwap"]);
    }

    #[test]
    fn test_config_round_trip() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join(TARTCONF_FILENAME);
            let deployer = Deployer::example();
            deployer.save_to_file(&path).map_err(|e| e.to_string())?;

            let expected = Deployer {
                artifacts_dir: jail.directory().join("build/contracts"),
                report: jail.directory().join("deployments.json"),
                ..deployer
            };

            let loaded = Deployer::load_from_file(&path).map_err(|e| e.to_string())?;
            assert_eq!(loaded, expected);

            let from_dir = Deployer::load_from_file(jail.directory()).map_err(|e| e.to_string())?;
            assert_eq!(from_dir, expected);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_nested_network() {
        Jail::expect_with(|jail| {
            jail.create_file(
                TARTCONF_FILENAME,
                r#"
                artifacts_dir = "out"
                report = "deployments.json"

                [network]
                rpc_url = "http://127.0.0.1:8545"
                confirmations = 1
                poll_interval_ms = 500
                receipt_timeout_secs = 120
                connect_timeout_secs = 30

                [[contracts]]
                name = "SAED"
                args = ["deployer"]
                "#,
            )?;
            jail.set_env("TART_NETWORK__RPC_URL", "http://10.0.0.7:8545");

            let loaded = Deployer::load_from_file(Path::new(TARTCONF_FILENAME))
                .map_err(|e| e.to_string())?;
            assert_eq!(loaded.artifacts_dir, PathBuf::from("out"));
            assert_eq!(loaded.network.rpc_url.as_str(), "http://10.0.0.7:8545/");
            assert_eq!(loaded.contracts.len(), 1);
            Ok(())
        });
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                TARTCONF_FILENAME,
                r#"
                [[contracts]]
                name = "SAED"
                "#,
            )?;

            let loaded = Deployer::load_from_file(Path::new(TARTCONF_FILENAME))
                .map_err(|e| e.to_string())?;
            assert_eq!(loaded.network, NetworkConfig::default());
            assert_eq!(loaded.report, PathBuf::from("deployments.json"));
            Ok(())
        });
    }

    #[test]
    fn test_paths_are_relative_to_config_file() {
        Jail::expect_with(|jail| {
            std::fs::create_dir_all(jail.directory().join("sub")).map_err(|e| e.to_string())?;
            jail.create_file(
                "sub/Tart.toml",
                r#"
                artifacts_dir = "out"
                report = "/var/tmp/deployments.json"
                "#,
            )?;

            let loaded = Deployer::load_from_file(Path::new("sub/Tart.toml"))
                .map_err(|e| e.to_string())?;
            assert_eq!(loaded.artifacts_dir, PathBuf::from("sub/out"));
            assert_eq!(loaded.report, PathBuf::from("/var/tmp/deployments.json"));

            let from_dir =
                Deployer::load_from_file(Path::new("sub")).map_err(|e| e.to_string())?;
            assert_eq!(from_dir.artifacts_dir, PathBuf::from("sub/out"));
            Ok(())
        });
    }

    #[test]
    fn test_missing_config_file() {
        let err = Deployer::load_from_file(Path::new("/nonexistent/Tart.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
