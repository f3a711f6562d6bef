//! Deployment reports persisted after a successful run.

use std::fmt;
use std::path::Path;

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use comfy_table::{Table, presets::UTF8_FULL};
use serde::{Deserialize, Serialize};

use crate::DeploymentResult;

/// Outcome of a complete plan execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub chain_id: u64,
    pub deployer: Address,
    /// Hash of the [`crate::DeploymentFingerprint`] the run was started from.
    pub plan_hash: String,
    /// Unix timestamp (seconds) at which the run completed.
    pub deployed_at: i64,
    pub tart_version: String,
    /// One entry per plan step, in plan order.
    pub contracts: Vec<DeploymentResult>,
}

impl DeploymentReport {
    pub fn new(
        chain_id: u64,
        deployer: Address,
        plan_hash: String,
        contracts: Vec<DeploymentResult>,
    ) -> Self {
        Self {
            chain_id,
            deployer,
            plan_hash,
            deployed_at: chrono::Utc::now().timestamp(),
            tart_version: env!("CARGO_PKG_VERSION").to_string(),
            contracts,
        }
    }

    /// Address of the contract deployed under `name`.
    pub fn address_of(&self, name: &str) -> Option<Address> {
        self.contracts
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.address)
    }

    /// Save the report as pretty-printed JSON, creating parent directories as needed.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment report")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;

        tracing::info!(path = %path.display(), "Deployment report saved");
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read report from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse report {}", path.display()))
    }

    /// Load the report at `path` if one exists.
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from_file(path).map(Some)
    }
}

/// Render deployment results as a table: one row per contract.
pub fn results_table(results: &[DeploymentResult]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "Contract", "Address", "Block", "Transaction"]);

    for (step, result) in results.iter().enumerate() {
        let name = if result.artifact == result.name {
            result.name.clone()
        } else {
            format!("{} ({})", result.name, result.artifact)
        };

        table.add_row(vec![
            (step + 1).to_string(),
            name,
            result.address.to_string(),
            result.block_number.to_string(),
            result.tx_hash.to_string(),
        ]);
    }

    table
}

impl fmt::Display for DeploymentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Chain ID:   {}", self.chain_id)?;
        writeln!(f, "Deployer:   {}", self.deployer)?;
        writeln!(f, "Plan hash:  {}", self.plan_hash)?;
        if let Some(at) = chrono::DateTime::from_timestamp(self.deployed_at, 0) {
            writeln!(f, "Deployed:   {}", at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        }
        write!(f, "{}", results_table(&self.contracts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArgValue;
    use alloy_core::primitives::B256;
    use tempdir::TempDir;

    fn result(name: &str, last_byte: u8) -> DeploymentResult {
        DeploymentResult {
            name: name.to_string(),
            artifact: name.to_string(),
            address: Address::with_last_byte(last_byte),
            tx_hash: B256::with_last_byte(last_byte),
            block_number: last_byte as u64,
            constructor_args: vec![ArgValue::Address(Address::with_last_byte(0xff))],
        }
    }

    fn report() -> DeploymentReport {
        DeploymentReport::new(
            1337,
            Address::with_last_byte(0xff),
            "ab".repeat(32),
            vec![result("SAED", 1), result("SAEDSwap", 2)],
        )
    }

    #[test]
    fn test_address_of() {
        let report = report();
        assert_eq!(report.address_of("SAEDSwap"), Some(Address::with_last_byte(2)));
        assert_eq!(report.address_of("USDT"), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new("tart-report").unwrap();
        let path = dir.path().join("out").join("deployments.json");

        let report = report();
        report.save_to_file(&path).unwrap();

        assert_eq!(DeploymentReport::load_from_file(&path).unwrap(), report);
        assert_eq!(DeploymentReport::load_if_exists(&path).unwrap(), Some(report));
    }

    #[test]
    fn test_load_if_exists_without_file() {
        let dir = TempDir::new("tart-report").unwrap();
        let path = dir.path().join("deployments.json");

        assert_eq!(DeploymentReport::load_if_exists(&path).unwrap(), None);
    }

    #[test]
    fn test_version_is_recorded() {
        assert_eq!(report().tart_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_table_lists_contracts_in_order() {
        let rendered = results_table(&report().contracts).to_string();

        let saed = rendered.find("SAED ").unwrap();
        let swap = rendered.find("SAEDSwap").unwrap();
        assert!(saed < swap);
        assert!(rendered.contains(&Address::with_last_byte(2).to_string()));
    }
}
