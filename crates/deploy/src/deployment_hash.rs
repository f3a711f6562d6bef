use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{ArtifactProvider, ConstructorArg, DeploymentPlan};

/// The deployment-relevant view of a single plan entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFingerprint {
    pub name: String,
    pub artifact: String,
    pub args: Vec<ConstructorArg>,
    /// SHA-256 of the creation bytecode, hex encoded.
    pub code_hash: String,
}

/// Everything that, when changed, makes an earlier deployment stale.
///
/// Runtime-only settings (polling, timeouts, confirmations, gas) are excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentFingerprint {
    pub chain_id: u64,
    pub deployer: Address,
    pub contracts: Vec<ContractFingerprint>,
}

impl DeploymentFingerprint {
    /// Fingerprint `plan` as it would be deployed by `deployer` on `chain_id`.
    pub fn new(
        chain_id: u64,
        deployer: Address,
        plan: &DeploymentPlan,
        artifacts: &impl ArtifactProvider,
    ) -> Result<Self> {
        let contracts = plan
            .iter()
            .map(|spec| -> Result<ContractFingerprint> {
                let artifact = artifacts
                    .artifact(spec.artifact_name())
                    .with_context(|| format!("Failed to fingerprint `{}`", spec.name))?;

                Ok(ContractFingerprint {
                    name: spec.name.clone(),
                    artifact: spec.artifact_name().to_string(),
                    args: spec.args.clone(),
                    code_hash: hex::encode(Sha256::digest(&artifact.bytecode)),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            chain_id,
            deployer,
            contracts,
        })
    }

    /// Compute a SHA-256 hash of this fingerprint.
    ///
    /// The same fingerprint always produces the same hash: fields serialize in
    /// declaration order and contracts in plan order.
    pub fn compute_hash(&self) -> String {
        let json = serde_json::to_string(self)
            .expect("DeploymentFingerprint serialization should never fail");

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContractSpec, InMemoryArtifacts};
    use alloy_core::primitives::{Bytes, address};

    const DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    fn artifacts() -> InMemoryArtifacts {
        let mut artifacts = InMemoryArtifacts::default();
        artifacts.insert("SAED", Bytes::from_static(&[0x60, 0x01]));
        artifacts.insert("SAEDSwap", Bytes::from_static(&[0x60, 0x02]));
        artifacts
    }

    fn plan() -> DeploymentPlan {
        DeploymentPlan::new(vec![
            ContractSpec::new("SAED").arg(ConstructorArg::Deployer),
            ContractSpec::new("SAEDSwap").arg(ConstructorArg::Contract("SAED".to_string())),
        ])
    }

    fn fingerprint() -> DeploymentFingerprint {
        DeploymentFingerprint::new(1337, DEPLOYER, &plan(), &artifacts()).unwrap()
    }

    #[test]
    fn test_hash_determinism() {
        let hash1 = fingerprint().compute_hash();
        let hash2 = fingerprint().compute_hash();

        assert_eq!(hash1, hash2, "Hash should be deterministic");
        assert_eq!(hash1.len(), 64, "SHA-256 hash should be 64 hex characters");
    }

    #[test]
    fn test_code_hash_is_sha256_of_bytecode() {
        assert_eq!(
            fingerprint().contracts[0].code_hash,
            hex::encode(Sha256::digest([0x60u8, 0x01]))
        );
    }

    #[test]
    fn test_hash_changes_with_chain_id() {
        let mut other = fingerprint();
        other.chain_id = 1;

        assert_ne!(fingerprint().compute_hash(), other.compute_hash());
    }

    #[test]
    fn test_hash_changes_with_deployer() {
        let mut other = fingerprint();
        other.deployer = Address::ZERO;

        assert_ne!(fingerprint().compute_hash(), other.compute_hash());
    }

    #[test]
    fn test_hash_changes_with_bytecode() {
        let mut changed = artifacts();
        changed.insert("SAEDSwap", Bytes::from_static(&[0x60, 0x03]));
        let other = DeploymentFingerprint::new(1337, DEPLOYER, &plan(), &changed).unwrap();

        assert_ne!(fingerprint().compute_hash(), other.compute_hash());
    }

    #[test]
    fn test_hash_changes_with_args() {
        let plan = DeploymentPlan::new(vec![
            ContractSpec::new("SAED").arg(ConstructorArg::Address(Address::ZERO)),
            ContractSpec::new("SAEDSwap").arg(ConstructorArg::Contract("SAED".to_string())),
        ]);
        let other = DeploymentFingerprint::new(1337, DEPLOYER, &plan, &artifacts()).unwrap();

        assert_ne!(fingerprint().compute_hash(), other.compute_hash());
    }

    #[test]
    fn test_missing_artifact_fails() {
        let plan = DeploymentPlan::new(vec![ContractSpec::new("USDT")]);
        let err = DeploymentFingerprint::new(1337, DEPLOYER, &plan, &artifacts()).unwrap_err();

        assert!(err.to_string().contains("Failed to fingerprint `USDT`"));
    }
}
