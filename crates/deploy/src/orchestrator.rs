//! Serial execution of a [`DeploymentPlan`].
//!
//! Each step resolves its constructor arguments against the results recorded so far,
//! submits the creation and waits for its confirmation before the next step starts.
//! The first failing step aborts the run. Contracts confirmed before it stay deployed
//! and are handed back to the caller in [`PlanAborted::completed`].

use alloy_core::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::{
    ArgValue, ArtifactProvider, ChainClient, ConstructorArg, ContractSpec, DeploymentPlan,
    InMemoryArtifacts, abi::encode_constructor_args,
};

/// A confirmed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub name: String,
    pub artifact: String,
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: u64,
    /// Constructor arguments as they were submitted.
    pub constructor_args: Vec<ArgValue>,
}

/// Why a single step could not be deployed.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("contract `{contract}` references `{reference}`, which has not been deployed")]
    UnresolvedDependency { contract: String, reference: String },
    #[error("artifact for `{name}` is unavailable")]
    ArtifactUnavailable {
        name: String,
        #[source]
        cause: anyhow::Error,
    },
    #[error("deployment of `{name}` failed")]
    DeploymentFailed {
        name: String,
        #[source]
        cause: anyhow::Error,
    },
}

impl DeployError {
    /// Name of the contract whose step failed.
    pub fn contract(&self) -> &str {
        match self {
            Self::UnresolvedDependency { contract, .. } => contract,
            Self::ArtifactUnavailable { name, .. } | Self::DeploymentFailed { name, .. } => name,
        }
    }
}

/// A run stopped at `step` (zero-based) after deploying `completed`.
#[derive(Debug, thiserror::Error)]
#[error("deployment aborted at step {} of {}", .step + 1, .total)]
pub struct PlanAborted {
    pub completed: Vec<DeploymentResult>,
    pub step: usize,
    pub total: usize,
    #[source]
    pub error: DeployError,
}

/// Runs plans against an artifact provider and a chain client.
pub struct Orchestrator<'a, A, C> {
    artifacts: &'a A,
    client: &'a C,
}

impl<'a, A, C> Orchestrator<'a, A, C>
where
    A: ArtifactProvider,
    C: ChainClient,
{
    pub fn new(artifacts: &'a A, client: &'a C) -> Self {
        Self { artifacts, client }
    }

    /// Deploy every contract of `plan` in order, one at a time.
    ///
    /// Returns one result per spec, in plan order.
    pub async fn execute(&self, plan: &DeploymentPlan) -> Result<Vec<DeploymentResult>, PlanAborted> {
        let total = plan.len();
        let mut results: Vec<DeploymentResult> = Vec::with_capacity(total);

        for (step, spec) in plan.iter().enumerate() {
            match self.deploy_step(step, total, spec, &results).await {
                Ok(result) => results.push(result),
                Err(error) => {
                    return Err(PlanAborted {
                        completed: results,
                        step,
                        total,
                        error,
                    });
                }
            }
        }

        Ok(results)
    }

    async fn deploy_step(
        &self,
        step: usize,
        total: usize,
        spec: &ContractSpec,
        completed: &[DeploymentResult],
    ) -> Result<DeploymentResult, DeployError> {
        let constructor_args = resolve_args(spec, self.client.deployer(), completed)?;

        let artifact = self
            .artifacts
            .artifact(spec.artifact_name())
            .map_err(|cause| DeployError::ArtifactUnavailable {
                name: spec.name.clone(),
                cause,
            })?;

        tracing::info!(
            step = step + 1,
            total,
            contract = %spec.name,
            args = %render_args(&constructor_args),
            "Deploying contract..."
        );

        let encoded = encode_constructor_args(&constructor_args);
        let confirmation = self
            .client
            .submit(&artifact.bytecode, &encoded)
            .await
            .map_err(|cause| DeployError::DeploymentFailed {
                name: spec.name.clone(),
                cause,
            })?;

        tracing::info!(
            contract = %spec.name,
            address = %confirmation.address,
            tx_hash = %confirmation.tx_hash,
            block = confirmation.block_number,
            "Contract deployed"
        );

        Ok(DeploymentResult {
            name: spec.name.clone(),
            artifact: spec.artifact_name().to_string(),
            address: confirmation.address,
            tx_hash: confirmation.tx_hash,
            block_number: confirmation.block_number,
            constructor_args,
        })
    }
}

/// Look up the artifact of every step of `plan` once, before anything is submitted.
///
/// The first missing artifact aborts the plan at its step with no contract deployed.
pub fn load_artifacts<A: ArtifactProvider>(
    plan: &DeploymentPlan,
    artifacts: &A,
) -> Result<InMemoryArtifacts, PlanAborted> {
    let mut loaded = InMemoryArtifacts::default();

    for (step, spec) in plan.iter().enumerate() {
        let artifact = artifacts
            .artifact(spec.artifact_name())
            .map_err(|cause| PlanAborted {
                completed: Vec::new(),
                step,
                total: plan.len(),
                error: DeployError::ArtifactUnavailable {
                    name: spec.name.clone(),
                    cause,
                },
            })?;
        loaded.insert(artifact.name, artifact.bytecode);
    }

    Ok(loaded)
}

/// Substitute placeholders in the spec's argument template.
///
/// `deployer` becomes the deploying account and `contract(name)` the address recorded
/// for `name` in `completed`.
pub fn resolve_args(
    spec: &ContractSpec,
    deployer: Address,
    completed: &[DeploymentResult],
) -> Result<Vec<ArgValue>, DeployError> {
    spec.args
        .iter()
        .map(|arg| -> Result<ArgValue, DeployError> {
            Ok(match arg {
                ConstructorArg::Deployer => ArgValue::Address(deployer),
                ConstructorArg::Contract(reference) => {
                    let result = completed
                        .iter()
                        .find(|result| &result.name == reference)
                        .ok_or_else(|| DeployError::UnresolvedDependency {
                            contract: spec.name.clone(),
                            reference: reference.clone(),
                        })?;
                    ArgValue::Address(result.address)
                }
                ConstructorArg::Address(address) => ArgValue::Address(*address),
                ConstructorArg::Uint(value) => ArgValue::Uint(*value),
                ConstructorArg::Bool(value) => ArgValue::Bool(*value),
                ConstructorArg::String(value) => ArgValue::String(value.clone()),
                ConstructorArg::Bytes(value) => ArgValue::Bytes(value.clone()),
            })
        })
        .collect()
}

fn render_args(args: &[ArgValue]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
