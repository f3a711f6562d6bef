//! tart-deploy - Ordered smart-contract deployment.
//!
//! This crate deploys a plan of contracts to an Ethereum node, one after the other,
//! feeding the addresses of earlier deployments into the constructors of later ones.

mod abi;
pub use abi::{ArgValue, encode_constructor_args};

mod artifacts;
pub use artifacts::{Artifact, ArtifactDir, ArtifactProvider, InMemoryArtifacts};

mod client;
pub use client::{ChainClient, Confirmation, JsonRpcClient};

mod config;
pub use config::{DEFAULT_RPC_URL, ENV_PREFIX, NetworkConfig, TARTCONF_FILENAME};

mod deployer;
pub use deployer::Deployer;

mod deployment_hash;
pub use deployment_hash::{ContractFingerprint, DeploymentFingerprint};

mod orchestrator;
pub use orchestrator::{
    DeployError, DeploymentResult, Orchestrator, PlanAborted, load_artifacts, resolve_args,
};

mod plan;
pub use plan::{ConstructorArg, ContractSpec, DeploymentPlan, PlanError};

mod report;
pub use report::{DeploymentReport, results_table};

mod rpc;
