//! Deployment plans: which contracts to deploy, in which order, with which arguments.
//!
//! A [`DeploymentPlan`] is an ordered list of [`ContractSpec`]. Constructor arguments may
//! reference a contract deployed earlier in the plan by name; the reference is replaced by
//! that contract's address when the step runs.
//!
//! Plans either keep the order they are given ([`DeploymentPlan::new`]) or derive it from
//! the references between contracts ([`DeploymentPlan::from_graph`]).

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use alloy_core::primitives::{Address, Bytes, U256};
use derive_more::Deref;
use serde::{Deserialize, Serialize};

/// Template for one constructor argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructorArg {
    /// The account submitting the deployment.
    Deployer,
    /// The address of a contract deployed earlier in the plan.
    Contract(String),
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
    Bytes(Bytes),
}

impl ConstructorArg {
    /// Reference to another contract's deployment, if any.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::Contract(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for ConstructorArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deployer => write!(f, "<deployer>"),
            Self::Contract(name) => write!(f, "{}.address", name),
            Self::Address(address) => write!(f, "{}", address),
            Self::Uint(value) => write!(f, "{}", value),
            Self::Bool(value) => write!(f, "{}", value),
            Self::String(value) => write!(f, "{:?}", value),
            Self::Bytes(value) => write!(f, "{}", value),
        }
    }
}

/// A single contract to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
    /// Unique name of the deployment within the plan.
    pub name: String,
    /// Name of the compiled artifact. Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    /// Constructor argument template, in constructor order.
    #[serde(default)]
    pub args: Vec<ConstructorArg>,
}

impl ContractSpec {
    /// Create a spec deploying the artifact of the same name with no constructor arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artifact: None,
            args: Vec::new(),
        }
    }

    /// Deploy a differently named artifact under this spec's name.
    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }

    /// Append a constructor argument.
    pub fn arg(mut self, arg: ConstructorArg) -> Self {
        self.args.push(arg);
        self
    }

    /// The artifact to look up for this spec.
    pub fn artifact_name(&self) -> &str {
        self.artifact.as_deref().unwrap_or(&self.name)
    }

    /// Names of the contracts this spec depends on, in argument order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(ConstructorArg::reference)
    }
}

/// Errors found while building or validating a [`DeploymentPlan`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("contract `{0}` is declared more than once")]
    DuplicateContract(String),
    #[error("contract `{contract}` references unknown contract `{reference}`")]
    UnknownReference { contract: String, reference: String },
    #[error("contract `{contract}` references `{reference}`, which is not deployed before it")]
    ForwardReference { contract: String, reference: String },
    #[error("dependency cycle between contracts: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// An ordered sequence of contracts to deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Deref)]
#[serde(transparent)]
pub struct DeploymentPlan(Vec<ContractSpec>);

impl DeploymentPlan {
    /// Create a plan that deploys the specs in exactly the given order.
    ///
    /// The order is not checked here, see [`DeploymentPlan::validate`].
    pub fn new(specs: Vec<ContractSpec>) -> Self {
        Self(specs)
    }

    /// Order the specs so that every contract comes after the contracts it references.
    ///
    /// Among contracts whose dependencies are already placed, the one declared first is
    /// placed next, so an input that is already in a valid order is kept as is.
    pub fn from_graph(specs: Vec<ContractSpec>) -> Result<Self, PlanError> {
        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.name.as_str(), i).is_some() {
                return Err(PlanError::DuplicateContract(spec.name.clone()));
            }
        }

        let mut in_degree = vec![0usize; specs.len()];
        let mut dependents = vec![Vec::new(); specs.len()];

        for (i, spec) in specs.iter().enumerate() {
            let mut deps = BTreeSet::new();
            for reference in spec.references() {
                let dep = *index
                    .get(reference)
                    .ok_or_else(|| PlanError::UnknownReference {
                        contract: spec.name.clone(),
                        reference: reference.to_string(),
                    })?;
                deps.insert(dep);
            }

            in_degree[i] = deps.len();
            for dep in deps {
                dependents[dep].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = (0..specs.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(specs.len());

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for &dependent in &dependents[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() < specs.len() {
            let stuck = specs
                .iter()
                .enumerate()
                .filter(|(i, _)| in_degree[*i] > 0)
                .map(|(_, spec)| spec.name.clone())
                .collect();
            return Err(PlanError::Cycle(stuck));
        }

        let mut slots: Vec<Option<ContractSpec>> = specs.into_iter().map(Some).collect();
        let ordered = order.into_iter().filter_map(|i| slots[i].take()).collect();

        Ok(Self(ordered))
    }

    /// Check that names are unique and that every reference points at an earlier entry.
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut names = HashSet::with_capacity(self.len());
        for spec in self.iter() {
            if !names.insert(spec.name.as_str()) {
                return Err(PlanError::DuplicateContract(spec.name.clone()));
            }
        }

        let mut placed = HashSet::with_capacity(self.len());
        for spec in self.iter() {
            for reference in spec.references() {
                if placed.contains(reference) {
                    continue;
                }

                let (contract, reference) = (spec.name.clone(), reference.to_string());
                return Err(if names.contains(reference.as_str()) {
                    PlanError::ForwardReference {
                        contract,
                        reference,
                    }
                } else {
                    PlanError::UnknownReference {
                        contract,
                        reference,
                    }
                });
            }
            placed.insert(spec.name.as_str());
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a DeploymentPlan {
    type Item = &'a ContractSpec;
    type IntoIter = std::slice::Iter<'a, ContractSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (step, spec) in self.iter().enumerate() {
            let args = spec
                .args
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, "{:>2}. {}({})", step + 1, spec.name, args)?;
            if spec.artifact_name() != spec.name {
                write!(f, " [artifact: {}]", spec.artifact_name())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
