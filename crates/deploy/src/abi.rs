//! Resolved constructor values and their ABI encoding.

use std::fmt;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, Bytes, U256},
};
use serde::{Deserialize, Serialize};

/// A constructor argument once every placeholder has been substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
    Bytes(Bytes),
}

impl ArgValue {
    fn to_sol_value(&self) -> DynSolValue {
        match self {
            Self::Address(address) => DynSolValue::Address(*address),
            Self::Uint(value) => DynSolValue::Uint(*value, 256),
            Self::Bool(value) => DynSolValue::Bool(*value),
            Self::String(value) => DynSolValue::String(value.clone()),
            Self::Bytes(value) => DynSolValue::Bytes(value.to_vec()),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => write!(f, "{}", address),
            Self::Uint(value) => write!(f, "{}", value),
            Self::Bool(value) => write!(f, "{}", value),
            Self::String(value) => write!(f, "{:?}", value),
            Self::Bytes(value) => write!(f, "{}", value),
        }
    }
}

/// ABI-encode constructor arguments the way they are appended to creation bytecode.
///
/// The values are encoded as a parameter list (head/tail layout, no outer offset),
/// so a constructor with no arguments yields empty bytes.
pub fn encode_constructor_args(args: &[ArgValue]) -> Bytes {
    if args.is_empty() {
        return Bytes::new();
    }

    let params = DynSolValue::Tuple(args.iter().map(ArgValue::to_sol_value).collect());
    Bytes::from(params.abi_encode_params())
}
