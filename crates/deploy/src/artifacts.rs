//! Lookup of compiled contract bytecode by contract name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Compiled creation bytecode for a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub bytecode: Bytes,
}

/// Read-only source of compiled artifacts, keyed by name.
pub trait ArtifactProvider {
    fn artifact(&self, name: &str) -> Result<Artifact>;
}

/// Bytecode field of a compiler output file.
///
/// Truffle writes a plain hex string, Foundry nests it under `object`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    Hex(String),
    Object { object: String },
}

#[derive(Debug, Deserialize)]
struct ArtifactFile {
    bytecode: BytecodeField,
}

/// Artifacts stored in a build directory.
///
/// `<dir>/<name>.json` compiler output is preferred; `<dir>/<name>.bin` holding raw hex
/// is used when no JSON file exists.
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_json(path: &Path) -> Result<String> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: ArtifactFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        Ok(match file.bytecode {
            BytecodeField::Hex(hex) => hex,
            BytecodeField::Object { object } => object,
        })
    }
}

impl ArtifactProvider for ArtifactDir {
    fn artifact(&self, name: &str) -> Result<Artifact> {
        let json_path = self.root.join(format!("{name}.json"));
        let bin_path = self.root.join(format!("{name}.bin"));

        let hex = if json_path.exists() {
            Self::read_json(&json_path)?
        } else if bin_path.exists() {
            std::fs::read_to_string(&bin_path)
                .with_context(|| format!("Failed to read {}", bin_path.display()))?
        } else {
            anyhow::bail!(
                "No artifact for `{name}` in {} (looked for {name}.json and {name}.bin)",
                self.root.display()
            );
        };

        let bytecode = parse_bytecode(&hex)
            .with_context(|| format!("Invalid bytecode in artifact `{}`", name))?;

        tracing::debug!(contract = %name, size = bytecode.len(), "Loaded artifact");

        Ok(Artifact {
            name: name.to_string(),
            bytecode,
        })
    }
}

/// Artifacts held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifacts(HashMap<String, Bytes>);

impl InMemoryArtifacts {
    pub fn insert(&mut self, name: impl Into<String>, bytecode: Bytes) -> &mut Self {
        self.0.insert(name.into(), bytecode);
        self
    }
}

impl ArtifactProvider for InMemoryArtifacts {
    fn artifact(&self, name: &str) -> Result<Artifact> {
        let bytecode = self
            .0
            .get(name)
            .cloned()
            .with_context(|| format!("No artifact for `{}`", name))?;

        Ok(Artifact {
            name: name.to_string(),
            bytecode,
        })
    }
}

/// Decode creation bytecode from hex, with or without the `0x` prefix.
fn parse_bytecode(hex_str: &str) -> Result<Bytes> {
    let trimmed = hex_str.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if digits.is_empty() {
        anyhow::bail!("bytecode is empty (abstract contract or interface?)");
    }

    let bytes = hex::decode(digits).context("bytecode is not valid hex")?;
    Ok(Bytes::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_truffle_artifact() {
        let dir = TempDir::new("tart-artifacts").unwrap();
        std::fs::write(
            dir.path().join("SAED.json"),
            r#"{"contractName":"SAED","abi":[],"bytecode":"0x6080604052"}"#,
        )
        .unwrap();

        let artifact = ArtifactDir::new(dir.path()).artifact("SAED").unwrap();
        assert_eq!(artifact.name, "SAED");
        assert_eq!(artifact.bytecode.to_vec(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);
    }

    #[test]
    fn test_foundry_artifact() {
        let dir = TempDir::new("tart-artifacts").unwrap();
        std::fs::write(
            dir.path().join("SUSD.json"),
            r#"{"abi":[],"bytecode":{"object":"0x6001","sourceMap":""}}"#,
        )
        .unwrap();

        let artifact = ArtifactDir::new(dir.path()).artifact("SUSD").unwrap();
        assert_eq!(artifact.bytecode.to_vec(), vec![0x60, 0x01]);
    }

    #[test]
    fn test_bin_fallback() {
        let dir = TempDir::new("tart-artifacts").unwrap();
        std::fs::write(dir.path().join("USDT.bin"), "600a\n").unwrap();

        let artifact = ArtifactDir::new(dir.path()).artifact("USDT").unwrap();
        assert_eq!(artifact.bytecode.to_vec(), vec![0x60, 0x0a]);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new("tart-artifacts").unwrap();
        let err = ArtifactDir::new(dir.path()).artifact("Nope").unwrap_err();
        assert!(err.to_string().contains("No artifact for `Nope`"));
    }

    #[test]
    fn test_empty_bytecode_is_rejected() {
        let dir = TempDir::new("tart-artifacts").unwrap();
        std::fs::write(dir.path().join("IERC20.json"), r#"{"bytecode":"0x"}"#).unwrap();

        assert!(ArtifactDir::new(dir.path()).artifact("IERC20").is_err());
    }

    #[test]
    fn test_invalid_hex_is_rejected() {
        assert!(parse_bytecode("0xzz").is_err());
        assert!(parse_bytecode("0x123").is_err());
        assert_eq!(parse_bytecode("  0x00ff ").unwrap().to_vec(), vec![0x00, 0xff]);
    }
}
