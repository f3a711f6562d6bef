//! Network settings and layered configuration loading.

use std::path::Path;
use std::time::Duration;

use alloy_core::primitives::Address;
use anyhow::Result;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;

/// The default name for the tart configuration file.
pub const TARTCONF_FILENAME: &str = "Tart.toml";

/// Prefix of the environment variables overriding configuration values.
///
/// Nested keys are separated by a double underscore: `TART_NETWORK__RPC_URL`.
pub const ENV_PREFIX: &str = "TART_";

/// Default node endpoint (a local development node).
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Connection and confirmation settings for the target node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint of the node.
    pub rpc_url: Url,
    /// Account deployments are sent from. Defaults to the node's first account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Blocks (including the inclusion block) to wait for before a deployment counts
    /// as confirmed.
    pub confirmations: u64,
    /// Gas limit for deployment transactions. Left to the node when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    pub poll_interval_ms: u64,
    pub receipt_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: Url::parse(DEFAULT_RPC_URL).expect("default RPC URL is valid"),
            from: None,
            confirmations: 1,
            gas: None,
            poll_interval_ms: 500,
            receipt_timeout_secs: 120,
            connect_timeout_secs: 30,
        }
    }
}

impl NetworkConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Load a configuration: `defaults`, overlaid by the TOML file at `path`, overlaid by
/// `TART_`-prefixed environment variables.
pub fn load_layered<T>(defaults: &T, path: &Path) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    Figment::from(Serialized::defaults(defaults))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| anyhow::anyhow!("Failed to load config from {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let network = NetworkConfig::default();
        assert_eq!(network.rpc_url.as_str(), "http://127.0.0.1:8545/");
        assert_eq!(network.poll_interval(), Duration::from_millis(500));
        assert_eq!(network.receipt_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_file_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "net.toml",
                r#"
                rpc_url = "http://10.0.0.2:8545"
                confirmations = 3
                "#,
            )?;

            let network = load_layered(&NetworkConfig::default(), Path::new("net.toml"))
                .map_err(|e| e.to_string())?;
            assert_eq!(network.rpc_url.as_str(), "http://10.0.0.2:8545/");
            assert_eq!(network.confirmations, 3);
            assert_eq!(network.receipt_timeout_secs, 120);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("net.toml", "confirmations = 3")?;
            jail.set_env("TART_CONFIRMATIONS", "5");
            jail.set_env("TART_FROM", "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

            let network = load_layered(&NetworkConfig::default(), Path::new("net.toml"))
                .map_err(|e| e.to_string())?;
            assert_eq!(network.confirmations, 5);
            assert_eq!(
                network.from.map(|a| a.to_string()),
                Some("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".to_string())
            );
            Ok(())
        });
    }
}
