//! Ethereum JSON-RPC plumbing shared by the chain client.

use std::time::{Duration, Instant};

use anyhow::Context;
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

/// Default timeout for a single RPC request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client(request_timeout: Duration) -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// A JSON `null` result deserializes fine into an `Option<T>`, which is how pending
/// lookups such as `eth_getTransactionReceipt` report "not yet".
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url.clone())
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    extract_result(method, result)
}

/// Pull the `result` out of a JSON-RPC response body, surfacing `error` objects.
fn extract_result<T: DeserializeOwned>(method: &str, mut body: Value) -> Result<T, anyhow::Error> {
    if let Some(error) = body.get("error") {
        anyhow::bail!(
            "RPC error from {}: {}",
            method,
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = body
        .get_mut("result")
        .map(Value::take)
        .with_context(|| format!("No result in {} response", method))?;

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(s: &str) -> Result<u64, anyhow::Error> {
    let digits = s.trim_start_matches("0x");
    u64::from_str_radix(digits, 16).with_context(|| format!("Invalid hex quantity: {}", s))
}

/// Deserialize a u64 from a hex quantity string.
pub fn deserialize_u64_from_hex<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_quantity(&s).map_err(serde::de::Error::custom)
}

/// Wait for an endpoint to answer by repeatedly calling a check function.
///
/// # Arguments
/// * `name` - Name of the endpoint (for error messages)
/// * `timeout` - Maximum time to wait
/// * `poll_interval` - Delay between two attempts
/// * `check_fn` - Function that returns the value once the endpoint is ready
pub async fn wait_until_ready<T, F, Fut>(
    name: &str,
    timeout: Duration,
    poll_interval: Duration,
    check_fn: F,
) -> Result<T, anyhow::Error>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = Instant::now();

    loop {
        match check_fn().await {
            Ok(value) => return Ok(value),
            Err(e) if start.elapsed() >= timeout => {
                return Err(e.context(format!("Timeout waiting for {} to be ready", name)));
            }
            Err(e) => {
                tracing::trace!(error = %e, endpoint = %name, "Readiness check failed, retrying...");
            }
        }

        tokio::time::sleep(poll_interval).await;
    }
}
