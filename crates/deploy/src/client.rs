//! Submission of contract creations to a chain.
//!
//! [`ChainClient`] is the seam between the orchestrator and the network. [`JsonRpcClient`]
//! implements it against a node that holds an unlocked deployer account (Anvil, Ganache,
//! Hardhat node), so no signing happens here.

use std::future::Future;
use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes};
use anyhow::{Context, Result};
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::{config::NetworkConfig, rpc};

/// On-chain confirmation of a contract creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: u64,
}

/// A client able to deploy contracts and wait for their confirmation.
pub trait ChainClient: Send + Sync {
    /// The account deployments are sent from.
    fn deployer(&self) -> Address;

    /// The chain the client submits to.
    fn chain_id(&self) -> u64;

    /// Submit `bytecode` followed by the encoded `constructor_args` as a contract creation,
    /// resolving once the creation is confirmed.
    fn submit(
        &self,
        bytecode: &Bytes,
        constructor_args: &Bytes,
    ) -> impl Future<Output = Result<Confirmation>> + Send;

    /// Runtime code currently stored at `address`. Empty when nothing is deployed there.
    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Subset of `eth_getTransactionReceipt` needed to confirm a creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: B256,
    #[serde(default)]
    contract_address: Option<Address>,
    /// Absent on pre-Byzantium chains.
    #[serde(default)]
    status: Option<String>,
    #[serde(deserialize_with = "rpc::deserialize_u64_from_hex")]
    block_number: u64,
}

impl TransactionReceipt {
    fn into_confirmation(self) -> Result<Confirmation> {
        if let Some(status) = &self.status {
            if rpc::parse_quantity(status)? == 0 {
                anyhow::bail!(
                    "Transaction {} reverted in block {}",
                    self.transaction_hash,
                    self.block_number
                );
            }
        }

        let address = self.contract_address.with_context(|| {
            format!(
                "Receipt of {} carries no contract address",
                self.transaction_hash
            )
        })?;

        Ok(Confirmation {
            address,
            tx_hash: self.transaction_hash,
            block_number: self.block_number,
        })
    }
}

/// [`ChainClient`] speaking Ethereum JSON-RPC over HTTP.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: Url,
    chain_id: u64,
    from: Address,
    gas: Option<u64>,
    confirmations: u64,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl JsonRpcClient {
    /// Wait for the node to answer, then pick the deployer account.
    ///
    /// The deployer is `network.from` when set, otherwise the node's first account.
    pub async fn connect(network: &NetworkConfig) -> Result<Self> {
        let http = rpc::create_client(rpc::DEFAULT_REQUEST_TIMEOUT)?;
        let url = network.rpc_url.clone();

        let (http_ref, url_ref) = (&http, &url);
        let chain_id = rpc::wait_until_ready(
            url.as_str(),
            network.connect_timeout(),
            network.poll_interval(),
            || async move {
                let chain_id: String =
                    rpc::json_rpc_call(http_ref, url_ref, "eth_chainId", vec![]).await?;
                rpc::parse_quantity(&chain_id)
            },
        )
        .await?;

        let from = match network.from {
            Some(from) => from,
            None => {
                let accounts: Vec<Address> =
                    rpc::json_rpc_call(&http, &url, "eth_accounts", vec![]).await?;
                accounts.first().copied().context(
                    "Node exposes no unlocked account; set `network.from` to a funded account",
                )?
            }
        };

        tracing::info!(rpc_url = %url, chain_id, deployer = %from, "Connected to node");

        Ok(Self {
            http,
            url,
            chain_id,
            from,
            gas: network.gas,
            confirmations: network.confirmations,
            poll_interval: network.poll_interval(),
            receipt_timeout: network.receipt_timeout(),
        })
    }

    async fn send_creation(&self, data: Bytes) -> Result<B256> {
        let mut tx = json!({
            "from": self.from,
            "data": data,
        });
        if let Some(gas) = self.gas {
            tx["gas"] = json!(format!("0x{:x}", gas));
        }

        rpc::json_rpc_call(&self.http, &self.url, "eth_sendTransaction", vec![tx])
            .await
            .context("Failed to send deployment transaction")
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt> {
        let (http, url) = (&self.http, &self.url);
        let fetch = move || async move {
            let receipt: Option<TransactionReceipt> = rpc::json_rpc_call(
                http,
                url,
                "eth_getTransactionReceipt",
                vec![json!(tx_hash)],
            )
            .await?;
            receipt.with_context(|| format!("Receipt for {} not available yet", tx_hash))
        };

        let polling = fetch
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.poll_interval)
                    .with_max_times(usize::MAX),
            )
            .notify(|err: &anyhow::Error, _| {
                tracing::trace!(tx_hash = %tx_hash, error = %err, "Waiting for receipt...");
            });

        // Bounded by wall-clock time, whatever the poll interval.
        match tokio::time::timeout(self.receipt_timeout, polling).await {
            Ok(receipt) => receipt,
            Err(_) => anyhow::bail!(
                "Transaction {} not mined within {}s",
                tx_hash,
                self.receipt_timeout.as_secs()
            ),
        }
    }

    async fn wait_for_confirmations(&self, block_number: u64) -> Result<()> {
        if self.confirmations <= 1 {
            return Ok(());
        }

        let target = block_number.saturating_add(self.confirmations - 1);
        let (http, url) = (&self.http, &self.url);

        rpc::wait_until_ready(
            "confirmations",
            self.receipt_timeout,
            self.poll_interval,
            || async move {
                let head: String = rpc::json_rpc_call(http, url, "eth_blockNumber", vec![]).await?;
                let head = rpc::parse_quantity(&head)?;
                if head < target {
                    anyhow::bail!("head at block {}, waiting for block {}", head, target);
                }
                Ok(())
            },
        )
        .await
    }
}

impl ChainClient for JsonRpcClient {
    fn deployer(&self) -> Address {
        self.from
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn submit(&self, bytecode: &Bytes, constructor_args: &Bytes) -> Result<Confirmation> {
        let mut data = Vec::with_capacity(bytecode.len() + constructor_args.len());
        data.extend_from_slice(bytecode);
        data.extend_from_slice(constructor_args);

        let tx_hash = self.send_creation(Bytes::from(data)).await?;
        tracing::debug!(tx_hash = %tx_hash, "Deployment transaction sent, waiting for receipt");

        let confirmation = self.wait_for_receipt(tx_hash).await?.into_confirmation()?;
        self.wait_for_confirmations(confirmation.block_number).await?;

        Ok(confirmation)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        rpc::json_rpc_call(
            &self.http,
            &self.url,
            "eth_getCode",
            vec![json!(address), json!("latest")],
        )
        .await
        .with_context(|| format!("Failed to fetch code at {}", address))
    }
}
