//! JSON-RPC implementation of the remote boundary.

use std::time::{Duration, Instant};

use alloy_core::primitives::{Address, B256, Bytes, U64};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

use super::{
    ArtifactStore, CallRequest, ChainClient, DeployRequest, Receipt, RemoteCallError,
    encode_arguments,
};

/// Timeout of a single HTTP request. Waiting for a transaction is not bounded by it.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between receipt polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    method: &str,
    params: Vec<Value>,
) -> Result<T, RemoteCallError> {
    let response: Value = client
        .post(url.clone())
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await?
        .json()
        .await?;

    if let Some(error) = response.get("error") {
        return Err(RemoteCallError::Rpc {
            method: method.to_string(),
            message: error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string(),
        });
    }

    let result = response.get("result").cloned().unwrap_or(Value::Null);
    serde_json::from_value(result).map_err(|source| RemoteCallError::Decode {
        method: method.to_string(),
        source,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: B256,
    status: Option<U64>,
    contract_address: Option<Address>,
}

/// Sends transactions from an account unlocked on the node (`eth_sendTransaction`) and
/// waits for them to be mined.
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    http: reqwest::Client,
    url: Url,
    sender: Address,
    artifacts: ArtifactStore,
    poll_interval: Duration,
    receipt_timeout: Option<Duration>,
}

impl RpcChainClient {
    pub fn new(url: &str, sender: Address, artifacts: ArtifactStore) -> Result<Self, RemoteCallError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            url: Url::parse(url)?,
            sender,
            artifacts,
            poll_interval: DEFAULT_POLL_INTERVAL,
            receipt_timeout: None,
        })
    }

    /// Set the interval between receipt polls.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Bound the time spent waiting for a transaction. `None` waits indefinitely.
    pub fn receipt_timeout(mut self, receipt_timeout: Option<Duration>) -> Self {
        self.receipt_timeout = receipt_timeout;
        self
    }

    /// Chain id reported by the node.
    pub async fn chain_id(&self) -> Result<u64, RemoteCallError> {
        let chain_id: U64 = json_rpc_call(&self.http, &self.url, "eth_chainId", vec![]).await?;
        Ok(chain_id.to::<u64>())
    }

    async fn send_transaction(
        &self,
        to: Option<Address>,
        data: Bytes,
    ) -> Result<TransactionReceipt, RemoteCallError> {
        let mut transaction = serde_json::json!({
            "from": self.sender,
            "data": data,
        });
        if let Some(to) = to {
            transaction["to"] = serde_json::json!(to);
        }

        let hash: B256 = json_rpc_call(
            &self.http,
            &self.url,
            "eth_sendTransaction",
            vec![transaction],
        )
        .await?;

        tracing::debug!(tx_hash = %hash, "Transaction sent, waiting for receipt");

        let receipt = self.wait_for_receipt(hash).await?;
        if receipt.status.is_some_and(|status| status.is_zero()) {
            return Err(RemoteCallError::Reverted(receipt.transaction_hash));
        }
        Ok(receipt)
    }

    /// Poll until the transaction is mined. Polling is read-only, so it is safe to repeat.
    async fn wait_for_receipt(&self, hash: B256) -> Result<TransactionReceipt, RemoteCallError> {
        let start = Instant::now();

        loop {
            let receipt: Option<TransactionReceipt> = json_rpc_call(
                &self.http,
                &self.url,
                "eth_getTransactionReceipt",
                vec![serde_json::json!(hash)],
            )
            .await?;

            if let Some(receipt) = receipt {
                return Ok(receipt);
            }

            if self
                .receipt_timeout
                .is_some_and(|timeout| start.elapsed() > timeout)
            {
                return Err(RemoteCallError::Timeout(hash));
            }

            tracing::trace!(tx_hash = %hash, "Transaction not mined yet");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

impl ChainClient for RpcChainClient {
    async fn deploy(&mut self, request: &DeployRequest) -> Result<Address, RemoteCallError> {
        let mut data = self.artifacts.bytecode(&request.contract)?.to_vec();
        data.extend(encode_arguments(&request.args));

        tracing::debug!(contract = %request.contract, bytes = data.len(), "Deploying contract");

        let receipt = self.send_transaction(None, data.into()).await?;
        receipt
            .contract_address
            .ok_or(RemoteCallError::MissingContractAddress(receipt.transaction_hash))
    }

    async fn call(&mut self, request: &CallRequest) -> Result<Receipt, RemoteCallError> {
        tracing::debug!(
            to = %request.target,
            signature = %request.signature,
            "Sending call"
        );

        let receipt = self
            .send_transaction(Some(request.target), request.calldata())
            .await?;

        Ok(Receipt {
            transaction_hash: receipt.transaction_hash,
        })
    }
}
