use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rand::{seq::SliceRandom, Rng};
use reqwest::{StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{ExecutionNode, TxParties};
use crate::{units::Wei, wallet::WalletAddress};

// Returned by several providers when a request is rate limited.
const LIMIT_EXCEEDED_CODE: i64 = -32005;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Exponential backoff with up to 50% jitter on top.
    fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_ms = match (backoff.as_millis() / 2) as u64 {
            0 => 0,
            max => rand::thread_rng().gen_range(0..=max),
        };
        backoff + Duration::from_millis(jitter_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct BlockResponse {
    transactions: Vec<String>,
}

#[derive(Deserialize)]
struct TransactionResponse {
    hash: String,
    from: String,
    to: Option<String>,
}

impl TryFrom<TransactionResponse> for TxParties {
    type Error = anyhow::Error;

    fn try_from(tx: TransactionResponse) -> Result<Self> {
        let from = tx
            .from
            .parse::<WalletAddress>()
            .with_context(|| format!("bad sender on tx {}", tx.hash))?;
        let to = tx
            .to
            .filter(|to| !to.is_empty())
            .map(|to| to.parse::<WalletAddress>())
            .transpose()
            .with_context(|| format!("bad recipient on tx {}", tx.hash))?;

        Ok(TxParties {
            tx_hash: tx.hash,
            from,
            to,
        })
    }
}

enum CallError {
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        let is_transient_status = err
            .status()
            .map_or(false, |status| {
                status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            });

        if err.is_timeout() || err.is_connect() || err.is_request() || is_transient_status {
            CallError::Transient(err.into())
        } else {
            CallError::Fatal(err.into())
        }
    }
}

fn encode_block_number(block_number: u64) -> String {
    format!("{:#x}", block_number)
}

fn decode_quantity(quantity: &str) -> Result<u64> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| anyhow!("quantity is missing 0x prefix: {}", quantity))?;
    u64::from_str_radix(digits, 16).map_err(|err| anyhow!("invalid quantity {}: {}", quantity, err))
}

/// Execution node reached over json-rpc. With several urls every request
/// goes to a random one.
#[derive(Clone)]
pub struct JsonRpcNode {
    nodes: Vec<Url>,
    client: reqwest::Client,
    retry_policy: RetryPolicy,
}

impl JsonRpcNode {
    pub fn new(nodes: &[Url], timeout: Duration, retry_policy: RetryPolicy) -> Result<Self> {
        if nodes.is_empty() {
            return Err(anyhow!("tried to instantiate JsonRpcNode without at least one url"));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            nodes: nodes.to_vec(),
            client,
            retry_policy,
        })
    }

    // poor mans load balancer, get random node from list
    fn get_node(&self) -> &Url {
        self.nodes
            .choose(&mut rand::thread_rng())
            .expect("nodes is checked to be non-empty on construction")
    }

    async fn send<T: DeserializeOwned>(&self, payload: &Value) -> Result<Option<T>, CallError> {
        let response: JsonRpcResponse<T> = self
            .client
            .post(self.get_node().clone())
            .json(payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.error {
            Some(JsonRpcError { code, message }) if code == LIMIT_EXCEEDED_CODE => Err(
                CallError::Transient(anyhow!("json-rpc error {}: {}", code, message)),
            ),
            Some(JsonRpcError { code, message }) => Err(CallError::Fatal(anyhow!(
                "json-rpc error {}: {}",
                code,
                message
            ))),
            None => Ok(response.result),
        }
    }

    /// `Ok(None)` when the node answers with a null result.
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut attempt = 0;
        loop {
            match self.send(&payload).await {
                Ok(result) => return Ok(result),
                Err(CallError::Transient(err)) if attempt < self.retry_policy.max_retries => {
                    let delay = self.retry_policy.delay_for(attempt);
                    warn!(
                        method,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient json-rpc failure, retrying: {}",
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(CallError::Transient(err)) | Err(CallError::Fatal(err)) => {
                    return Err(err.context(format!("{} failed, params: {}", method, params)));
                }
            }
        }
    }

    async fn call_non_null<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        self.call(method, params.clone())
            .await?
            .ok_or_else(|| anyhow!("{} returned null, params: {}", method, params))
    }
}

#[async_trait]
impl ExecutionNode for JsonRpcNode {
    async fn latest_block_number(&self) -> Result<u64> {
        let quantity: String = self.call_non_null("eth_blockNumber", json!([])).await?;
        decode_quantity(&quantity)
    }

    async fn block_tx_hashes(&self, block_number: u64) -> Result<Option<Vec<String>>> {
        let block: Option<BlockResponse> = self
            .call(
                "eth_getBlockByNumber",
                json!([encode_block_number(block_number), false]),
            )
            .await?;

        Ok(block.map(|block| block.transactions))
    }

    async fn transaction(&self, tx_hash: &str) -> Result<Option<TxParties>> {
        let tx: Option<TransactionResponse> = self
            .call("eth_getTransactionByHash", json!([tx_hash]))
            .await?;

        tx.map(TxParties::try_from).transpose()
    }

    async fn code(&self, address: &WalletAddress) -> Result<String> {
        let code: String = self
            .call_non_null("eth_getCode", json!([address, "latest"]))
            .await?;
        debug!(%address, code_prefix = %code.chars().take(10).collect::<String>(), "fetched code");
        Ok(code)
    }

    async fn balance(&self, address: &WalletAddress) -> Result<Wei> {
        let quantity: String = self
            .call_non_null("eth_getBalance", json!([address, "latest"]))
            .await?;
        Wei::from_hex_quantity(&quantity)
    }
}
