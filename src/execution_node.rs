mod json_rpc;

pub use json_rpc::{JsonRpcNode, RetryPolicy};

use anyhow::Result;
use async_trait::async_trait;

use crate::{units::Wei, wallet::WalletAddress};

/// What `eth_getCode` returns for an account without deployed bytecode.
pub const EMPTY_CODE: &str = "0x";

pub fn is_empty_code(code: &str) -> bool {
    code == EMPTY_CODE
}

#[derive(Debug, Clone, PartialEq)]
pub struct TxParties {
    pub tx_hash: String,
    pub from: WalletAddress,
    // none for contract creations
    pub to: Option<WalletAddress>,
}

/// Read access to the chain. All reads are against the latest state, except
/// blocks and transactions which are addressed directly.
#[async_trait]
pub trait ExecutionNode: Send + Sync {
    async fn latest_block_number(&self) -> Result<u64>;
    /// `None` when the node doesn't know the block.
    async fn block_tx_hashes(&self, block_number: u64) -> Result<Option<Vec<String>>>;
    async fn transaction(&self, tx_hash: &str) -> Result<Option<TxParties>>;
    async fn code(&self, address: &WalletAddress) -> Result<String>;
    async fn balance(&self, address: &WalletAddress) -> Result<Wei>;
}
