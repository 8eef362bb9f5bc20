use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::BlockHeightLookup;
use crate::env::Network;

#[derive(Deserialize)]
struct BlockResponse {
    height: u64,
    timestamp: i64,
}

/// Block height by timestamp from the DefiLlama coins api.
pub struct DefiLlama {
    base_url: Url,
    chain: &'static str,
    client: reqwest::Client,
}

impl DefiLlama {
    pub fn new(base_url: Url, network: &Network) -> Self {
        let chain = match network {
            Network::Mainnet => "ethereum",
            Network::Holesky => "holesky",
            Network::Sepolia => "sepolia",
        };

        Self {
            base_url,
            chain,
            client: reqwest::Client::new(),
        }
    }

    fn block_url(&self, timestamp: i64) -> String {
        format!("{}block/{}/{}", self.base_url, self.chain, timestamp)
    }
}

#[async_trait]
impl BlockHeightLookup for DefiLlama {
    async fn block_height_at(&self, timestamp: i64) -> Result<Option<u64>> {
        let res = self.client.get(self.block_url(timestamp)).send().await?;

        match res.status() {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Ok(None),
            StatusCode::OK => {
                let block = res.json::<BlockResponse>().await?;
                debug!(
                    timestamp,
                    height = block.height,
                    block_timestamp = block.timestamp,
                    "resolved block height"
                );
                Ok(Some(block.height))
            }
            status => Err(anyhow!(
                "failed to fetch block height by timestamp. timestamp = {} status = {} url = {}",
                timestamp,
                status,
                res.url()
            )),
        }
    }
}
