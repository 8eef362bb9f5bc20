mod env;

use std::{io, path::Path, process};

use anyhow::{anyhow, Result};
use tracing::{error, info, warn};

use self::env::{AppConfig, APP_CONFIG};
use crate::{
    block_height::{local_midnight_timestamp, BlockHeightLookup, DefiLlama},
    execution_node::{ExecutionNode, JsonRpcNode},
    log,
    output::write_wallets,
    prompt::{Prompter, RunInputs},
    scanner::{collect_wallets, ScanOutcome, WalletScanner},
    units::Wei,
    wallet::WalletSet,
};

// exit status when the chain runs out before enough wallets were found
const EXIT_INCOMPLETE: i32 = 2;

/// Picks the first block to scan: an explicit height, else the height at the
/// configured date, else the chain head.
async fn resolve_start_block(
    config: &AppConfig,
    node: &impl ExecutionNode,
    lookup: &impl BlockHeightLookup,
) -> Result<u64> {
    if let Some(start_block) = config.start_block {
        return Ok(start_block);
    }

    match config.start_date {
        Some(date) => {
            let timestamp = local_midnight_timestamp(date)?;
            lookup
                .block_height_at(timestamp)
                .await?
                .ok_or_else(|| anyhow!("no block found for start date {}", date))
        }
        None => node.latest_block_number().await,
    }
}

/// Scans from `start_block` and always saves what was found, also when the
/// scan fails halfway. Failures are still returned.
pub async fn scan_and_save(
    node: &impl ExecutionNode,
    start_block: u64,
    max_balance: Wei,
    max_wallets: usize,
    output_path: &Path,
) -> Result<ScanOutcome> {
    info!(
        start_block,
        %max_balance,
        max_wallets,
        "starting wallet scan"
    );

    let mut wallet_set = WalletSet::new(max_wallets);
    let scanner = WalletScanner::new(node, start_block, max_balance).with_target(max_wallets);

    match collect_wallets(&mut wallet_set, scanner.into_stream()).await {
        Ok(outcome) => {
            match outcome {
                ScanOutcome::Complete => info!("max number of wallets reached"),
                ScanOutcome::Exhausted => warn!(
                    found = wallet_set.len(),
                    target = max_wallets,
                    "reached the first block before finding enough wallets, saving partial result"
                ),
            }
            write_wallets(output_path, wallet_set.as_slice()).await?;
            Ok(outcome)
        }
        Err(err) => {
            error!(found = wallet_set.len(), "wallet scan failed: {:#}", err);
            if !wallet_set.is_empty() {
                if let Err(save_err) = write_wallets(output_path, wallet_set.as_slice()).await {
                    error!("failed to save partial result: {:#}", save_err);
                }
            }
            Err(err)
        }
    }
}

fn execution_node() -> Result<JsonRpcNode> {
    info!(
        network = %APP_CONFIG.network,
        rpc_nodes = APP_CONFIG.rpc_url.len(),
        "connecting to execution node"
    );

    JsonRpcNode::new(
        &APP_CONFIG.rpc_url,
        APP_CONFIG.rpc_timeout(),
        APP_CONFIG.retry_policy(),
    )
}

fn exit_for(outcome: ScanOutcome) -> Result<()> {
    match outcome {
        ScanOutcome::Complete => Ok(()),
        ScanOutcome::Exhausted => process::exit(EXIT_INCOMPLETE),
    }
}

/// Non-interactive run, every input comes from the environment.
pub async fn start_scan() -> Result<()> {
    log::init();

    let node = execution_node()?;
    let lookup = DefiLlama::new(APP_CONFIG.block_height_api_url.clone(), &APP_CONFIG.network);

    let start_block = resolve_start_block(&APP_CONFIG, &node, &lookup).await?;

    let outcome = scan_and_save(
        &node,
        start_block,
        APP_CONFIG.max_balance,
        APP_CONFIG.max_wallets,
        &APP_CONFIG.output_path,
    )
    .await?;

    exit_for(outcome)
}

/// Asks for the date, balance ceiling and wallet count on the terminal.
pub async fn start_interactive_scan() -> Result<()> {
    log::init();

    let node = execution_node()?;
    let lookup = DefiLlama::new(APP_CONFIG.block_height_api_url.clone(), &APP_CONFIG.network);

    let RunInputs {
        start_block,
        max_balance,
        max_wallets,
    } = Prompter::new(io::stdin().lock(), io::stdout())
        .ask_run_inputs(&lookup)
        .await?;

    let outcome = scan_and_save(
        &node,
        start_block,
        max_balance,
        max_wallets,
        &APP_CONFIG.output_path,
    )
    .await?;

    exit_for(outcome)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        execution_node::{TxParties, EMPTY_CODE},
        units::WEI_PER_ETH,
        wallet::WalletAddress,
    };

    // every block below `head` holds one transfer from an address numbered after the block
    struct CountingChain {
        head: u64,
        fail_below: Option<u64>,
    }

    fn addr(n: u64) -> WalletAddress {
        format!("0x{:040x}", n).parse().unwrap()
    }

    #[async_trait]
    impl ExecutionNode for CountingChain {
        async fn latest_block_number(&self) -> Result<u64> {
            Ok(self.head)
        }

        async fn block_tx_hashes(&self, block_number: u64) -> Result<Option<Vec<String>>> {
            if self.fail_below.map_or(false, |limit| block_number < limit) {
                return Err(anyhow!("503 service unavailable"));
            }
            Ok(Some(vec![format!("{:#x}", block_number)]))
        }

        async fn transaction(&self, tx_hash: &str) -> Result<Option<TxParties>> {
            let block_number = u64::from_str_radix(&tx_hash[2..], 16)?;
            Ok(Some(TxParties {
                tx_hash: tx_hash.to_string(),
                from: addr(block_number),
                to: None,
            }))
        }

        async fn code(&self, _address: &WalletAddress) -> Result<String> {
            Ok(EMPTY_CODE.to_string())
        }

        async fn balance(&self, _address: &WalletAddress) -> Result<Wei> {
            Ok(Wei::ZERO)
        }
    }

    struct FixedLookup {
        height: Option<u64>,
        asked: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl BlockHeightLookup for FixedLookup {
        async fn block_height_at(&self, timestamp: i64) -> Result<Option<u64>> {
            self.asked.lock().unwrap().push(timestamp);
            Ok(self.height)
        }
    }

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        )
        .unwrap()
    }

    fn read_wallets(path: &Path) -> Vec<String> {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn it_resolves_the_start_block_by_precedence() {
        let chain = CountingChain {
            head: 500,
            fail_below: None,
        };
        let lookup = FixedLookup {
            height: Some(300),
            asked: Mutex::new(vec![]),
        };

        let explicit = config(&[("START_BLOCK", "42"), ("START_DATE", "09/11/2023")]);
        assert_eq!(
            resolve_start_block(&explicit, &chain, &lookup).await.unwrap(),
            42
        );
        assert!(lookup.asked.lock().unwrap().is_empty());

        let dated = config(&[("START_DATE", "09/11/2023")]);
        assert_eq!(
            resolve_start_block(&dated, &chain, &lookup).await.unwrap(),
            300
        );
        let midnight =
            local_midnight_timestamp(NaiveDate::from_ymd_opt(2023, 11, 9).unwrap()).unwrap();
        assert_eq!(*lookup.asked.lock().unwrap(), vec![midnight]);

        let head = config(&[]);
        assert_eq!(
            resolve_start_block(&head, &chain, &lookup).await.unwrap(),
            500
        );
    }

    #[tokio::test]
    async fn it_fails_for_an_unresolvable_start_date() {
        let chain = CountingChain {
            head: 500,
            fail_below: None,
        };
        let lookup = FixedLookup {
            height: None,
            asked: Mutex::new(vec![]),
        };

        let dated = config(&[("START_DATE", "01/01/1970")]);
        assert!(resolve_start_block(&dated, &chain, &lookup).await.is_err());
    }

    #[tokio::test]
    async fn it_saves_wallets_once_the_target_is_reached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        let chain = CountingChain {
            head: 100,
            fail_below: None,
        };

        let outcome = scan_and_save(&chain, 100, Wei(WEI_PER_ETH), 3, &path)
            .await
            .unwrap();

        assert_eq!(outcome, ScanOutcome::Complete);
        assert_eq!(
            read_wallets(&path),
            vec![addr(100), addr(99), addr(98)]
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn it_saves_a_partial_result_when_the_chain_runs_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        let chain = CountingChain {
            head: 2,
            fail_below: None,
        };

        let outcome = scan_and_save(&chain, 2, Wei(WEI_PER_ETH), 10, &path)
            .await
            .unwrap();

        assert_eq!(outcome, ScanOutcome::Exhausted);
        assert_eq!(read_wallets(&path).len(), 2);
    }

    #[tokio::test]
    async fn it_saves_a_partial_result_when_the_node_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        let chain = CountingChain {
            head: 10,
            fail_below: Some(9),
        };

        let result = scan_and_save(&chain, 10, Wei(WEI_PER_ETH), 5, &path).await;

        assert!(result.is_err());
        assert_eq!(read_wallets(&path), vec![addr(10).to_string(), addr(9).to_string()]);
    }

    #[tokio::test]
    async fn it_writes_nothing_when_failing_before_any_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        let chain = CountingChain {
            head: 10,
            fail_below: Some(11),
        };

        assert!(scan_and_save(&chain, 10, Wei(WEI_PER_ETH), 5, &path)
            .await
            .is_err());
        assert!(!path.exists());
    }
}
