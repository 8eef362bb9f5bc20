use std::collections::{HashSet, VecDeque};

use anyhow::Result;
use futures::{stream, Stream, TryStreamExt};
use tracing::{debug, info, warn};

use crate::{
    execution_node::{is_empty_code, ExecutionNode, TxParties},
    units::Wei,
    wallet::{WalletAddress, WalletSet},
};

// Addresses seen with code are skipped without a lookup. Past this many the
// set stops growing and further contracts are looked up on every appearance.
const MAX_REMEMBERED_CONTRACTS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The wallet set reached its target size.
    Complete,
    /// Block 1 was scanned before the target was reached.
    Exhausted,
}

/*
  Walks the chain from `start_block` down to block 1 and yields every account
  that has no code and a balance below `max_balance`. Work is pulled: nothing
  is fetched until the next wallet is asked for, and the walk pauses right
  after the wallet it yields, so a consumer that stops early never pays for
  the rest of the block.

  Order is block (descending), then transaction order within the block, then
  sender before recipient.
*/
pub struct WalletScanner<'a, N: ExecutionNode> {
    node: &'a N,
    max_balance: Wei,
    // next block to fetch, 0 once the walk is done
    cursor: u64,
    pending_txs: VecDeque<String>,
    pending_candidates: VecDeque<WalletAddress>,
    admitted: HashSet<WalletAddress>,
    contracts: HashSet<WalletAddress>,
    max_contracts: usize,
    target: Option<usize>,
}

/// Share of `target` reached, formatted like `42.5%`.
pub fn progress(found: usize, target: usize) -> String {
    if target == 0 {
        return "100.0%".to_string();
    }
    format!("{:.1}%", found as f64 * 100.0 / target as f64)
}

impl<'a, N: ExecutionNode> WalletScanner<'a, N> {
    pub fn new(node: &'a N, start_block: u64, max_balance: Wei) -> Self {
        Self {
            node,
            max_balance,
            cursor: start_block,
            pending_txs: VecDeque::new(),
            pending_candidates: VecDeque::new(),
            admitted: HashSet::new(),
            contracts: HashSet::new(),
            max_contracts: MAX_REMEMBERED_CONTRACTS,
            target: None,
        }
    }

    /// Only used to report progress, stopping is up to the consumer.
    pub fn with_target(mut self, target: usize) -> Self {
        self.target = Some(target);
        self
    }

    /// Next qualifying wallet, `None` once the chain is exhausted.
    pub async fn next_wallet(&mut self) -> Result<Option<WalletAddress>> {
        loop {
            if let Some(candidate) = self.pending_candidates.pop_front() {
                if self.is_qualifying(&candidate).await? {
                    self.admitted.insert(candidate.clone());
                    return Ok(Some(candidate));
                }
                continue;
            }

            if let Some(tx_hash) = self.pending_txs.pop_front() {
                match self.node.transaction(&tx_hash).await? {
                    Some(tx) => self.queue_parties(tx),
                    None => warn!(%tx_hash, "transaction not found, skipping"),
                }
                continue;
            }

            if self.cursor == 0 {
                return Ok(None);
            }

            let block_number = self.cursor;
            self.cursor -= 1;

            match self.node.block_tx_hashes(block_number).await? {
                Some(tx_hashes) => {
                    let block_progress = self
                        .target
                        .map(|target| progress(self.admitted.len(), target));
                    info!(
                        block_number,
                        tx_count = tx_hashes.len(),
                        wallets_found = self.admitted.len(),
                        progress = block_progress.as_deref(),
                        "scanning block"
                    );
                    self.pending_txs = tx_hashes.into();
                }
                None => warn!(block_number, "block not found, skipping"),
            }
        }
    }

    /// Consumes the scanner into a lazy stream of wallets.
    pub fn into_stream(self) -> impl Stream<Item = Result<WalletAddress>> + 'a
    where
        N: 'a,
    {
        stream::try_unfold(self, |mut scanner| async move {
            let next = scanner.next_wallet().await?;
            Ok::<_, anyhow::Error>(next.map(|wallet| (wallet, scanner)))
        })
    }

    fn queue_parties(&mut self, TxParties { tx_hash, from, to }: TxParties) {
        debug!(%tx_hash, %from, to = ?to.as_ref().map(ToString::to_string), "checking transaction");

        // a self transfer only needs a single check
        let to = to.filter(|to| *to != from);

        self.pending_candidates.push_back(from);
        self.pending_candidates.extend(to);
    }

    async fn is_qualifying(&mut self, address: &WalletAddress) -> Result<bool> {
        if self.admitted.contains(address) || self.contracts.contains(address) {
            return Ok(false);
        }

        let code = self.node.code(address).await?;
        if !is_empty_code(&code) {
            if self.contracts.len() < self.max_contracts {
                self.contracts.insert(address.clone());
            }
            return Ok(false);
        }

        let balance = self.node.balance(address).await?;
        let is_low = balance < self.max_balance;

        debug!(
            %address,
            %balance,
            max_balance = %self.max_balance,
            is_low,
            "checked wallet balance"
        );

        Ok(is_low)
    }
}

/// Drains `wallets` from the stream into `wallet_set` until the set is full.
/// On error the set keeps what was collected so far. A set that starts out
/// full never polls the stream.
pub async fn collect_wallets<S>(wallet_set: &mut WalletSet, wallets: S) -> Result<ScanOutcome>
where
    S: Stream<Item = Result<WalletAddress>>,
{
    if wallet_set.is_full() {
        return Ok(ScanOutcome::Complete);
    }

    futures::pin_mut!(wallets);

    while let Some(wallet) = wallets.try_next().await? {
        if !wallet_set.insert(wallet.clone()) {
            continue;
        }

        info!(
            %wallet,
            found = wallet_set.len(),
            target = wallet_set.max_size(),
            progress = %progress(wallet_set.len(), wallet_set.max_size()),
            "found wallet"
        );

        if wallet_set.is_full() {
            return Ok(ScanOutcome::Complete);
        }
    }

    Ok(ScanOutcome::Exhausted)
}
