use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::wallet::WalletAddress;

/// Writes the wallets as a pretty printed json array of strings.
pub async fn write_wallets(path: &Path, wallets: &[WalletAddress]) -> Result<()> {
    let json = serde_json::to_string_pretty(wallets)?;

    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write wallets to {}", path.display()))?;

    info!(path = %path.display(), count = wallets.len(), "saved wallets");

    Ok(())
}
