use anyhow::Result;

#[tokio::main]
pub async fn main() -> Result<()> {
    wallet_scanner::start_scan().await
}
