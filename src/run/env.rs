use std::{path::PathBuf, sync::LazyLock, time::Duration};

use chrono::NaiveDate;
use reqwest::Url;
use serde::{de::Error, Deserialize, Deserializer};
use serde_with::{serde_as, DisplayFromStr};

use crate::{
    block_height::parse_cutoff_date,
    env::{deserialize_ether, deserialize_network, deserialize_urls, get_app_config, Network},
    execution_node::RetryPolicy,
    units::{Wei, WEI_PER_ETH},
};

#[serde_as]
#[derive(Deserialize)]
pub struct AppConfig {
    /// Comma separated json-rpc urls.
    #[serde(default = "default_rpc_urls", deserialize_with = "deserialize_urls")]
    pub rpc_url: Vec<Url>,
    #[serde(default = "default_network", deserialize_with = "deserialize_network")]
    pub network: Network,
    /// Takes precedence over `start_date`. Without either the scan starts at the chain head.
    pub start_block: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_cutoff_date")]
    pub start_date: Option<NaiveDate>,
    /// Whole units, fractions allowed.
    #[serde(default = "default_max_balance", deserialize_with = "deserialize_ether")]
    pub max_balance: Wei,
    #[serde(default = "default_max_wallets")]
    pub max_wallets: usize,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
    #[serde(default = "default_rpc_max_retries")]
    pub rpc_max_retries: u32,
    #[serde(default = "default_rpc_retry_base_ms")]
    pub rpc_retry_base_ms: u64,
    #[serde(default = "default_rpc_timeout_seconds")]
    pub rpc_timeout_seconds: u64,
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default = "default_block_height_api_url")]
    pub block_height_api_url: Url,
}

fn default_rpc_urls() -> Vec<Url> {
    vec![Url::parse("https://rpc.ankr.com/eth").unwrap()]
}

fn default_network() -> Network {
    Network::Mainnet
}

fn default_max_balance() -> Wei {
    Wei(WEI_PER_ETH)
}

fn default_max_wallets() -> usize {
    2
}

fn default_output_path() -> PathBuf {
    PathBuf::from("./wallets.json")
}

fn default_rpc_max_retries() -> u32 {
    3
}

fn default_rpc_retry_base_ms() -> u64 {
    500
}

fn default_rpc_timeout_seconds() -> u64 {
    30
}

fn default_block_height_api_url() -> Url {
    Url::parse("https://coins.llama.fi").unwrap()
}

fn deserialize_optional_cutoff_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    s.map(|s| parse_cutoff_date(&s).map_err(Error::custom))
        .transpose()
}

impl AppConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.rpc_max_retries,
            base_delay: Duration::from_millis(self.rpc_retry_base_ms),
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_seconds)
    }
}

pub static APP_CONFIG: LazyLock<AppConfig> = LazyLock::new(get_app_config);

#[cfg(test)]
mod tests {
    use super::*;

    fn from_vars(vars: &[(&str, &str)]) -> Result<AppConfig, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        )
    }

    #[test]
    fn test_defaults() {
        let config = from_vars(&[]).unwrap();

        assert_eq!(config.rpc_url, default_rpc_urls());
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.start_block, None);
        assert_eq!(config.start_date, None);
        assert_eq!(config.max_balance, Wei(WEI_PER_ETH));
        assert_eq!(config.max_wallets, 2);
        assert_eq!(config.output_path, PathBuf::from("./wallets.json"));
        assert_eq!(config.retry_policy().max_retries, 3);
        assert_eq!(config.rpc_timeout(), Duration::from_secs(30));
        assert_eq!(config.block_height_api_url.as_str(), "https://coins.llama.fi/");
    }

    #[test]
    fn test_overrides() {
        let config = from_vars(&[
            ("START_BLOCK", "18511978"),
            ("START_DATE", "09/11/2023"),
            ("MAX_BALANCE", "0.01"),
            ("MAX_WALLETS", "0"),
            ("OUTPUT_PATH", "/tmp/out.json"),
            ("RPC_RETRY_BASE_MS", "50"),
        ])
        .unwrap();

        assert_eq!(config.start_block, Some(18511978));
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2023, 11, 9));
        assert_eq!(config.max_balance, Wei(WEI_PER_ETH / 100));
        assert_eq!(config.max_wallets, 0);
        assert_eq!(config.output_path, PathBuf::from("/tmp/out.json"));
        assert_eq!(
            config.retry_policy().base_delay,
            Duration::from_millis(50)
        );
    }

    #[test]
    fn test_rejects_bad_start_date() {
        assert!(from_vars(&[("START_DATE", "2023-11-09")]).is_err());
        assert!(from_vars(&[("START_DATE", "31/02/2023")]).is_err());
    }
}
