use reqwest::Url;
use serde::{
    de::{DeserializeOwned, Error},
    Deserialize, Deserializer,
};
use std::fmt;
use tracing::error;

use crate::units::Wei;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Holesky,
    Sepolia,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let str = match &self {
            Network::Mainnet => "mainnet",
            Network::Holesky => "holesky",
            Network::Sepolia => "sepolia",
        };
        write!(f, "{}", str)
    }
}

pub fn deserialize_network<'de, D>(deserializer: D) -> Result<Network, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    match s.as_ref() {
        "mainnet" => Ok(Network::Mainnet),
        "holesky" => Ok(Network::Holesky),
        "sepolia" => Ok(Network::Sepolia),
        _ => Err(Error::custom(
            "network present but not mainnet, holesky or sepolia",
        )),
    }
}

pub fn deserialize_urls<'de, D>(deserializer: D) -> Result<Vec<Url>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    s.split(',')
        .map(|s| Url::parse(s.trim()).map_err(Error::custom))
        .collect()
}

/// Deserialize an amount given in whole units, e.g. "0.5".
pub fn deserialize_ether<'de, D>(deserializer: D) -> Result<Wei, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    let amount = Wei::from_ether_str(&s).map_err(Error::custom)?;
    if amount == Wei::ZERO {
        return Err(Error::custom("balance ceiling must be above zero"));
    }
    Ok(amount)
}

pub fn get_app_config<T: DeserializeOwned>() -> T {
    match envy::from_env::<T>() {
        Ok(config) => config,
        Err(err) => {
            error!("failed to parse config: {}", err);
            std::process::exit(1);
        }
    }
}
