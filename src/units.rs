use std::fmt;

use anyhow::{anyhow, bail, Result};

const ETH_DECIMALS: u32 = 18;
pub const WEI_PER_ETH: u128 = 10u128.pow(ETH_DECIMALS);

/// An amount of the chain's native asset in its base unit.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Wei(pub u128);

impl Wei {
    pub const ZERO: Wei = Wei(0);

    /// Parses a json-rpc quantity, e.g. `0x1bc16d674ec80000`.
    pub fn from_hex_quantity(quantity: &str) -> Result<Self> {
        let digits = quantity
            .strip_prefix("0x")
            .ok_or_else(|| anyhow!("quantity is missing 0x prefix: {}", quantity))?;

        if digits.is_empty() {
            bail!("quantity has no digits: {}", quantity);
        }

        u128::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|err| anyhow!("invalid quantity {}: {}", quantity, err))
    }

    /// Parses a decimal amount in whole units, e.g. `1` or `0.25`.
    pub fn from_ether_str(ether: &str) -> Result<Self> {
        let ether = ether.trim();
        let (whole, fraction) = ether.split_once('.').unwrap_or((ether, ""));

        let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction)
        {
            bail!("not a decimal amount: {:?}", ether);
        }

        if fraction.len() > ETH_DECIMALS as usize {
            bail!("more than {} decimals in {:?}", ETH_DECIMALS, ether);
        }

        let whole_wei = match whole {
            "" => 0,
            digits => digits
                .parse::<u128>()?
                .checked_mul(WEI_PER_ETH)
                .ok_or_else(|| anyhow!("amount too large: {:?}", ether))?,
        };

        let fraction_wei = match fraction {
            "" => 0,
            digits => {
                digits.parse::<u128>()? * 10u128.pow(ETH_DECIMALS - digits.len() as u32)
            }
        };

        whole_wei
            .checked_add(fraction_wei)
            .map(Self)
            .ok_or_else(|| anyhow!("amount too large: {:?}", ether))
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / WEI_PER_ETH;
        let fraction = self.0 % WEI_PER_ETH;

        if fraction == 0 {
            return write!(f, "{} ETH", whole);
        }

        let fraction = format!("{:018}", fraction);
        write!(f, "{}.{} ETH", whole, fraction.trim_end_matches('0'))
    }
}
