use std::{collections::HashSet, fmt, str::FromStr};

use alloy_primitives::Address;
use anyhow::anyhow;
use serde::{Serialize, Serializer};

/// A 20 byte account address. Compares on the bytes, prints with the EIP-55
/// mixed case checksum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WalletAddress(Address);

impl WalletAddress {
    pub fn to_checksum(&self) -> String {
        self.0.to_checksum(None)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_checksum())
    }
}

impl Serialize for WalletAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl FromStr for WalletAddress {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with("0x") {
            return Err(anyhow!("address is missing 0x prefix: {}", s));
        }

        // case is not checked against the checksum, nodes return lowercase
        Address::from_str(s)
            .map(Self)
            .map_err(|err| anyhow!("invalid address {}: {}", s, err))
    }
}

/// Insertion ordered, duplicate free, bounded collection of admitted wallets.
#[derive(Debug)]
pub struct WalletSet {
    max_size: usize,
    members: HashSet<WalletAddress>,
    ordered: Vec<WalletAddress>,
}

impl WalletSet {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            members: HashSet::new(),
            ordered: Vec::new(),
        }
    }

    pub fn contains(&self, address: &WalletAddress) -> bool {
        self.members.contains(address)
    }

    pub fn is_full(&self) -> bool {
        self.ordered.len() >= self.max_size
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns false, leaving the set untouched, when the address is already
    /// present or the set is full.
    pub fn insert(&mut self, address: WalletAddress) -> bool {
        if self.is_full() || self.contains(&address) {
            return false;
        }

        self.members.insert(address.clone());
        self.ordered.push(address);
        true
    }

    pub fn as_slice(&self) -> &[WalletAddress] {
        &self.ordered
    }

    pub fn into_vec(self) -> Vec<WalletAddress> {
        self.ordered
    }
}
