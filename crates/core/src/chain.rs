//! Chains the monitor polls and their protocol API identifiers.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown chain: {0}")]
pub struct UnknownChain(pub String);

/// Blockchain network hosting lending and liquidity markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    Ethereum,
    Arbitrum,
    Base,
    Polygon,
    /// Hosts JupLend vaults; not served by the Fluid REST API.
    Solana,
}

impl Chain {
    /// Create Chain from an EVM chain ID.
    pub fn from_id(id: u64) -> Option<Self> {
        match id {
            1 => Some(Chain::Ethereum),
            42161 => Some(Chain::Arbitrum),
            8453 => Some(Chain::Base),
            137 => Some(Chain::Polygon),
            _ => None,
        }
    }

    /// EVM chain ID, `None` for non-EVM chains.
    #[inline]
    pub fn id(self) -> Option<u64> {
        match self {
            Chain::Ethereum => Some(1),
            Chain::Arbitrum => Some(42161),
            Chain::Base => Some(8453),
            Chain::Polygon => Some(137),
            Chain::Solana => None,
        }
    }

    /// Identifier stored in snapshots (`"1"`, `"42161"`, `"solana"`).
    pub fn id_string(self) -> String {
        match self.id() {
            Some(id) => id.to_string(),
            None => "solana".to_string(),
        }
    }

    /// Check if this chain is EVM-compatible.
    #[inline]
    pub fn is_evm(self) -> bool {
        self.id().is_some()
    }

    /// Display name, also used as the snapshot key.
    pub fn as_str(self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Arbitrum => "Arbitrum",
            Chain::Base => "Base",
            Chain::Polygon => "Polygon",
            Chain::Solana => "Solana",
        }
    }

    /// Chains served by the Fluid REST API, in polling order.
    pub fn fluid() -> &'static [Chain] {
        &[Chain::Ethereum, Chain::Arbitrum, Chain::Base, Chain::Polygon]
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = UnknownChain;

    /// Accepts a name (case-insensitive) or a numeric chain ID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(id) = trimmed.parse::<u64>() {
            return Chain::from_id(id).ok_or_else(|| UnknownChain(trimmed.to_string()));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "ethereum" | "mainnet" => Ok(Chain::Ethereum),
            "arbitrum" => Ok(Chain::Arbitrum),
            "base" => Ok(Chain::Base),
            "polygon" => Ok(Chain::Polygon),
            "solana" => Ok(Chain::Solana),
            _ => Err(UnknownChain(trimmed.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_from_id() {
        assert_eq!(Chain::from_id(1), Some(Chain::Ethereum));
        assert_eq!(Chain::from_id(42161), Some(Chain::Arbitrum));
        assert_eq!(Chain::from_id(8453), Some(Chain::Base));
        assert_eq!(Chain::from_id(255), None);
    }

    #[test]
    fn test_chain_id_roundtrip() {
        for chain in Chain::fluid() {
            let id = chain.id().unwrap();
            assert_eq!(Chain::from_id(id), Some(*chain));
        }
        assert_eq!(Chain::Solana.id(), None);
        assert_eq!(Chain::Solana.id_string(), "solana");
        assert_eq!(Chain::Polygon.id_string(), "137");
    }

    #[test]
    fn test_chain_from_str() {
        assert_eq!("arbitrum".parse::<Chain>(), Ok(Chain::Arbitrum));
        assert_eq!(" Base ".parse::<Chain>(), Ok(Chain::Base));
        assert_eq!("137".parse::<Chain>(), Ok(Chain::Polygon));
        assert!("fantom".parse::<Chain>().is_err());
    }

    #[test]
    fn test_fluid_chains_are_evm() {
        assert!(Chain::fluid().iter().all(|c| c.is_evm()));
        assert!(!Chain::Solana.is_evm());
    }
}
