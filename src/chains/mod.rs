//! On-chain balance reads.
//!
//! One client per chain, each speaking its native JSON-RPC. Raw base
//! units (lamports, wei, token base units) are normalized to
//! human-decimal amounts at this boundary; nothing above it sees a raw
//! integer balance.

pub mod evm;
pub mod solana;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{Chain, NorthstarError};

/// A token position observed on-chain. Zero and negative amounts are
/// filtered out before this struct is ever built.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenHolding {
    /// Mint (Solana) or contract (EVM) address.
    pub asset_id: String,
    pub amount: Decimal,
    pub decimals: u32,
}

/// Read-only balance access for one chain.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    fn chain(&self) -> Chain;

    /// Native asset balance in human-decimal units.
    async fn native_balance(&self, address: &str) -> Result<Decimal, NorthstarError>;

    /// All positive token positions held by the address.
    async fn token_holdings(&self, address: &str) -> Result<Vec<TokenHolding>, NorthstarError>;
}
