//! Shared types for the NORTHSTAR financial core.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that chain, price, policy,
//! and swap modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Chains & assets
// ---------------------------------------------------------------------------

/// A supported chain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Solana,
    Base,
}

impl Chain {
    /// All supported chains (useful for iteration).
    pub const ALL: &'static [Chain] = &[Chain::Solana, Chain::Base];

    /// The ticker symbol of the chain's native asset.
    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Solana => "SOL",
            Chain::Base => "ETH",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Solana => write!(f, "solana"),
            Chain::Base => write!(f, "base"),
        }
    }
}

impl std::str::FromStr for Chain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "solana" | "sol" => Ok(Chain::Solana),
            "base" => Ok(Chain::Base),
            _ => Err(anyhow::anyhow!("Unknown chain: {s}")),
        }
    }
}

/// Reference to a priceable asset.
///
/// `coingecko_id` is present only for assets the primary aggregator indexes;
/// long-tail tokens carry just the on-chain `contract` (mint) for the
/// DEX-data fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRef {
    pub chain: Chain,
    pub symbol: String,
    pub coingecko_id: Option<String>,
    /// Mint address (Solana) or token contract address (EVM).
    pub contract: String,
    pub decimals: u32,
}

impl AssetRef {
    /// An ad-hoc reference for a token discovered on-chain that is not
    /// present in the configured registry. Symbol falls back to a mint
    /// prefix, and no aggregator id is assumed.
    pub fn discovered(chain: Chain, contract: &str, decimals: u32) -> Self {
        let symbol = contract.chars().take(8).collect();
        AssetRef {
            chain,
            symbol,
            coingecko_id: None,
            contract: contract.to_string(),
            decimals,
        }
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.chain, self.symbol, self.contract)
    }
}

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

/// A single valued holding within a snapshot. Constructed once per
/// snapshot from a resolved (balance, price) pair; never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub chain: Chain,
    pub symbol: String,
    /// Mint or contract address ("native" for a chain's base asset).
    pub asset_id: String,
    pub amount: Decimal,
    pub price_usd: Decimal,
    pub value_usd: Decimal,
}

impl Holding {
    pub fn new(
        chain: Chain,
        symbol: impl Into<String>,
        asset_id: impl Into<String>,
        amount: Decimal,
        price_usd: Decimal,
    ) -> Self {
        Holding {
            chain,
            symbol: symbol.into(),
            asset_id: asset_id.into(),
            amount,
            price_usd,
            value_usd: amount * price_usd,
        }
    }
}

impl fmt::Display for Holding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {:.4} @ ${} = ${:.2}",
            self.chain, self.symbol, self.amount, self.price_usd, self.value_usd,
        )
    }
}

/// Native-asset position on one chain, as observed at snapshot time.
/// Either side may be absent when the RPC or price source had no answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NativePosition {
    pub balance: Option<Decimal>,
    pub price_usd: Option<Decimal>,
}

/// One full portfolio valuation. Owned by the aggregator; the persisted
/// copy is replaced wholesale on each recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub ts: DateTime<Utc>,
    /// Sum of value_usd over holdings, rounded to 2 dp for display.
    pub total_value_usd: Decimal,
    pub holdings: Vec<Holding>,
    pub natives: BTreeMap<Chain, NativePosition>,
    /// Authorization status at capture time.
    pub authorization: AuthorizationStatus,
}

impl fmt::Display for PortfolioSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${:.2} across {} holdings @ {}",
            self.total_value_usd,
            self.holdings.len(),
            self.ts.format("%Y-%m-%d %H:%M UTC"),
        )
    }
}

/// One line of the append-only valuation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: DateTime<Utc>,
    pub total_value_usd: Decimal,
    pub natives: BTreeMap<Chain, NativePosition>,
    pub holdings_count: usize,
}

impl From<&PortfolioSnapshot> for HistoryEntry {
    fn from(snapshot: &PortfolioSnapshot) -> Self {
        HistoryEntry {
            ts: snapshot.ts,
            total_value_usd: snapshot.total_value_usd,
            natives: snapshot.natives.clone(),
            holdings_count: snapshot.holdings.len(),
        }
    }
}

/// Trailing 24-hour change computed from the history sequence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioChange {
    pub change_usd: Decimal,
    pub change_pct: Decimal,
    pub value_24h_ago: Decimal,
    pub current: Decimal,
}

impl fmt::Display for PortfolioChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.change_usd >= Decimal::ZERO { "+" } else { "" };
        write!(
            f,
            "{sign}${:.2} ({sign}{:.2}%) vs ${:.2} 24h ago",
            self.change_usd, self.change_pct, self.value_24h_ago,
        )
    }
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

/// Operating mode reported by the policy authority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationMode {
    Live,
    DryRun,
    /// The authority reported a mode this core does not know about.
    #[default]
    Unrecognized,
}

impl AuthorizationMode {
    /// Parse the authority's mode string. Anything unknown maps to
    /// `Unrecognized` rather than an error.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "LIVE" => AuthorizationMode::Live,
            "DRY_RUN" | "DRYRUN" => AuthorizationMode::DryRun,
            _ => AuthorizationMode::Unrecognized,
        }
    }
}

impl fmt::Display for AuthorizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationMode::Live => write!(f, "LIVE"),
            AuthorizationMode::DryRun => write!(f, "DRY_RUN"),
            AuthorizationMode::Unrecognized => write!(f, "UNRECOGNIZED"),
        }
    }
}

/// Read-only view of the authority's limits and current ledger usage.
/// Derived fresh on every query from ledger + clock, never cached.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationStatus {
    pub mode: AuthorizationMode,
    pub max_tx_usd: Decimal,
    pub max_daily_usd: Decimal,
    pub max_daily_txs: u64,
    pub daily_spent_usd: Decimal,
    pub daily_tx_count: u64,
    pub daily_remaining_usd: Decimal,
    pub cooldown_seconds: i64,
    pub cooldown_remaining_seconds: i64,
}

impl AuthorizationStatus {
    /// Fraction of the daily budget already spent, as a percentage.
    /// None when no daily limit is configured.
    pub fn spend_utilisation_pct(&self) -> Option<Decimal> {
        if self.max_daily_usd > Decimal::ZERO {
            Some(self.daily_spent_usd / self.max_daily_usd * Decimal::from(100))
        } else {
            None
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | spent ${:.2}/${:.2} | txs {}/{} | cooldown {}s remaining",
            self.mode,
            self.daily_spent_usd,
            self.max_daily_usd,
            self.daily_tx_count,
            self.max_daily_txs,
            self.cooldown_remaining_seconds,
        )
    }
}

/// A single authorization question put to the authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRequest {
    pub chain: Chain,
    pub value_usd: Decimal,
    pub destination: String,
    pub commit: bool,
}

/// The authority's answer. Transport failures and missing configuration
/// surface as `allowed = false` — the gate is fail-closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateDecision {
    pub allowed: bool,
    pub message: String,
}

impl GateDecision {
    pub fn denied(message: impl Into<String>) -> Self {
        GateDecision {
            allowed: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.allowed { "ALLOWED" } else { "DENIED" };
        write!(f, "{verdict}: {}", self.message)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for NORTHSTAR.
///
/// These mark the boundaries where an external collaborator failed;
/// whether a failure becomes "absent data" is decided by the caller,
/// not hidden here.
#[derive(Debug, thiserror::Error)]
pub enum NorthstarError {
    #[error("Price source error ({source_name}): {message}")]
    PriceSource { source_name: String, message: String },

    #[error("RPC error ({chain}): {message}")]
    Rpc { chain: Chain, message: String },

    #[error("Quote source error: {0}")]
    QuoteSource(String),

    #[error("Transaction build error: {0}")]
    TxBuild(String),

    #[error("Authority error: {0}")]
    Authority(String),

    #[error("Storage error ({path}): {message}")]
    Storage { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
