//! Portfolio valuation.
//!
//! `compute_snapshot` reads balances across all configured chains,
//! prices what it finds, and persists the result: the latest snapshot
//! as an atomically replaced JSON document plus one appended history
//! line. A holding appears in a snapshot only when both its balance and
//! its price resolved; anything missing either is left out entirely
//! rather than carried at zero.

pub mod context;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chains::{ChainClient, TokenHolding};
use crate::policy::AuthorizationGate;
use crate::prices::PriceResolver;
use crate::storage::{write_json_atomic, JsonlLog, StatePaths};
use crate::types::{
    AssetRef, Chain, HistoryEntry, Holding, NativePosition, NorthstarError, PortfolioChange,
    PortfolioSnapshot,
};

/// How much history the 24h-change lookback scans.
const HISTORY_WINDOW: usize = 200;

/// One chain under observation: its RPC client, the wallet address to
/// read, and the chain's native asset for pricing.
pub struct ChainAccount {
    pub client: Arc<dyn ChainClient>,
    pub address: String,
    pub native: AssetRef,
}

pub struct ValuationAggregator {
    accounts: Vec<ChainAccount>,
    resolver: Arc<PriceResolver>,
    gate: Arc<dyn AuthorizationGate>,
    assets: Vec<AssetRef>,
    snapshot_path: PathBuf,
    history: JsonlLog,
}

impl ValuationAggregator {
    pub fn new(
        accounts: Vec<ChainAccount>,
        resolver: Arc<PriceResolver>,
        gate: Arc<dyn AuthorizationGate>,
        assets: Vec<AssetRef>,
        paths: &StatePaths,
    ) -> Self {
        ValuationAggregator {
            accounts,
            resolver,
            gate,
            assets,
            snapshot_path: paths.portfolio.clone(),
            history: JsonlLog::new(&paths.portfolio_history),
        }
    }

    /// Value the whole portfolio and persist the result. Balance and
    /// price failures shrink the snapshot; only a persistence failure
    /// is fatal.
    pub async fn compute_snapshot(&self) -> Result<PortfolioSnapshot, NorthstarError> {
        let observations = join_all(self.accounts.iter().map(|account| async move {
            let chain = account.client.chain();

            let balance = match account.client.native_balance(&account.address).await {
                Ok(b) => Some(b),
                Err(e) => {
                    warn!(%chain, error = %e, "Native balance unavailable");
                    None
                }
            };
            let tokens = match account.client.token_holdings(&account.address).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(%chain, error = %e, "Token holdings unavailable");
                    Vec::new()
                }
            };
            (account, balance, tokens)
        }))
        .await;

        let mut holdings: Vec<Holding> = Vec::new();
        let mut natives: BTreeMap<Chain, NativePosition> = BTreeMap::new();
        let mut total = Decimal::ZERO;

        for (account, balance, tokens) in observations {
            let chain = account.client.chain();
            let native_price = self.resolver.resolve(&account.native).await;
            natives.insert(
                chain,
                NativePosition {
                    balance,
                    price_usd: native_price,
                },
            );

            if let (Some(amount), Some(price)) = (balance, native_price) {
                if amount > Decimal::ZERO {
                    let holding =
                        Holding::new(chain, account.native.symbol.clone(), "native", amount, price);
                    total += holding.value_usd;
                    holdings.push(holding);
                }
            }

            for token in tokens {
                if let Some(holding) = self.value_token(chain, &token).await {
                    total += holding.value_usd;
                    holdings.push(holding);
                }
            }
        }

        let snapshot = PortfolioSnapshot {
            ts: Utc::now(),
            total_value_usd: total.round_dp(2),
            holdings,
            natives,
            authorization: self.gate.status().await,
        };

        write_json_atomic(&self.snapshot_path, &snapshot)?;
        self.history.append(&HistoryEntry::from(&snapshot))?;

        info!(%snapshot, "Snapshot computed");
        Ok(snapshot)
    }

    async fn value_token(&self, chain: Chain, token: &TokenHolding) -> Option<Holding> {
        let asset = self
            .assets
            .iter()
            .find(|a| a.chain == chain && a.contract == token.asset_id)
            .cloned()
            .unwrap_or_else(|| AssetRef::discovered(chain, &token.asset_id, token.decimals));

        let price = self.resolver.resolve(&asset).await?;
        Some(Holding::new(
            chain,
            asset.symbol,
            token.asset_id.clone(),
            token.amount,
            price,
        ))
    }

    /// Trailing 24h change from the persisted history.
    pub fn change_24h(&self) -> PortfolioChange {
        let entries: Vec<HistoryEntry> = self.history.read_recent(HISTORY_WINDOW);
        change_from_history(&entries, Utc::now())
    }

    /// The last persisted snapshot, if one exists and parses.
    pub fn cached_snapshot(&self) -> Option<PortfolioSnapshot> {
        crate::storage::read_json(&self.snapshot_path)
    }
}

/// Nearest-timestamp 24h change over a chronological history slice.
///
/// Snapshots arrive at irregular intervals, so the comparison point is
/// the entry closest in absolute time to now − 24h, scanning newest
/// first with ties kept by the first (newest) candidate seen. An empty
/// history yields an all-zero change rather than an error.
pub fn change_from_history(history: &[HistoryEntry], now: DateTime<Utc>) -> PortfolioChange {
    let current = match history.last() {
        Some(entry) => entry.total_value_usd,
        None => return PortfolioChange::default(),
    };

    let target = now - Duration::hours(24);
    let mut matched = current;
    let mut best_distance: Option<i64> = None;
    for entry in history.iter().rev() {
        let distance = (entry.ts - target).num_seconds().abs();
        if best_distance.map_or(true, |best| distance < best) {
            best_distance = Some(distance);
            matched = entry.total_value_usd;
        }
    }

    let change_usd = current - matched;
    let change_pct = if matched > Decimal::ZERO {
        (change_usd / matched * Decimal::from(100)).round_dp(2)
    } else {
        Decimal::ZERO
    };

    PortfolioChange {
        change_usd: change_usd.round_dp(2),
        change_pct,
        value_24h_ago: matched,
        current,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
