//! End-to-end valuation: chain reads, pricing, persistence, 24h change.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use northstar::chains::TokenHolding;
use northstar::portfolio::{ChainAccount, ValuationAggregator};
use northstar::prices::PriceResolver;
use northstar::storage::StatePaths;
use northstar::types::{AssetRef, AuthorizationMode, Chain};

use crate::mocks::{FixedPrices, LedgerGate, MockChain, SOL_MINT, USDC_MINT};

fn temp_paths() -> (PathBuf, StatePaths) {
    let mut root = std::env::temp_dir();
    root.push(format!("northstar_it_valuation_{}", uuid::Uuid::new_v4()));
    let paths = StatePaths::new(&root);
    paths.ensure_dirs().unwrap();
    (root, paths)
}

fn sol_native() -> AssetRef {
    AssetRef {
        chain: Chain::Solana,
        symbol: "SOL".into(),
        coingecko_id: Some("solana".into()),
        contract: SOL_MINT.into(),
        decimals: 9,
    }
}

fn eth_native() -> AssetRef {
    AssetRef {
        chain: Chain::Base,
        symbol: "ETH".into(),
        coingecko_id: Some("ethereum".into()),
        contract: "0x4200000000000000000000000000000000000006".into(),
        decimals: 18,
    }
}

fn usdc_asset() -> AssetRef {
    AssetRef {
        chain: Chain::Solana,
        symbol: "USDC".into(),
        coingecko_id: Some("usd-coin".into()),
        contract: USDC_MINT.into(),
        decimals: 6,
    }
}

fn resolver() -> Arc<PriceResolver> {
    Arc::new(PriceResolver::new(vec![Arc::new(FixedPrices::new(&[
        ("SOL", dec!(150)),
        ("ETH", dec!(3000)),
        ("USDC", dec!(1)),
    ]))]))
}

fn aggregator(
    solana: Arc<MockChain>,
    base: Arc<MockChain>,
    gate: Arc<LedgerGate>,
    paths: &StatePaths,
) -> ValuationAggregator {
    ValuationAggregator::new(
        vec![
            ChainAccount {
                client: solana,
                address: "SolOwner111111111111111111111111111111111".into(),
                native: sol_native(),
            },
            ChainAccount {
                client: base,
                address: "0x1111111111111111111111111111111111111111".into(),
                native: eth_native(),
            },
        ],
        resolver(),
        gate,
        vec![sol_native(), usdc_asset(), eth_native()],
        paths,
    )
}

#[tokio::test]
async fn two_chain_snapshot_totals_and_persists() {
    let (root, paths) = temp_paths();
    let solana = Arc::new(MockChain::new(
        Chain::Solana,
        dec!(2),
        vec![TokenHolding {
            asset_id: USDC_MINT.into(),
            amount: dec!(40),
            decimals: 6,
        }],
    ));
    let base = Arc::new(MockChain::new(Chain::Base, dec!(0.05), vec![]));
    let gate = Arc::new(LedgerGate::new(dec!(10), dec!(25), 5));

    let agg = aggregator(solana, base, gate, &paths);
    let snapshot = agg.compute_snapshot().await.unwrap();

    // 2 SOL * 150 + 40 USDC * 1 + 0.05 ETH * 3000
    assert_eq!(snapshot.total_value_usd, dec!(490.00));
    assert_eq!(snapshot.holdings.len(), 3);
    assert_eq!(snapshot.authorization.mode, AuthorizationMode::Live);
    assert_eq!(snapshot.authorization.daily_remaining_usd, dec!(25));

    let cached = agg.cached_snapshot().unwrap();
    assert_eq!(cached.total_value_usd, dec!(490.00));
    assert!(paths.portfolio_history.exists());

    std::fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn chain_failure_shrinks_but_does_not_fail() {
    let (root, paths) = temp_paths();
    let solana = Arc::new(MockChain::new(Chain::Solana, dec!(2), vec![]));
    let base = Arc::new(MockChain::new(Chain::Base, dec!(0.05), vec![]));
    base.set_force_error(true);
    let gate = Arc::new(LedgerGate::new(dec!(10), dec!(25), 5));

    let agg = aggregator(solana, base, gate, &paths);
    let snapshot = agg.compute_snapshot().await.unwrap();

    assert_eq!(snapshot.total_value_usd, dec!(300.00));
    assert_eq!(snapshot.holdings.len(), 1);
    let base_native = snapshot.natives.get(&Chain::Base).unwrap();
    assert!(base_native.balance.is_none());
    // Price resolution is independent of the balance read
    assert_eq!(base_native.price_usd, Some(dec!(3000)));

    std::fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn change_24h_survives_garbage_history_lines() {
    let (root, paths) = temp_paths();
    let solana = Arc::new(MockChain::new(Chain::Solana, dec!(2), vec![]));
    let base = Arc::new(MockChain::new(Chain::Base, Decimal::ZERO, vec![]));
    let gate = Arc::new(LedgerGate::new(dec!(10), dec!(25), 5));

    let agg = aggregator(solana, base, gate, &paths);
    agg.compute_snapshot().await.unwrap();

    // A torn line from a concurrent writer
    let mut file = OpenOptions::new()
        .append(true)
        .open(&paths.portfolio_history)
        .unwrap();
    writeln!(file, "{{\"ts\": \"2026-08-").unwrap();
    drop(file);

    agg.compute_snapshot().await.unwrap();

    let change = agg.change_24h();
    // Both parseable entries are fresh, so nearest-to-24h-ago is the
    // oldest one and the delta is zero.
    assert_eq!(change.current, dec!(300.00));
    assert_eq!(change.change_usd, Decimal::ZERO);

    std::fs::remove_dir_all(&root).unwrap();
}

#[tokio::test]
async fn repeated_snapshots_append_history() {
    let (root, paths) = temp_paths();
    let solana = Arc::new(MockChain::new(Chain::Solana, dec!(1), vec![]));
    let base = Arc::new(MockChain::new(Chain::Base, Decimal::ZERO, vec![]));
    let gate = Arc::new(LedgerGate::new(dec!(10), dec!(25), 5));

    let agg = aggregator(solana, base, gate, &paths);
    for _ in 0..3 {
        agg.compute_snapshot().await.unwrap();
    }

    let contents = std::fs::read_to_string(&paths.portfolio_history).unwrap();
    assert_eq!(contents.lines().count(), 3);

    std::fs::remove_dir_all(&root).unwrap();
}
