//! End-to-end swap orchestration against the in-memory ledger gate.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use northstar::notify::TelegramNotifier;
use northstar::prices::PriceResolver;
use northstar::storage::journal::EventJournal;
use northstar::storage::{JsonlLog, StatePaths};
use northstar::swap::{SwapOrchestrator, SwapOutcome, SwapRequest};
use northstar::types::{AssetRef, Chain};

use crate::mocks::{FixedPrices, LedgerGate, MockVenue, SOL_MINT, USDC_MINT};

fn temp_paths() -> (PathBuf, StatePaths) {
    let mut root = std::env::temp_dir();
    root.push(format!("northstar_it_swap_{}", uuid::Uuid::new_v4()));
    let paths = StatePaths::new(&root);
    paths.ensure_dirs().unwrap();
    (root, paths)
}

fn sol_asset() -> AssetRef {
    AssetRef {
        chain: Chain::Solana,
        symbol: "SOL".into(),
        coingecko_id: Some("solana".into()),
        contract: SOL_MINT.into(),
        decimals: 9,
    }
}

struct Fixture {
    root: PathBuf,
    venue: Arc<MockVenue>,
    gate: Arc<LedgerGate>,
    journal: Arc<EventJournal>,
    orchestrator: SwapOrchestrator,
}

/// 0.1 SOL in, priced at $150, so every swap is worth $15.
fn fixture(gate: LedgerGate) -> Fixture {
    let (root, paths) = temp_paths();
    let venue = Arc::new(MockVenue::new(100_000_000, 15_000_000));
    let gate = Arc::new(gate);
    let notifier = Arc::new(TelegramNotifier::unconfigured(JsonlLog::new(
        &paths.outbox_log,
    )));
    let journal = Arc::new(EventJournal::new(&paths, notifier));
    let resolver = Arc::new(PriceResolver::new(vec![Arc::new(FixedPrices::new(&[(
        "SOL",
        dec!(150),
    )]))]));

    let orchestrator = SwapOrchestrator::new(
        venue.clone(),
        resolver,
        gate.clone(),
        journal.clone(),
        vec![sol_asset()],
        "SolOwner111111111111111111111111111111111".into(),
        Chain::Solana,
    );
    Fixture {
        root,
        venue,
        gate,
        journal,
        orchestrator,
    }
}

fn request(dry_run: bool) -> SwapRequest {
    SwapRequest {
        input_mint: SOL_MINT.into(),
        output_mint: USDC_MINT.into(),
        amount: 100_000_000,
        slippage_bps: 50,
        dry_run,
    }
}

#[tokio::test]
async fn repeated_dry_runs_never_touch_the_ledger() {
    let fx = fixture(LedgerGate::new(dec!(20), dec!(25), 5));

    for _ in 0..3 {
        let outcome = fx.orchestrator.execute(request(true)).await;
        match outcome {
            SwapOutcome::QuoteReady {
                summary,
                authorization,
            } => {
                assert_eq!(summary.estimated_value_usd, dec!(15));
                assert!(authorization.allowed);
                assert_eq!(authorization.message, "ok");
            }
            other => panic!("expected quote_ready, got {}", other.label()),
        }
    }

    let ledger = fx.gate.ledger();
    assert_eq!(ledger.spent_usd, Decimal::ZERO);
    assert_eq!(ledger.tx_count, 0);
    assert_eq!(fx.gate.commit_calls(), 0);
    assert_eq!(fx.venue.build_calls.load(Ordering::SeqCst), 0);

    std::fs::remove_dir_all(&fx.root).unwrap();
}

#[tokio::test]
async fn live_swap_commits_exactly_once() {
    let fx = fixture(LedgerGate::new(dec!(20), dec!(25), 5));

    let outcome = fx.orchestrator.execute(request(false)).await;
    match outcome {
        SwapOutcome::TxReady { summary, .. } => {
            assert_eq!(summary.estimated_value_usd, dec!(15));
        }
        other => panic!("expected tx_ready, got {}", other.label()),
    }

    let ledger = fx.gate.ledger();
    assert_eq!(ledger.spent_usd, dec!(15));
    assert_eq!(ledger.tx_count, 1);
    assert_eq!(fx.gate.commit_calls(), 1);
    assert_eq!(fx.venue.build_calls.load(Ordering::SeqCst), 1);

    let events = fx.journal.recent_events(10);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "swap");
    let decisions = fx.journal.recent_decisions(10);
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].decision_type, "swap");

    std::fs::remove_dir_all(&fx.root).unwrap();
}

#[tokio::test]
async fn denial_leaves_ledger_untouched() {
    // $15 swap against a $10 per-transaction limit
    let fx = fixture(LedgerGate::new(dec!(10), dec!(25), 5));

    let outcome = fx.orchestrator.execute(request(false)).await;
    match outcome {
        SwapOutcome::PolicyDenied { reason } => {
            assert!(reason.contains("per-transaction"));
        }
        other => panic!("expected denial, got {}", other.label()),
    }

    let ledger = fx.gate.ledger();
    assert_eq!(ledger.spent_usd, Decimal::ZERO);
    assert_eq!(ledger.tx_count, 0);
    assert_eq!(fx.venue.build_calls.load(Ordering::SeqCst), 0);

    let events = fx.journal.recent_events(10);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "swap_denied");

    std::fs::remove_dir_all(&fx.root).unwrap();
}

#[tokio::test]
async fn daily_budget_exhaustion_denies_second_swap() {
    // Two $15 swaps against a $25 daily limit
    let fx = fixture(LedgerGate::new(dec!(20), dec!(25), 5));

    let first = fx.orchestrator.execute(request(false)).await;
    assert_eq!(first.label(), "tx_ready");

    let second = fx.orchestrator.execute(request(false)).await;
    match second {
        SwapOutcome::PolicyDenied { reason } => assert!(reason.contains("daily spend")),
        other => panic!("expected denial, got {}", other.label()),
    }

    let ledger = fx.gate.ledger();
    assert_eq!(ledger.spent_usd, dec!(15));
    assert_eq!(ledger.tx_count, 1);

    std::fs::remove_dir_all(&fx.root).unwrap();
}

#[tokio::test]
async fn quote_failure_is_error_before_any_check() {
    let fx = fixture(LedgerGate::new(dec!(20), dec!(25), 5));
    fx.venue.set_fail_quote(true);

    let outcome = fx.orchestrator.execute(request(false)).await;
    match outcome {
        SwapOutcome::Failed { stage, .. } => assert_eq!(stage, "quote"),
        other => panic!("expected error, got {}", other.label()),
    }
    assert!(fx.gate.calls().is_empty());

    std::fs::remove_dir_all(&fx.root).unwrap();
}

#[tokio::test]
async fn build_failure_does_not_commit() {
    let fx = fixture(LedgerGate::new(dec!(20), dec!(25), 5));
    fx.venue.set_fail_build(true);

    let outcome = fx.orchestrator.execute(request(false)).await;
    match outcome {
        SwapOutcome::Failed { stage, .. } => assert_eq!(stage, "build"),
        other => panic!("expected error, got {}", other.label()),
    }

    let ledger = fx.gate.ledger();
    assert_eq!(ledger.spent_usd, Decimal::ZERO);
    assert_eq!(fx.gate.commit_calls(), 0);

    std::fs::remove_dir_all(&fx.root).unwrap();
}
