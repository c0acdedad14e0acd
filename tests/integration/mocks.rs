//! Deterministic mock collaborators shared by the integration tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use northstar::chains::{ChainClient, TokenHolding};
use northstar::policy::AuthorizationGate;
use northstar::prices::PriceSource;
use northstar::swap::{SwapRequest, SwapVenue, VenueQuote};
use northstar::types::{
    AuthorizationMode, AuthorizationStatus, Chain, GateDecision, GateRequest, NorthstarError,
};

pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

// ---------------------------------------------------------------------------
// Chain client
// ---------------------------------------------------------------------------

pub struct MockChain {
    chain: Chain,
    balance: Decimal,
    tokens: Vec<TokenHolding>,
    force_error: AtomicBool,
}

impl MockChain {
    pub fn new(chain: Chain, balance: Decimal, tokens: Vec<TokenHolding>) -> Self {
        MockChain {
            chain,
            balance,
            tokens,
            force_error: AtomicBool::new(false),
        }
    }

    pub fn set_force_error(&self, on: bool) {
        self.force_error.store(on, Ordering::SeqCst);
    }

    fn maybe_fail(&self) -> Result<(), NorthstarError> {
        if self.force_error.load(Ordering::SeqCst) {
            Err(NorthstarError::Rpc {
                chain: self.chain,
                message: "forced failure".into(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn native_balance(&self, _address: &str) -> Result<Decimal, NorthstarError> {
        self.maybe_fail()?;
        Ok(self.balance)
    }

    async fn token_holdings(&self, _address: &str) -> Result<Vec<TokenHolding>, NorthstarError> {
        self.maybe_fail()?;
        Ok(self.tokens.clone())
    }
}

// ---------------------------------------------------------------------------
// Price source
// ---------------------------------------------------------------------------

/// Fixed symbol-to-price table.
pub struct FixedPrices {
    prices: HashMap<String, Decimal>,
}

impl FixedPrices {
    pub fn new(pairs: &[(&str, Decimal)]) -> Self {
        FixedPrices {
            prices: pairs
                .iter()
                .map(|(symbol, price)| (symbol.to_string(), *price))
                .collect(),
        }
    }
}

#[async_trait]
impl PriceSource for FixedPrices {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn price_usd(
        &self,
        asset: &northstar::types::AssetRef,
    ) -> Result<Option<Decimal>, NorthstarError> {
        Ok(self.prices.get(&asset.symbol).copied())
    }
}

// ---------------------------------------------------------------------------
// Authorization gate with a live in-memory ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct LedgerState {
    pub spent_usd: Decimal,
    pub tx_count: u64,
}

/// A gate that actually enforces per-tx and daily limits against an
/// in-memory ledger, so tests can observe whether checks mutate state.
pub struct LedgerGate {
    max_tx_usd: Decimal,
    max_daily_usd: Decimal,
    max_daily_txs: u64,
    state: Mutex<LedgerState>,
    calls: Mutex<Vec<GateRequest>>,
}

impl LedgerGate {
    pub fn new(max_tx_usd: Decimal, max_daily_usd: Decimal, max_daily_txs: u64) -> Self {
        LedgerGate {
            max_tx_usd,
            max_daily_usd,
            max_daily_txs,
            state: Mutex::new(LedgerState::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn ledger(&self) -> LedgerState {
        self.state.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<GateRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commit_calls(&self) -> usize {
        self.calls().iter().filter(|r| r.commit).count()
    }
}

#[async_trait]
impl AuthorizationGate for LedgerGate {
    async fn check(&self, request: &GateRequest) -> GateDecision {
        self.calls.lock().unwrap().push(request.clone());

        let mut state = self.state.lock().unwrap();
        if request.value_usd > self.max_tx_usd {
            return GateDecision::denied("per-transaction limit exceeded");
        }
        if state.spent_usd + request.value_usd > self.max_daily_usd {
            return GateDecision::denied("daily spend limit exceeded");
        }
        if state.tx_count >= self.max_daily_txs {
            return GateDecision::denied("daily transaction count exceeded");
        }

        if request.commit {
            state.spent_usd += request.value_usd;
            state.tx_count += 1;
        }
        GateDecision {
            allowed: true,
            message: if request.commit { "committed" } else { "ok" }.to_string(),
        }
    }

    async fn status(&self) -> AuthorizationStatus {
        let state = self.state.lock().unwrap();
        AuthorizationStatus {
            mode: AuthorizationMode::Live,
            max_tx_usd: self.max_tx_usd,
            max_daily_usd: self.max_daily_usd,
            max_daily_txs: self.max_daily_txs,
            daily_spent_usd: state.spent_usd,
            daily_tx_count: state.tx_count,
            daily_remaining_usd: (self.max_daily_usd - state.spent_usd).max(Decimal::ZERO),
            cooldown_seconds: 0,
            cooldown_remaining_seconds: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Swap venue
// ---------------------------------------------------------------------------

pub struct MockVenue {
    in_amount: u64,
    out_amount: u64,
    fail_quote: AtomicBool,
    fail_build: AtomicBool,
    pub build_calls: AtomicUsize,
}

impl MockVenue {
    pub fn new(in_amount: u64, out_amount: u64) -> Self {
        MockVenue {
            in_amount,
            out_amount,
            fail_quote: AtomicBool::new(false),
            fail_build: AtomicBool::new(false),
            build_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_quote(&self, on: bool) {
        self.fail_quote.store(on, Ordering::SeqCst);
    }

    pub fn set_fail_build(&self, on: bool) {
        self.fail_build.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl SwapVenue for MockVenue {
    fn name(&self) -> &'static str {
        "mock-venue"
    }

    async fn quote(&self, _request: &SwapRequest) -> Result<VenueQuote, NorthstarError> {
        if self.fail_quote.load(Ordering::SeqCst) {
            return Err(NorthstarError::QuoteSource("forced quote failure".into()));
        }
        Ok(VenueQuote {
            in_amount: self.in_amount,
            out_amount: self.out_amount,
            price_impact_pct: Some(Decimal::new(1, 3)),
            raw: json!({
                "inAmount": self.in_amount.to_string(),
                "outAmount": self.out_amount.to_string(),
            }),
        })
    }

    async fn build_transaction(
        &self,
        _quote: &VenueQuote,
        _owner: &str,
    ) -> Result<String, NorthstarError> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_build.load(Ordering::SeqCst) {
            return Err(NorthstarError::TxBuild("forced build failure".into()));
        }
        Ok("bW9ja3RyYW5zYWN0aW9u".to_string())
    }
}
