//! Swap orchestration.
//!
//! One pass through quote → value → authorize → build → commit, with
//! four terminal outcomes and no retries. The orchestrator never signs
//! or broadcasts; a successful run ends with an unsigned transaction
//! handed back to the caller.

pub mod jupiter;

use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::policy::AuthorizationGate;
use crate::prices::PriceResolver;
use crate::storage::journal::EventJournal;
use crate::types::{AssetRef, Chain, GateDecision, GateRequest, NorthstarError};

// ---------------------------------------------------------------------------
// Requests, quotes, outcomes
// ---------------------------------------------------------------------------

/// What the caller wants swapped. `amount` is in base units of the
/// input mint.
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub input_mint: String,
    pub output_mint: String,
    pub amount: u64,
    pub slippage_bps: u16,
    pub dry_run: bool,
}

/// A venue's answer to a quote request. The raw response is carried
/// along because transaction building echoes it back to the venue.
#[derive(Debug, Clone)]
pub struct VenueQuote {
    pub in_amount: u64,
    pub out_amount: u64,
    pub price_impact_pct: Option<Decimal>,
    pub raw: Value,
}

/// Caller-facing summary of a quote, with the USD value the gate was
/// asked about.
#[derive(Debug, Clone)]
pub struct QuoteSummary {
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: u64,
    pub out_amount: u64,
    pub price_impact_pct: Option<Decimal>,
    pub estimated_value_usd: Decimal,
}

/// Terminal outcome of one orchestration pass.
#[derive(Debug)]
pub enum SwapOutcome {
    /// Dry run: the quote was priced and authorized but nothing built.
    /// Carries the authority's answer so a preview shows what a live
    /// run would have been told.
    QuoteReady {
        summary: QuoteSummary,
        authorization: GateDecision,
    },
    /// The authority said no.
    PolicyDenied { reason: String },
    /// Unsigned transaction ready for the signer.
    TxReady {
        transaction_base64: String,
        summary: QuoteSummary,
    },
    /// A collaborator failed before an answer was reached.
    Failed {
        stage: &'static str,
        message: String,
    },
}

impl SwapOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SwapOutcome::QuoteReady { .. } => "quote_ready",
            SwapOutcome::PolicyDenied { .. } => "policy_denied",
            SwapOutcome::TxReady { .. } => "tx_ready",
            SwapOutcome::Failed { .. } => "error",
        }
    }
}

/// A swap venue: quotes routes and builds unsigned transactions.
#[async_trait::async_trait]
pub trait SwapVenue: Send + Sync {
    fn name(&self) -> &'static str;
    async fn quote(&self, request: &SwapRequest) -> Result<VenueQuote, NorthstarError>;
    async fn build_transaction(
        &self,
        quote: &VenueQuote,
        owner: &str,
    ) -> Result<String, NorthstarError>;
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct SwapOrchestrator {
    venue: Arc<dyn SwapVenue>,
    resolver: Arc<PriceResolver>,
    gate: Arc<dyn AuthorizationGate>,
    journal: Arc<EventJournal>,
    assets: Vec<AssetRef>,
    owner_address: String,
    chain: Chain,
}

impl SwapOrchestrator {
    pub fn new(
        venue: Arc<dyn SwapVenue>,
        resolver: Arc<PriceResolver>,
        gate: Arc<dyn AuthorizationGate>,
        journal: Arc<EventJournal>,
        assets: Vec<AssetRef>,
        owner_address: String,
        chain: Chain,
    ) -> Self {
        SwapOrchestrator {
            venue,
            resolver,
            gate,
            journal,
            assets,
            owner_address,
            chain,
        }
    }

    /// Run one swap attempt to a terminal outcome. No step is retried.
    pub async fn execute(&self, request: SwapRequest) -> SwapOutcome {
        // 1. Quote
        let quote = match self.venue.quote(&request).await {
            Ok(q) => q,
            Err(e) => {
                warn!(venue = self.venue.name(), error = %e, "Quote failed");
                return SwapOutcome::Failed {
                    stage: "quote",
                    message: e.to_string(),
                };
            }
        };

        // 2. Value the input side in USD
        let estimated_value_usd = self.estimate_value(&request.input_mint, quote.in_amount).await;
        let summary = QuoteSummary {
            input_mint: request.input_mint.clone(),
            output_mint: request.output_mint.clone(),
            in_amount: quote.in_amount,
            out_amount: quote.out_amount,
            price_impact_pct: quote.price_impact_pct,
            estimated_value_usd,
        };

        // 3. Pre-flight authorization (no ledger reservation)
        let decision = self
            .gate
            .check(&GateRequest {
                chain: self.chain,
                value_usd: estimated_value_usd,
                destination: request.output_mint.clone(),
                commit: false,
            })
            .await;
        if !decision.allowed {
            info!(reason = %decision.message, "Swap denied by authority");
            self.journal_event(
                "swap_denied",
                json!({
                    "chain": self.chain,
                    "input_mint": summary.input_mint,
                    "output_mint": summary.output_mint,
                    "in_amount": summary.in_amount,
                    "out_amount": summary.out_amount,
                    "price_impact_pct": summary.price_impact_pct,
                    "value_usd": estimated_value_usd,
                    "reason": decision.message,
                }),
            )
            .await;
            return SwapOutcome::PolicyDenied {
                reason: decision.message,
            };
        }

        // 4. Dry-run exit
        if request.dry_run {
            info!(value_usd = %estimated_value_usd, "Dry run, stopping at quote");
            return SwapOutcome::QuoteReady {
                summary,
                authorization: decision,
            };
        }

        // 5. Build the unsigned transaction
        let transaction_base64 = match self
            .venue
            .build_transaction(&quote, &self.owner_address)
            .await
        {
            Ok(tx) => tx,
            Err(e) => {
                warn!(venue = self.venue.name(), error = %e, "Transaction build failed");
                return SwapOutcome::Failed {
                    stage: "build",
                    message: e.to_string(),
                };
            }
        };

        // 6. Commit the spend in the authority's ledger. The ledger may
        // have moved since the pre-flight check; the commit answer is
        // recorded but the already-built transaction is returned either
        // way (accepted race, the authority remains the final arbiter at
        // signing time).
        let commit = self
            .gate
            .check(&GateRequest {
                chain: self.chain,
                value_usd: estimated_value_usd,
                destination: request.output_mint.clone(),
                commit: true,
            })
            .await;
        if !commit.allowed {
            warn!(message = %commit.message, "Commit answer was a denial after build");
        }

        // 7. Finalize
        self.journal_event(
            "swap",
            json!({
                "chain": self.chain,
                "input_mint": summary.input_mint,
                "output_mint": summary.output_mint,
                "value_usd": estimated_value_usd,
                "status": "tx_ready",
                "commit_message": commit.message,
            }),
        )
        .await;
        let rationale = format!(
            "Swapped {} base units of {} for {} via {} at ~${:.2}",
            summary.in_amount,
            summary.input_mint,
            summary.output_mint,
            self.venue.name(),
            estimated_value_usd,
        );
        if let Err(e) = self.journal.record_decision(
            "swap",
            &rationale,
            json!({
                "chain": self.chain,
                "value_usd": estimated_value_usd,
                "commit_allowed": commit.allowed,
            })
            .as_object()
            .cloned()
            .unwrap_or_default(),
        ) {
            error!(error = %e, "Failed to journal swap decision");
        }
        info!(value_usd = %estimated_value_usd, "Swap transaction ready");

        SwapOutcome::TxReady {
            transaction_base64,
            summary,
        }
    }

    /// USD value of `amount` base units of `mint`. Unknown mints and
    /// unpriceable assets value to zero; the authority sees that zero
    /// and applies its own rules to it.
    async fn estimate_value(&self, mint: &str, amount: u64) -> Decimal {
        let asset = match self
            .assets
            .iter()
            .find(|a| a.chain == self.chain && a.contract == mint)
        {
            Some(a) => a,
            None => {
                warn!(%mint, "Input mint not in asset registry, valuing at zero");
                return Decimal::ZERO;
            }
        };

        let human_amount = match Decimal::try_from_i128_with_scale(amount as i128, asset.decimals) {
            Ok(a) => a,
            Err(_) => {
                warn!(%mint, amount, "Unrepresentable amount, valuing at zero");
                return Decimal::ZERO;
            }
        };

        match self.resolver.resolve(asset).await {
            Some(price) => human_amount * price,
            None => {
                warn!(%asset, "No price for swap input, valuing at zero");
                Decimal::ZERO
            }
        }
    }

    /// Journal failures never change a swap outcome; the authority has
    /// already recorded the commit by the time we get here.
    async fn journal_event(&self, event_type: &str, data: Value) {
        let map = data
            .as_object()
            .cloned()
            .unwrap_or_default();
        if let Err(e) = self.journal.record_event(event_type, map).await {
            error!(event_type, error = %e, "Failed to journal swap event");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
