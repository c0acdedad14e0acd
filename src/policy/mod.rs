//! Authorization gate against the external policy authority.
//!
//! The authority owns the actual allow/deny decision engine (quotas,
//! cooldowns, destination rules). This module asks it questions over
//! HTTP and derives a read-only status view from the files the
//! authority maintains: its limits config, the per-day spend ledger,
//! and the last-transaction marker.
//!
//! The gate is fail-closed: missing configuration, a transport failure,
//! a non-success response, or an unparseable body all come back as a
//! denial, never as an error the caller might be tempted to ignore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::storage::{read_json, StatePaths};
use crate::types::{AuthorizationMode, AuthorizationStatus, GateDecision, GateRequest};

/// The two questions the rest of the system asks about policy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthorizationGate: Send + Sync {
    /// Ask the authority whether a transaction may proceed. With
    /// `commit = true` an allowed answer also reserves the spend in the
    /// authority's ledger.
    async fn check(&self, request: &GateRequest) -> GateDecision;

    /// Current limits and usage, derived fresh from the authority's
    /// files and the clock.
    async fn status(&self) -> AuthorizationStatus;
}

// ---------------------------------------------------------------------------
// Authority-owned files
// ---------------------------------------------------------------------------

/// Limits as configured in the authority's `policy.toml`. Missing fields
/// read as zero, which the status view reports verbatim.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyLimits {
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub max_tx_usd: Decimal,
    #[serde(default)]
    pub max_daily_usd: Decimal,
    #[serde(default)]
    pub max_daily_txs: u64,
    #[serde(default)]
    pub cooldown_seconds: i64,
}

/// One UTC day's accumulated spend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayBucket {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub value_usd: Decimal,
}

/// The authority's spend ledger, keyed by UTC date.
pub type Ledger = BTreeMap<String, DayBucket>;

/// Timestamp of the most recent committed transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastTx {
    pub ts: i64,
}

/// Ledger key for the UTC day containing `now`. Day rollover is implicit:
/// yesterday's bucket simply stops being the one we look at.
pub fn day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Compute the status view from the authority's files and the clock.
pub fn derive_status(
    limits: &PolicyLimits,
    ledger: &Ledger,
    last_tx: Option<&LastTx>,
    now: DateTime<Utc>,
) -> AuthorizationStatus {
    let bucket = ledger.get(&day_key(now)).cloned().unwrap_or_default();

    let remaining = (limits.max_daily_usd - bucket.value_usd).max(Decimal::ZERO);

    let cooldown_remaining = match last_tx {
        Some(last) => {
            let elapsed = now.timestamp() - last.ts;
            (limits.cooldown_seconds - elapsed).max(0)
        }
        None => 0,
    };

    AuthorizationStatus {
        mode: AuthorizationMode::parse(&limits.mode),
        max_tx_usd: limits.max_tx_usd,
        max_daily_usd: limits.max_daily_usd,
        max_daily_txs: limits.max_daily_txs,
        daily_spent_usd: bucket.value_usd,
        daily_tx_count: bucket.count,
        daily_remaining_usd: remaining,
        cooldown_seconds: limits.cooldown_seconds,
        cooldown_remaining_seconds: cooldown_remaining,
    }
}

// ---------------------------------------------------------------------------
// HTTP authority client
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AuthorityResponse {
    allowed: bool,
    #[serde(default)]
    message: String,
}

pub struct HttpAuthority {
    http: reqwest::Client,
    endpoint: Option<String>,
    limits_path: PathBuf,
    ledger_path: PathBuf,
    last_tx_path: PathBuf,
}

impl HttpAuthority {
    pub fn new(endpoint: Option<String>, paths: &StatePaths) -> Self {
        HttpAuthority {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            endpoint,
            limits_path: paths.policy_limits.clone(),
            ledger_path: paths.policy_ledger.clone(),
            last_tx_path: paths.policy_last_tx.clone(),
        }
    }

    fn read_limits(&self) -> PolicyLimits {
        let contents = match std::fs::read_to_string(&self.limits_path) {
            Ok(c) => c,
            Err(_) => {
                debug!(path = %self.limits_path.display(), "No policy limits file");
                return PolicyLimits::default();
            }
        };
        match toml::from_str(&contents) {
            Ok(limits) => limits,
            Err(e) => {
                warn!(path = %self.limits_path.display(), error = %e, "Unparseable policy limits");
                PolicyLimits::default()
            }
        }
    }
}

#[async_trait]
impl AuthorizationGate for HttpAuthority {
    async fn check(&self, request: &GateRequest) -> GateDecision {
        let endpoint = match &self.endpoint {
            Some(e) => e,
            None => return GateDecision::denied("Authority endpoint not configured"),
        };

        let body = json!({
            "chain": request.chain,
            "value_usd": request.value_usd,
            "to": request.destination,
            "commit": request.commit,
        });

        let response = match self.http.post(endpoint).json(&body).send().await {
            Ok(r) => r,
            Err(e) => return GateDecision::denied(format!("Authority unreachable: {e}")),
        };
        if !response.status().is_success() {
            return GateDecision::denied(format!("Authority returned HTTP {}", response.status()));
        }

        match response.json::<AuthorityResponse>().await {
            Ok(answer) => GateDecision {
                allowed: answer.allowed,
                message: answer.message,
            },
            Err(e) => GateDecision::denied(format!("Malformed authority response: {e}")),
        }
    }

    async fn status(&self) -> AuthorizationStatus {
        let limits = self.read_limits();
        let ledger: Ledger = read_json(&self.ledger_path).unwrap_or_default();
        let last_tx: Option<LastTx> = read_json(&self.last_tx_path);
        derive_status(&limits, &ledger, last_tx.as_ref(), Utc::now())
    }
}
