//! Operator notifications via Telegram.
//!
//! Every send is best-effort: the caller gets a bool, never an error,
//! and an undelivered message must not fail the operation that raised
//! it. Successful sends are mirrored to the outbox journal so the
//! message history survives restarts.

use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::storage::JsonlLog;
use crate::types::{AuthorizationStatus, PortfolioChange, PortfolioSnapshot};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct OutboxRecord {
    ts: chrono::DateTime<Utc>,
    chat_id: String,
    text: String,
}

pub struct TelegramNotifier {
    http: reqwest::Client,
    api_base: String,
    token: Option<SecretString>,
    chat_id: Option<String>,
    outbox: JsonlLog,
}

impl TelegramNotifier {
    pub fn new(token: Option<SecretString>, chat_id: Option<String>, outbox: JsonlLog) -> Self {
        TelegramNotifier {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            api_base: TELEGRAM_API_URL.to_string(),
            token,
            chat_id,
            outbox,
        }
    }

    /// A notifier with no credentials; every send returns false.
    pub fn unconfigured(outbox: JsonlLog) -> Self {
        Self::new(None, None, outbox)
    }

    #[cfg(test)]
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.chat_id.is_some()
    }

    /// Send a message. Returns true only when Telegram accepted it.
    pub async fn send(&self, text: &str) -> bool {
        let (token, chat_id) = match (&self.token, &self.chat_id) {
            (Some(t), Some(c)) => (t, c),
            _ => {
                debug!("Notifier not configured, message dropped");
                return false;
            }
        };

        let url = format!("{}/bot{}/sendMessage", self.api_base, token.expose_secret());
        let body = json!({ "chat_id": chat_id, "text": text });

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                let record = OutboxRecord {
                    ts: Utc::now(),
                    chat_id: chat_id.clone(),
                    text: text.to_string(),
                };
                if let Err(e) = self.outbox.append(&record) {
                    warn!(error = %e, "Failed to journal outbound message");
                }
                true
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "Telegram rejected message");
                false
            }
            Err(e) => {
                warn!(error = %e, "Telegram send failed");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Message formatting
// ---------------------------------------------------------------------------

/// Warning raised when daily spend crosses the given utilisation threshold.
pub fn format_policy_warning(status: &AuthorizationStatus, utilisation_pct: Decimal) -> String {
    format!(
        "⚠️ Policy budget warning: ${:.2} of ${:.2} daily limit spent ({:.0}%). \
         {} txs used of {}. Remaining today: ${:.2}.",
        status.daily_spent_usd,
        status.max_daily_usd,
        utilisation_pct,
        status.daily_tx_count,
        status.max_daily_txs,
        status.daily_remaining_usd,
    )
}

/// Daily portfolio summary.
pub fn format_daily_summary(snapshot: &PortfolioSnapshot, change: &PortfolioChange) -> String {
    let mut lines = vec![
        "📊 Daily portfolio summary".to_string(),
        format!("Total value: ${:.2}", snapshot.total_value_usd),
        format!("24h change: {change}"),
        format!("Holdings: {}", snapshot.holdings.len()),
    ];
    for holding in &snapshot.holdings {
        lines.push(format!("  {holding}"));
    }
    lines.push(format!("Policy: {}", snapshot.authorization));
    lines.join("\n")
}
