//! Financial event journal.
//!
//! Three append-only streams: events (everything money-adjacent the agent
//! does), decisions (the reasoning behind them), and alerts. Events are
//! additionally pushed to the notifier best-effort; a failed notification
//! never fails the recording operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::notify::TelegramNotifier;
use crate::storage::{JsonlLog, StatePaths};
use crate::types::NorthstarError;

/// Event types that represent actual value movement, as opposed to
/// observations and bookkeeping.
pub const TRANSACTION_EVENT_TYPES: &[&str] =
    &["trade", "swap", "transfer", "bet", "deposit", "withdrawal"];

/// One journaled financial event. `data` carries event-specific fields
/// flattened into the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialEvent {
    pub ts: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

/// A recorded decision with its rationale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub ts: DateTime<Utc>,
    #[serde(rename = "type")]
    pub decision_type: String,
    pub rationale: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

/// An operator-facing alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub ts: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

/// Owns the three journal streams and the notifier handle.
pub struct EventJournal {
    events: JsonlLog,
    decisions: JsonlLog,
    alerts: JsonlLog,
    notifier: Arc<TelegramNotifier>,
}

impl EventJournal {
    pub fn new(paths: &StatePaths, notifier: Arc<TelegramNotifier>) -> Self {
        EventJournal {
            events: JsonlLog::new(&paths.events_log),
            decisions: JsonlLog::new(&paths.decisions_log),
            alerts: JsonlLog::new(&paths.alerts_log),
            notifier,
        }
    }

    /// Record an event and push it to the notifier. The append is the
    /// operation; the notification is best-effort on top.
    pub async fn record_event(
        &self,
        event_type: &str,
        data: Map<String, Value>,
    ) -> Result<(), NorthstarError> {
        let event = FinancialEvent {
            ts: Utc::now(),
            event_type: event_type.to_string(),
            data,
        };
        self.events.append(&event)?;
        debug!(event_type, "Financial event recorded");

        let summary = format_event(&event);
        if !self.notifier.send(&summary).await {
            debug!(event_type, "Event notification not delivered");
        }
        Ok(())
    }

    pub fn record_decision(
        &self,
        decision_type: &str,
        rationale: &str,
        data: Map<String, Value>,
    ) -> Result<(), NorthstarError> {
        let record = DecisionRecord {
            ts: Utc::now(),
            decision_type: decision_type.to_string(),
            rationale: rationale.to_string(),
            data,
        };
        self.decisions.append(&record)
    }

    /// Record an alert and push it to the notifier best-effort.
    pub async fn record_alert(&self, level: &str, message: &str) -> Result<(), NorthstarError> {
        let record = AlertRecord {
            ts: Utc::now(),
            level: level.to_string(),
            message: message.to_string(),
        };
        self.alerts.append(&record)?;
        warn!(level, message, "Alert raised");

        let text = format!("[{}] {}", level.to_uppercase(), message);
        let _ = self.notifier.send(&text).await;
        Ok(())
    }

    pub fn recent_events(&self, limit: usize) -> Vec<FinancialEvent> {
        self.events.read_recent(limit)
    }

    pub fn recent_decisions(&self, limit: usize) -> Vec<DecisionRecord> {
        self.decisions.read_recent(limit)
    }

    pub fn recent_alerts(&self, limit: usize) -> Vec<AlertRecord> {
        self.alerts.read_recent(limit)
    }

    /// The last `limit` events that moved value, scanning a bounded
    /// recent window of the journal.
    pub fn transactions(&self, limit: usize) -> Vec<FinancialEvent> {
        let mut txs: Vec<FinancialEvent> = self
            .events
            .read_recent(200)
            .into_iter()
            .filter(|e: &FinancialEvent| TRANSACTION_EVENT_TYPES.contains(&e.event_type.as_str()))
            .collect();
        if limit > 0 && txs.len() > limit {
            txs = txs.split_off(txs.len() - limit);
        }
        txs
    }
}

/// Render an event as a one-line notification message.
fn format_event(event: &FinancialEvent) -> String {
    let mut parts: Vec<String> = Vec::new();
    for key in ["chain", "symbol", "amount", "value_usd", "status"] {
        if let Some(value) = event.data.get(key) {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            parts.push(format!("{key}={rendered}"));
        }
    }
    if parts.is_empty() {
        format!("Event: {}", event.event_type)
    } else {
        format!("Event: {} ({})", event.event_type, parts.join(", "))
    }
}
