//! Rolling context document.
//!
//! A regenerated markdown summary of where the portfolio stands: latest
//! valuation, the operator-written strategy note, recent decisions,
//! policy status, and recent alerts. Rewritten wholesale after each
//! snapshot so downstream consumers always read one coherent document.

use std::fs;
use tracing::debug;

use crate::storage::journal::{AlertRecord, DecisionRecord};
use crate::storage::StatePaths;
use crate::types::{NorthstarError, PortfolioChange, PortfolioSnapshot};

const DEFAULT_STRATEGY: &str = "No strategy set.";
const DECISIONS_SHOWN: usize = 5;
const ALERTS_SHOWN: usize = 5;

/// The operator's strategy note, or a placeholder when none exists.
pub fn read_strategy(paths: &StatePaths) -> String {
    match fs::read_to_string(&paths.strategy_file) {
        Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => DEFAULT_STRATEGY.to_string(),
    }
}

pub fn write_strategy(paths: &StatePaths, text: &str) -> Result<(), NorthstarError> {
    fs::write(&paths.strategy_file, text).map_err(|e| NorthstarError::Storage {
        path: paths.strategy_file.display().to_string(),
        message: e.to_string(),
    })
}

/// Regenerate `context.md` from current state.
pub fn update_context(
    paths: &StatePaths,
    snapshot: Option<&PortfolioSnapshot>,
    change: &PortfolioChange,
    decisions: &[DecisionRecord],
    alerts: &[AlertRecord],
) -> Result<(), NorthstarError> {
    let strategy = read_strategy(paths);
    let rendered = render_context(snapshot, change, &strategy, decisions, alerts);
    fs::write(&paths.context_file, rendered).map_err(|e| NorthstarError::Storage {
        path: paths.context_file.display().to_string(),
        message: e.to_string(),
    })?;
    debug!(path = %paths.context_file.display(), "Context refreshed");
    Ok(())
}

/// Render the context document. Pure so the shape is testable.
pub fn render_context(
    snapshot: Option<&PortfolioSnapshot>,
    change: &PortfolioChange,
    strategy: &str,
    decisions: &[DecisionRecord],
    alerts: &[AlertRecord],
) -> String {
    let mut out = String::from("# NORTHSTAR Context\n\n");

    out.push_str("## Portfolio Summary\n");
    match snapshot {
        Some(snap) => {
            out.push_str(&format!("- Total value: ${:.2}\n", snap.total_value_usd));
            out.push_str(&format!("- 24h change: {change}\n"));
            out.push_str(&format!("- Holdings: {}\n", snap.holdings.len()));
            for holding in &snap.holdings {
                out.push_str(&format!("  - {holding}\n"));
            }
            out.push_str(&format!(
                "- As of: {}\n",
                snap.ts.format("%Y-%m-%d %H:%M UTC")
            ));
        }
        None => out.push_str("No snapshot yet.\n"),
    }

    out.push_str("\n## Active Strategy\n");
    out.push_str(strategy);
    out.push('\n');

    out.push_str("\n## Policy Status\n");
    match snapshot {
        Some(snap) => out.push_str(&format!("{}\n", snap.authorization)),
        None => out.push_str("Unknown.\n"),
    }

    out.push_str("\n## Recent Decisions\n");
    if decisions.is_empty() {
        out.push_str("None.\n");
    }
    for decision in decisions.iter().rev().take(DECISIONS_SHOWN) {
        out.push_str(&format!(
            "- [{}] {}: {}\n",
            decision.ts.format("%Y-%m-%d %H:%M"),
            decision.decision_type,
            decision.rationale,
        ));
    }

    out.push_str("\n## Recent Alerts\n");
    if alerts.is_empty() {
        out.push_str("None.\n");
    }
    for alert in alerts.iter().rev().take(ALERTS_SHOWN) {
        out.push_str(&format!(
            "- [{}] {}: {}\n",
            alert.ts.format("%Y-%m-%d %H:%M"),
            alert.level,
            alert.message,
        ));
    }

    out
}
