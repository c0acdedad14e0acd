//! Persistence layer.
//!
//! The on-disk state tree holds one JSON document per "latest" record
//! (portfolio snapshot, authority ledger) and append-only JSONL journals
//! for history, events, decisions, and alerts. JSON replacement is
//! atomic (temp file + rename) so readers never observe a partial
//! document; JSONL appends are serialized through a lock so each record
//! lands intact and whole.

pub mod journal;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use crate::types::NorthstarError;

// ---------------------------------------------------------------------------
// State tree layout
// ---------------------------------------------------------------------------

/// All file locations under one data root.
///
/// ```text
/// financial/
///     memory/   -> decisions.jsonl, strategy.md, context.md
///     state/    -> portfolio.json, portfolio_history.jsonl
///     events/   -> financial_events.jsonl, alerts.jsonl, telegram_outbox.jsonl
/// wallet/
///     state/    -> ledger.json, last_tx.json   (authority-owned, read here)
///     config/   -> policy.toml                 (authority-owned limits)
/// ```
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub root: PathBuf,
    pub memory_dir: PathBuf,
    pub state_dir: PathBuf,
    pub events_dir: PathBuf,
    pub wallet_state_dir: PathBuf,
    pub wallet_config_dir: PathBuf,

    pub portfolio: PathBuf,
    pub portfolio_history: PathBuf,
    pub decisions_log: PathBuf,
    pub events_log: PathBuf,
    pub alerts_log: PathBuf,
    pub outbox_log: PathBuf,
    pub strategy_file: PathBuf,
    pub context_file: PathBuf,

    pub policy_limits: PathBuf,
    pub policy_ledger: PathBuf,
    pub policy_last_tx: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let financial = root.join("financial");
        let memory_dir = financial.join("memory");
        let state_dir = financial.join("state");
        let events_dir = financial.join("events");
        let wallet = root.join("wallet");
        let wallet_state_dir = wallet.join("state");
        let wallet_config_dir = wallet.join("config");

        StatePaths {
            portfolio: state_dir.join("portfolio.json"),
            portfolio_history: state_dir.join("portfolio_history.jsonl"),
            decisions_log: memory_dir.join("decisions.jsonl"),
            events_log: events_dir.join("financial_events.jsonl"),
            alerts_log: events_dir.join("alerts.jsonl"),
            outbox_log: events_dir.join("telegram_outbox.jsonl"),
            strategy_file: memory_dir.join("strategy.md"),
            context_file: memory_dir.join("context.md"),
            policy_limits: wallet_config_dir.join("policy.toml"),
            policy_ledger: wallet_state_dir.join("ledger.json"),
            policy_last_tx: wallet_state_dir.join("last_tx.json"),
            root,
            memory_dir,
            state_dir,
            events_dir,
            wallet_state_dir,
            wallet_config_dir,
        }
    }

    /// Create the full directory tree. An unwritable root is fatal to
    /// whatever operation needed it.
    pub fn ensure_dirs(&self) -> Result<(), NorthstarError> {
        for dir in [
            &self.memory_dir,
            &self.state_dir,
            &self.events_dir,
            &self.wallet_state_dir,
            &self.wallet_config_dir,
        ] {
            fs::create_dir_all(dir).map_err(|e| storage_error(dir, e))?;
        }
        Ok(())
    }
}

fn storage_error(path: &Path, err: impl std::fmt::Display) -> NorthstarError {
    NorthstarError::Storage {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Whole-document JSON
// ---------------------------------------------------------------------------

/// Atomically replace a JSON document: serialize, write to a temp file in
/// the same directory, then rename into place. Readers see either the old
/// document or the new one, never a torn write.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), NorthstarError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| storage_error(path, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let tmp = path.with_file_name(format!("{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    fs::write(&tmp, &json).map_err(|e| storage_error(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        storage_error(path, e)
    })?;

    debug!(path = %path.display(), bytes = json.len(), "Document replaced");
    Ok(())
}

/// Read a JSON document. A missing or unparseable file reads as absent —
/// stale state is never worth a crash, and the next write replaces it.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read document");
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt document, treating as absent");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Append-only JSONL
// ---------------------------------------------------------------------------

/// An append-only log of one JSON record per line.
///
/// Appends are serialized through an internal lock; each logical record
/// lands as a single whole line. Reads skip lines that fail to parse so
/// one bad record never poisons the rest of the log.
#[derive(Debug)]
pub struct JsonlLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonlLog {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. Creates the file on first use.
    pub fn append<T: Serialize>(&self, entry: &T) -> Result<(), NorthstarError> {
        let line = serde_json::to_string(entry).map_err(|e| storage_error(&self.path, e))?;

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| storage_error(&self.path, e))?;
        writeln!(file, "{line}").map_err(|e| storage_error(&self.path, e))?;
        Ok(())
    }

    /// Read the last `limit` parseable records (all of them when
    /// `limit == 0`). A missing file is an empty log.
    pub fn read_recent<T: DeserializeOwned>(&self, limit: usize) -> Vec<T> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        let mut entries: Vec<T> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(path = %self.path.display(), error = %e, "Skipping unparseable line");
                    None
                }
            })
            .collect();

        if limit > 0 && entries.len() > limit {
            entries = entries.split_off(entries.len() - limit);
        }
        entries
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
