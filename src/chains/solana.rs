//! Solana JSON-RPC client.
//!
//! `getBalance` for the native SOL position and `getTokenAccountsByOwner`
//! (jsonParsed) for SPL token accounts. Lamports carry 9 decimals; token
//! amounts carry their mint's own scale.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::chains::{ChainClient, TokenHolding};
use crate::types::{Chain, NorthstarError};

const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
const LAMPORT_DECIMALS: u32 = 9;

pub struct SolanaRpc {
    http: reqwest::Client,
    rpc_url: String,
}

impl SolanaRpc {
    pub fn new(rpc_url: &str) -> Self {
        SolanaRpc {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            rpc_url: rpc_url.to_string(),
        }
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, NorthstarError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| rpc_error(format!("{method} request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(rpc_error(format!("{method}: HTTP {}", response.status())));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| rpc_error(format!("{method}: malformed response: {e}")))?;

        if let Some(err) = envelope.get("error") {
            return Err(rpc_error(format!("{method}: {err}")));
        }
        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| rpc_error(format!("{method}: response missing result")))
    }
}

#[async_trait]
impl ChainClient for SolanaRpc {
    fn chain(&self) -> Chain {
        Chain::Solana
    }

    async fn native_balance(&self, address: &str) -> Result<Decimal, NorthstarError> {
        let result = self.rpc_call("getBalance", json!([address])).await?;
        let balance = parse_lamports(&result)?;
        debug!(%address, %balance, "SOL balance fetched");
        Ok(balance)
    }

    async fn token_holdings(&self, address: &str) -> Result<Vec<TokenHolding>, NorthstarError> {
        let params = json!([
            address,
            { "programId": TOKEN_PROGRAM_ID },
            { "encoding": "jsonParsed" },
        ]);
        let result = self.rpc_call("getTokenAccountsByOwner", params).await?;
        let holdings = parse_token_accounts(&result)?;
        debug!(%address, count = holdings.len(), "Token accounts fetched");
        Ok(holdings)
    }
}

fn rpc_error(message: String) -> NorthstarError {
    NorthstarError::Rpc {
        chain: Chain::Solana,
        message,
    }
}

/// Extract lamports from a `getBalance` result and scale to SOL.
fn parse_lamports(result: &Value) -> Result<Decimal, NorthstarError> {
    let lamports = result
        .get("value")
        .and_then(Value::as_u64)
        .ok_or_else(|| rpc_error("getBalance: missing value".into()))?;
    Decimal::try_from_i128_with_scale(lamports as i128, LAMPORT_DECIMALS)
        .map_err(|e| rpc_error(format!("getBalance: unrepresentable balance: {e}")))
}

/// Extract positive token positions from a `getTokenAccountsByOwner`
/// (jsonParsed) result. Accounts that fail to parse are skipped; an
/// account with a zero balance is an empty account, not a holding.
fn parse_token_accounts(result: &Value) -> Result<Vec<TokenHolding>, NorthstarError> {
    let accounts = result
        .get("value")
        .and_then(Value::as_array)
        .ok_or_else(|| rpc_error("getTokenAccountsByOwner: missing value array".into()))?;

    let mut holdings = Vec::new();
    for account in accounts {
        let info = match account.pointer("/account/data/parsed/info") {
            Some(info) => info,
            None => continue,
        };
        let mint = match info.get("mint").and_then(Value::as_str) {
            Some(m) => m,
            None => continue,
        };
        let token_amount = match info.get("tokenAmount") {
            Some(t) => t,
            None => continue,
        };
        let raw: i128 = match token_amount
            .get("amount")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
        {
            Some(r) => r,
            None => continue,
        };
        let decimals = match token_amount.get("decimals").and_then(Value::as_u64) {
            Some(d) => d as u32,
            None => continue,
        };

        let amount = match Decimal::try_from_i128_with_scale(raw, decimals) {
            Ok(a) => a,
            Err(_) => continue,
        };
        if amount <= Decimal::ZERO {
            continue;
        }

        holdings.push(TokenHolding {
            asset_id: mint.to_string(),
            amount,
            decimals,
        });
    }
    Ok(holdings)
}
