//! EVM JSON-RPC client (Base).
//!
//! Native balance via `eth_getBalance`. Token positions on Base come
//! from the configured asset registry rather than on-chain discovery;
//! there is no enumeration RPC on EVM chains, so `token_holdings` is
//! empty here.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::chains::{ChainClient, TokenHolding};
use crate::types::{Chain, NorthstarError};

const WEI_DECIMALS: u32 = 18;

pub struct EvmRpc {
    http: reqwest::Client,
    rpc_url: String,
    chain: Chain,
}

impl EvmRpc {
    pub fn new(chain: Chain, rpc_url: &str) -> Self {
        EvmRpc {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            rpc_url: rpc_url.to_string(),
            chain,
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
            .map_err(|e| self.rpc_error(format!("{method} request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(self.rpc_error(format!("{method}: HTTP {}", response.status())));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| self.rpc_error(format!("{method}: malformed response: {e}")))?;

        if let Some(err) = envelope.get("error") {
            return Err(self.rpc_error(format!("{method}: {err}")));
        }
        envelope
            .get("result")
            .cloned()
            .ok_or_else(|| self.rpc_error(format!("{method}: response missing result")))
    }

    fn rpc_error(&self, message: String) -> NorthstarError {
        NorthstarError::Rpc {
            chain: self.chain,
            message,
        }
    }
}

#[async_trait]
impl ChainClient for EvmRpc {
    fn chain(&self) -> Chain {
        self.chain
    }

    async fn native_balance(&self, address: &str) -> Result<Decimal, NorthstarError> {
        let result = self
            .rpc_call("eth_getBalance", json!([address, "latest"]))
            .await?;
        let hex = result
            .as_str()
            .ok_or_else(|| self.rpc_error("eth_getBalance: non-string result".into()))?;
        let balance =
            parse_wei(hex).map_err(|msg| self.rpc_error(format!("eth_getBalance: {msg}")))?;
        debug!(chain = %self.chain, %address, %balance, "Native balance fetched");
        Ok(balance)
    }

    async fn token_holdings(&self, _address: &str) -> Result<Vec<TokenHolding>, NorthstarError> {
        Ok(Vec::new())
    }
}

/// Convert a 0x-prefixed hex wei quantity to a decimal ETH amount.
fn parse_wei(hex: &str) -> Result<Decimal, String> {
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    if digits.is_empty() {
        return Err("empty quantity".into());
    }
    let wei =
        u128::from_str_radix(digits, 16).map_err(|e| format!("invalid hex {hex:?}: {e}"))?;
    if wei > i128::MAX as u128 {
        return Err(format!("balance out of range: {wei}"));
    }
    Decimal::try_from_i128_with_scale(wei as i128, WEI_DECIMALS)
        .map_err(|e| format!("unrepresentable balance: {e}"))
}
