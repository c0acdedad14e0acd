//! DexScreener price source (fallback).
//!
//! Keyed by contract/mint address rather than a curated id, so it covers
//! long-tail tokens the primary aggregator does not index. Prices arrive
//! as decimal strings and are parsed exactly.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::prices::PriceSource;
use crate::types::{AssetRef, NorthstarError};

const DEXSCREENER_API_URL: &str = "https://api.dexscreener.com/latest/dex/tokens";

pub struct DexScreenerSource {
    http: reqwest::Client,
    base_url: String,
}

impl DexScreenerSource {
    pub fn new() -> Self {
        Self::with_base_url(DEXSCREENER_API_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        DexScreenerSource {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for DexScreenerSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceSource for DexScreenerSource {
    fn name(&self) -> &'static str {
        "dexscreener"
    }

    async fn price_usd(&self, asset: &AssetRef) -> Result<Option<Decimal>, NorthstarError> {
        if asset.contract.is_empty() {
            return Ok(None);
        }

        let url = format!("{}/{}", self.base_url, asset.contract);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| source_error(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(source_error(format!("HTTP {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| source_error(format!("Failed to read body: {e}")))?;
        parse_token_price(&body)
    }
}

fn source_error(message: String) -> NorthstarError {
    NorthstarError::PriceSource {
        source_name: "dexscreener".to_string(),
        message,
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    pairs: Option<Vec<Pair>>,
}

#[derive(Debug, Deserialize)]
struct Pair {
    #[serde(rename = "priceUsd")]
    price_usd: Option<String>,
}

/// Parse a token lookup response. The most liquid pair is listed first;
/// its quoted price is the one we take. No pairs means the token is
/// unknown here, which is absence.
fn parse_token_price(body: &str) -> Result<Option<Decimal>, NorthstarError> {
    let response: TokenResponse = serde_json::from_str(body)
        .map_err(|e| source_error(format!("Malformed response: {e}")))?;

    let price_str = match response
        .pairs
        .as_ref()
        .and_then(|pairs| pairs.first())
        .and_then(|pair| pair.price_usd.as_deref())
    {
        Some(s) => s,
        None => return Ok(None),
    };

    let price = Decimal::from_str(price_str)
        .map_err(|e| source_error(format!("Unparseable price {price_str:?}: {e}")))?;
    Ok(Some(price))
}
