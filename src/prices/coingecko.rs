//! CoinGecko price source (primary).
//!
//! Only assets with a configured CoinGecko id are queried; everything
//! else is answered with None so the resolver can fall through to the
//! DEX-data source.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::prices::PriceSource;
use crate::types::{AssetRef, NorthstarError};

const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

pub struct CoinGeckoSource {
    http: reqwest::Client,
    base_url: String,
}

impl CoinGeckoSource {
    pub fn new() -> Self {
        Self::with_base_url(COINGECKO_API_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        CoinGeckoSource {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for CoinGeckoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn price_usd(&self, asset: &AssetRef) -> Result<Option<Decimal>, NorthstarError> {
        let id = match &asset.coingecko_id {
            Some(id) => id,
            None => return Ok(None),
        };

        let url = format!("{}/simple/price", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("ids", id.as_str()), ("vs_currencies", "usd")])
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
        parse_simple_price(&body, id)
    }
}

fn source_error(message: String) -> NorthstarError {
    NorthstarError::PriceSource {
        source_name: "coingecko".to_string(),
        message,
    }
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<Decimal>,
}

/// Parse a `/simple/price` response for one id. An id missing from the
/// response body is absence, not an error.
fn parse_simple_price(body: &str, id: &str) -> Result<Option<Decimal>, NorthstarError> {
    let prices: HashMap<String, SimplePrice> = serde_json::from_str(body)
        .map_err(|e| source_error(format!("Malformed response: {e}")))?;
    Ok(prices.get(id).and_then(|p| p.usd))
}
