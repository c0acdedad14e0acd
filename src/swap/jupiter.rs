//! Jupiter swap aggregator client.
//!
//! Two calls: `/quote` to price a route and `/swap` to turn an accepted
//! quote into an unsigned transaction. The quote response is kept as raw
//! JSON because `/swap` wants it echoed back verbatim.

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::swap::{SwapRequest, SwapVenue, VenueQuote};
use crate::types::NorthstarError;

const JUPITER_SWAP_API_URL: &str = "https://api.jup.ag/swap/v1";

pub struct JupiterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl JupiterClient {
    pub fn new(api_key: Option<SecretString>) -> Self {
        Self::with_base_url(JUPITER_SWAP_API_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: Option<SecretString>) -> Self {
        JupiterClient {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("x-api-key", key.expose_secret()),
            None => builder,
        }
    }
}

#[async_trait::async_trait]
impl SwapVenue for JupiterClient {
    fn name(&self) -> &'static str {
        "jupiter"
    }

    async fn quote(&self, request: &SwapRequest) -> Result<VenueQuote, NorthstarError> {
        let url = format!("{}/quote", self.base_url);
        let response = self
            .request(self.http.get(&url).query(&[
                ("inputMint", request.input_mint.as_str()),
                ("outputMint", request.output_mint.as_str()),
                ("amount", &request.amount.to_string()),
                ("slippageBps", &request.slippage_bps.to_string()),
                ("dynamicSlippage", "false"),
            ]))
            .send()
            .await
            .map_err(|e| NorthstarError::QuoteSource(format!("Quote request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(NorthstarError::QuoteSource(format!(
                "Quote returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| NorthstarError::QuoteSource(format!("Failed to read quote body: {e}")))?;
        let quote = parse_quote(&body)?;
        debug!(
            in_amount = quote.in_amount,
            out_amount = quote.out_amount,
            "Quote received"
        );
        Ok(quote)
    }

    async fn build_transaction(
        &self,
        quote: &VenueQuote,
        owner: &str,
    ) -> Result<String, NorthstarError> {
        let url = format!("{}/swap", self.base_url);
        let body = json!({
            "quoteResponse": quote.raw,
            "userPublicKey": owner,
        });

        let response = self
            .request(self.http.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| NorthstarError::TxBuild(format!("Swap request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(NorthstarError::TxBuild(format!(
                "Swap returned HTTP {}",
                response.status()
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| NorthstarError::TxBuild(format!("Malformed swap response: {e}")))?;
        envelope
            .get("swapTransaction")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| NorthstarError::TxBuild("Response missing swapTransaction".into()))
    }
}

/// Parse a `/quote` response. Amounts arrive as decimal strings of base
/// units; `priceImpactPct` is a decimal string too, absent on some routes.
fn parse_quote(body: &str) -> Result<VenueQuote, NorthstarError> {
    let raw: Value = serde_json::from_str(body)
        .map_err(|e| NorthstarError::QuoteSource(format!("Malformed quote: {e}")))?;

    let in_amount = amount_field(&raw, "inAmount")?;
    let out_amount = amount_field(&raw, "outAmount")?;
    let price_impact_pct = raw
        .get("priceImpactPct")
        .and_then(Value::as_str)
        .and_then(|s| Decimal::from_str(s).ok());

    Ok(VenueQuote {
        in_amount,
        out_amount,
        price_impact_pct,
        raw,
    })
}

fn amount_field(raw: &Value, field: &str) -> Result<u64, NorthstarError> {
    raw.get(field)
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| NorthstarError::QuoteSource(format!("Quote missing {field}")))
}
