//! Price resolution with ordered source fallback.
//!
//! Sources are tried in registration order; the first strictly positive
//! price wins. A source error or a non-positive quote moves on to the
//! next source, and exhausting the list yields absence — a missing price
//! is an ordinary outcome, not a failure.

pub mod coingecko;
pub mod dexscreener;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::types::{AssetRef, NorthstarError};

/// One external source of USD prices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Stable name for logs.
    fn name(&self) -> &'static str;

    /// The current USD price, or None when this source does not know
    /// the asset.
    async fn price_usd(&self, asset: &AssetRef) -> Result<Option<Decimal>, NorthstarError>;
}

/// Ordered fallback over price sources.
pub struct PriceResolver {
    sources: Vec<Arc<dyn PriceSource>>,
}

impl PriceResolver {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>) -> Self {
        PriceResolver { sources }
    }

    /// Resolve one asset's USD price. Never errors: failures are logged
    /// and the next source consulted.
    pub async fn resolve(&self, asset: &AssetRef) -> Option<Decimal> {
        for source in &self.sources {
            match source.price_usd(asset).await {
                Ok(Some(price)) if price > Decimal::ZERO => {
                    debug!(source = source.name(), %asset, %price, "Price resolved");
                    return Some(price);
                }
                Ok(Some(price)) => {
                    debug!(source = source.name(), %asset, %price, "Ignoring non-positive price");
                }
                Ok(None) => {
                    debug!(source = source.name(), %asset, "Source has no price");
                }
                Err(e) => {
                    warn!(source = source.name(), %asset, error = %e, "Price source failed");
                }
            }
        }
        debug!(%asset, "No source produced a price");
        None
    }
}
