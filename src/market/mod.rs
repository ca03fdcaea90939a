//! Market data oracles
//!
//! Price lookups and the coin catalog are external services. The core only
//! sees these traits; `StaticPriceOracle` keeps the system usable offline.

use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

pub mod coingecko;
pub use coingecko::CoinGeckoClient;

/// Canonical coin id → USD price
pub type PriceMap = HashMap<String, f64>;

/// Batched USD price lookup
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Ids absent from the returned map have no known price.
    async fn usd_prices(&self, coin_ids: &[String]) -> Result<PriceMap>;
}

/// Full list of canonical coin ids
#[async_trait]
pub trait CoinCatalog: Send + Sync {
    async fn coin_ids(&self) -> Result<Vec<String>>;
}

/// Fixed price table for development & testing
#[derive(Debug, Clone, Default)]
pub struct StaticPriceOracle {
    prices: PriceMap,
}

impl StaticPriceOracle {
    pub fn new(prices: PriceMap) -> Self {
        Self { prices }
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for StaticPriceOracle {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn usd_prices(&self, coin_ids: &[String]) -> Result<PriceMap> {
        Ok(coin_ids
            .iter()
            .filter_map(|id| self.prices.get(id).map(|p| (id.clone(), *p)))
            .collect())
    }
}

#[async_trait]
impl CoinCatalog for StaticPriceOracle {
    async fn coin_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.prices.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
