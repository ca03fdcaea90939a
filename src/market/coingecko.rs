//! CoinGecko client for prices and the coin catalog
//!
//! The catalog is fetched once and cached for the life of the process.

use super::{CoinCatalog, PriceMap, PriceOracle};
use crate::error::AssistantError;
use crate::retry::RetryPolicy;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

pub const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";

pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
    catalog: OnceCell<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
}

impl CoinGeckoClient {
    pub fn new(base_url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
            catalog: OnceCell::new(),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                error!("CoinGecko request failed for {}: {}", path, e);
                AssistantError::OracleUnavailable(format!("CoinGecko request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("CoinGecko returned {} for {}", status, path);
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                AssistantError::OracleUnavailable(message)
            } else {
                AssistantError::OracleRejected(message)
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AssistantError::OracleMalformed(format!("Invalid JSON response: {}", e)))
    }
}

#[async_trait]
impl PriceOracle for CoinGeckoClient {
    async fn usd_prices(&self, coin_ids: &[String]) -> Result<PriceMap> {
        let ids = distinct_ids(coin_ids);
        if ids.is_empty() {
            return Ok(PriceMap::new());
        }

        let joined = ids.join(",");
        let query = [("ids", joined.as_str()), ("vs_currencies", "usd")];
        let body = self
            .retry
            .run("CoinGecko price lookup", || self.get_json("/simple/price", &query))
            .await?;

        let prices = parse_simple_price(&body, &ids)?;
        debug!(requested = ids.len(), priced = prices.len(), "Prices fetched");
        Ok(prices)
    }
}

#[async_trait]
impl CoinCatalog for CoinGeckoClient {
    async fn coin_ids(&self) -> Result<Vec<String>> {
        let ids = self
            .catalog
            .get_or_try_init(|| async {
                let body = self
                    .retry
                    .run("CoinGecko catalog", || self.get_json("/coins/list", &[]))
                    .await?;
                let ids = parse_catalog(body)?;
                info!(coins = ids.len(), "Coin catalog loaded");
                Ok::<_, AssistantError>(ids)
            })
            .await?;

        Ok(ids.clone())
    }
}

/// Dedupe, keeping first-seen order
fn distinct_ids(coin_ids: &[String]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::with_capacity(coin_ids.len());
    for id in coin_ids {
        let id = id.trim().to_lowercase();
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// `{"bitcoin": {"usd": 50000}}` → price map. Missing or non-numeric
/// entries are left out; a non-object body is malformed.
fn parse_simple_price(body: &Value, ids: &[String]) -> Result<PriceMap> {
    let object = body.as_object().ok_or_else(|| {
        AssistantError::OracleMalformed("price response is not an object".to_string())
    })?;

    Ok(ids
        .iter()
        .filter_map(|id| {
            object
                .get(id)
                .and_then(|entry| entry.get("usd"))
                .and_then(Value::as_f64)
                .map(|price| (id.clone(), price))
        })
        .collect())
}

fn parse_catalog(body: Value) -> Result<Vec<String>> {
    let entries: Vec<CatalogEntry> = serde_json::from_value(body)
        .map_err(|e| AssistantError::OracleMalformed(format!("catalog response: {}", e)))?;
    Ok(entries.into_iter().map(|e| e.id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple_price() {
        let body = json!({
            "bitcoin": {"usd": 50000.5},
            "ethereum": {"usd": null},
            "tether": {"eur": 0.9}
        });
        let ids = vec!["bitcoin".to_string(), "ethereum".to_string(), "tether".to_string(), "pepe".to_string()];

        let prices = parse_simple_price(&body, &ids).unwrap();

        assert_eq!(prices.len(), 1);
        assert_eq!(prices["bitcoin"], 50000.5);
    }

    #[test]
    fn test_parse_simple_price_rejects_non_object() {
        let err = parse_simple_price(&json!(["bitcoin"]), &[]).unwrap_err();
        assert!(matches!(err, AssistantError::OracleMalformed(_)));
    }

    #[test]
    fn test_parse_catalog() {
        let body = json!([
            {"id": "bitcoin", "symbol": "btc", "name": "Bitcoin"},
            {"id": "ethereum", "symbol": "eth", "name": "Ethereum"}
        ]);
        assert_eq!(parse_catalog(body).unwrap(), vec!["bitcoin", "ethereum"]);
        assert!(parse_catalog(json!({"error": "rate limited"})).is_err());
    }

    #[test]
    fn test_distinct_ids_keeps_first_seen_order() {
        let ids = vec!["Ethereum".to_string(), "bitcoin".to_string(), "ethereum".to_string(), " ".to_string()];
        assert_eq!(distinct_ids(&ids), vec!["ethereum", "bitcoin"]);
    }
}
