//! Valuation Engine
//!
//! Prices a resolved portfolio in one batched oracle call and builds the
//! total, the per-coin breakdown and the list of coins without a price.
//! Rendering to text is separate so callers pick the presentation.

use crate::market::{PriceMap, PriceOracle};
use crate::models::{Portfolio, PresentationMode, ValuationLine, ValuationResult};
use std::sync::Arc;
use tracing::{info, warn};

pub struct ValuationEngine {
    prices: Arc<dyn PriceOracle>,
}

impl ValuationEngine {
    pub fn new(prices: Arc<dyn PriceOracle>) -> Self {
        Self { prices }
    }

    /// Value a portfolio. A failed price lookup leaves every coin unresolved.
    pub async fn value(&self, portfolio: &Portfolio) -> ValuationResult {
        let prices = self.fetch(portfolio.coin_ids().map(str::to_string).collect()).await;
        let result = compute_valuation(portfolio, &prices);

        info!(
            total_value = result.total_value,
            priced = result.breakdown.len(),
            unresolved = result.unresolved_coins.len(),
            "Portfolio valued"
        );
        result
    }

    /// Current price per coin, `None` when unavailable.
    pub async fn quote(&self, coin_ids: &[String]) -> Vec<(String, Option<f64>)> {
        let prices = self.fetch(coin_ids.to_vec()).await;
        coin_ids
            .iter()
            .map(|id| (id.clone(), usable_price(&prices, id)))
            .collect()
    }

    async fn fetch(&self, coin_ids: Vec<String>) -> PriceMap {
        if coin_ids.is_empty() {
            return PriceMap::new();
        }
        match self.prices.usd_prices(&coin_ids).await {
            Ok(prices) => prices,
            Err(e) => {
                warn!("Price lookup failed, treating all coins as unpriced: {}", e);
                PriceMap::new()
            }
        }
    }
}

fn usable_price(prices: &PriceMap, coin_id: &str) -> Option<f64> {
    prices
        .get(coin_id)
        .or_else(|| prices.get(&coin_id.to_lowercase()))
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Pure valuation over a known price map. Breakdown follows portfolio order.
pub fn compute_valuation(portfolio: &Portfolio, prices: &PriceMap) -> ValuationResult {
    let mut breakdown = Vec::with_capacity(portfolio.len());
    let mut unresolved_coins = Vec::new();
    let mut total_value = 0.0;

    for entry in portfolio.iter() {
        match usable_price(prices, &entry.coin_id) {
            Some(price) => {
                let value = round2(entry.quantity * price);
                total_value += value;
                breakdown.push(ValuationLine {
                    coin_id: entry.coin_id.clone(),
                    quantity: entry.quantity,
                    price,
                    value,
                    percent: 0.0,
                });
            }
            None => unresolved_coins.push(entry.coin_id.clone()),
        }
    }

    let total_value = round2(total_value);

    // Second pass once the total is known
    for line in &mut breakdown {
        line.percent = if total_value > 0.0 {
            line.value / total_value * 100.0
        } else {
            0.0
        };
    }

    ValuationResult {
        total_value,
        breakdown,
        unresolved_coins,
    }
}

/// Render a valuation for the user
pub fn render_report(result: &ValuationResult, mode: PresentationMode) -> String {
    let mut out = match mode {
        PresentationMode::Detailed => {
            let mut out = format!(
                "Total Portfolio Value: {}\nBreakdown:",
                format_usd(result.total_value)
            );
            for line in &result.breakdown {
                out.push_str(&format!(
                    "\n{}: {} ({:.2}%)",
                    display_name(&line.coin_id),
                    format_usd(line.value),
                    line.percent
                ));
            }
            out
        }
        PresentationMode::Spoken => {
            let mut out = format!("Your total portfolio value: {}.", format_usd(result.total_value));
            if !result.breakdown.is_empty() {
                let shares: Vec<String> = result
                    .breakdown
                    .iter()
                    .map(|line| {
                        format!("{} is {} percent", display_name(&line.coin_id), line.percent.round())
                    })
                    .collect();
                out.push_str(&format!(" {} of your total portfolio.", shares.join(", ")));
            }
            out
        }
    };

    if !result.unresolved_coins.is_empty() {
        let names: Vec<String> = result.unresolved_coins.iter().map(|c| display_name(c)).collect();
        let separator = match mode {
            PresentationMode::Detailed => "\n\n",
            PresentationMode::Spoken => " ",
        };
        out.push_str(&format!(
            "{}⚠️ Prices not found for: {}. Please check spelling or try again.",
            separator,
            names.join(", ")
        ));
    }

    out
}

/// Render single-coin price quotes
pub fn render_quotes(quotes: &[(String, Option<f64>)]) -> String {
    quotes
        .iter()
        .map(|(coin_id, price)| match price {
            Some(price) => format!("{} is {}.", display_name(coin_id), format_usd(*price)),
            None => format!("I couldn't find a price for {}.", display_name(coin_id)),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `1234.5` → `$1,234.50`
pub fn format_usd(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}

/// `binancecoin` → `Binancecoin`
pub fn display_name(coin_id: &str) -> String {
    let mut chars = coin_id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssistantError;
    use crate::market::StaticPriceOracle;
    use crate::Result;
    use async_trait::async_trait;

    struct DownOracle;

    #[async_trait]
    impl PriceOracle for DownOracle {
        async fn usd_prices(&self, _coin_ids: &[String]) -> Result<PriceMap> {
            Err(AssistantError::OracleUnavailable("timeout".to_string()))
        }
    }

    fn portfolio(entries: &[(&str, f64)]) -> Portfolio {
        entries.iter().map(|(c, q)| (*c, *q)).collect()
    }

    fn prices(entries: &[(&str, f64)]) -> PriceMap {
        entries.iter().map(|(c, p)| (c.to_string(), *p)).collect()
    }

    #[test]
    fn test_totals_and_percentages() {
        let result = compute_valuation(
            &portfolio(&[("bitcoin", 1.0), ("ethereum", 2.0)]),
            &prices(&[("bitcoin", 60_000.0), ("ethereum", 20_000.0)]),
        );

        assert_eq!(result.total_value, 100_000.0);
        assert_eq!(result.breakdown.len(), 2);
        assert_eq!(result.breakdown[0].coin_id, "bitcoin");
        assert!((result.breakdown[0].percent - 60.0).abs() < 1e-9);
        assert!((result.breakdown[1].percent - 40.0).abs() < 1e-9);
        assert!(result.unresolved_coins.is_empty());
    }

    #[test]
    fn test_values_rounded_to_cents() {
        let result = compute_valuation(
            &portfolio(&[("pepe", 3.0)]),
            &prices(&[("pepe", 0.0000123456)]),
        );
        assert_eq!(result.breakdown[0].value, 0.0);
        assert_eq!(result.total_value, 0.0);
        assert_eq!(result.breakdown[0].percent, 0.0);
    }

    #[test]
    fn test_zero_price_is_unresolved() {
        let result = compute_valuation(&portfolio(&[("bitcoin", 1.0)]), &prices(&[("bitcoin", 0.0)]));

        assert_eq!(result.total_value, 0.0);
        assert_eq!(result.unresolved_coins, vec!["bitcoin".to_string()]);
        assert!(result.breakdown.is_empty());
    }

    #[test]
    fn test_missing_price_excluded_from_total() {
        let result = compute_valuation(
            &portfolio(&[("solana", 4.0), ("tether", 10.0)]),
            &prices(&[("tether", 1.0)]),
        );

        assert_eq!(result.total_value, 10.0);
        assert_eq!(result.unresolved_coins, vec!["solana".to_string()]);
        assert_eq!(result.breakdown[0].percent, 100.0);
    }

    #[test]
    fn test_empty_portfolio() {
        let result = compute_valuation(&Portfolio::new(), &PriceMap::new());
        assert_eq!(result, ValuationResult::default());
    }

    #[test]
    fn test_engine_recovers_from_oracle_failure() {
        let engine = ValuationEngine::new(Arc::new(DownOracle));
        let result = tokio_test::block_on(engine.value(&portfolio(&[("bitcoin", 1.0)])));

        assert_eq!(result.total_value, 0.0);
        assert_eq!(result.unresolved_coins, vec!["bitcoin".to_string()]);
    }

    #[test]
    fn test_engine_quotes() {
        let oracle: StaticPriceOracle = [("bitcoin", 50_000.0)].into_iter().collect();
        let engine = ValuationEngine::new(Arc::new(oracle));
        let quotes = tokio_test::block_on(engine.quote(&["bitcoin".to_string(), "pepe".to_string()]));

        assert_eq!(quotes[0], ("bitcoin".to_string(), Some(50_000.0)));
        assert_eq!(quotes[1], ("pepe".to_string(), None));
        assert_eq!(
            render_quotes(&quotes),
            "Bitcoin is $50,000.00. I couldn't find a price for Pepe."
        );
    }

    #[test]
    fn test_detailed_report() {
        let result = compute_valuation(
            &portfolio(&[("bitcoin", 1.0), ("ethereum", 2.0), ("solana", 1.0)]),
            &prices(&[("bitcoin", 60_000.0), ("ethereum", 20_000.0)]),
        );

        let report = render_report(&result, PresentationMode::Detailed);

        assert_eq!(
            report,
            "Total Portfolio Value: $100,000.00\nBreakdown:\n\
             Bitcoin: $60,000.00 (60.00%)\n\
             Ethereum: $40,000.00 (40.00%)\n\n\
             ⚠️ Prices not found for: Solana. Please check spelling or try again."
        );
    }

    #[test]
    fn test_spoken_report_uses_whole_percentages() {
        let result = compute_valuation(
            &portfolio(&[("bitcoin", 2.0), ("tether", 1.0)]),
            &prices(&[("bitcoin", 1.0), ("tether", 1.0)]),
        );

        let report = render_report(&result, PresentationMode::Spoken);

        assert_eq!(
            report,
            "Your total portfolio value: $3.00. Bitcoin is 67 percent, Tether is 33 percent of your total portfolio."
        );
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(0.0), "$0.00");
        assert_eq!(format_usd(999.999), "$1,000.00");
        assert_eq!(format_usd(1234567.891), "$1,234,567.89");
        assert_eq!(format_usd(12.5), "$12.50");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("binancecoin"), "Binancecoin");
        assert_eq!(display_name(""), "");
    }
}
