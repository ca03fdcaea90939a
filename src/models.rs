//! Core data models for the portfolio assistant

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

//
// ================= Transcript =================
//

/// Lower-cased, digit-substituted, spell-corrected transcript.
///
/// Only [`crate::normalizer::normalize`] constructs one, so holding a value
/// of this type means normalization already ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTranscript(String);

impl NormalizedTranscript {
    pub(crate) fn new(text: String) -> Self {
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whole-word membership test.
    pub fn has_word(&self, word: &str) -> bool {
        self.words().any(|w| w == word)
    }

    pub fn has_any_word(&self, words: &[&str]) -> bool {
        self.words().any(|w| words.contains(&w))
    }

    /// Alphanumeric runs of the transcript.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.0
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
    }
}

impl fmt::Display for NormalizedTranscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ================= Portfolio =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub coin_id: String,
    pub quantity: f64,
}

impl PortfolioEntry {
    pub fn new(coin_id: impl Into<String>, quantity: f64) -> Self {
        Self {
            coin_id: coin_id.into(),
            quantity,
        }
    }
}

/// Coin id → quantity, unique keys, insertion ordered.
///
/// Serializes as a flat JSON object (`{"bitcoin": 1.0}`), which is also the
/// persisted file format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Portfolio {
    entries: Vec<PortfolioEntry>,
}

fn valid_quantity(quantity: f64) -> bool {
    quantity.is_finite() && quantity >= 0.0
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add to the quantity held for `coin_id`, creating the entry if needed.
    pub fn add(&mut self, coin_id: impl Into<String>, quantity: f64) {
        if !valid_quantity(quantity) {
            return;
        }
        let coin_id = coin_id.into();
        match self.entries.iter_mut().find(|e| e.coin_id == coin_id) {
            Some(entry) => entry.quantity += quantity,
            None => self.entries.push(PortfolioEntry::new(coin_id, quantity)),
        }
    }

    /// Replace the quantity held for `coin_id`, keeping its position.
    pub fn set(&mut self, coin_id: impl Into<String>, quantity: f64) {
        if !valid_quantity(quantity) {
            return;
        }
        let coin_id = coin_id.into();
        match self.entries.iter_mut().find(|e| e.coin_id == coin_id) {
            Some(entry) => entry.quantity = quantity,
            None => self.entries.push(PortfolioEntry::new(coin_id, quantity)),
        }
    }

    pub fn commit(&mut self, entry: PortfolioEntry) {
        self.set(entry.coin_id, entry.quantity);
    }

    pub fn get(&self, coin_id: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.coin_id == coin_id)
            .map(|e| e.quantity)
    }

    pub fn first(&self) -> Option<&PortfolioEntry> {
        self.entries.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortfolioEntry> {
        self.entries.iter()
    }

    pub fn coin_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.coin_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Portfolio {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut portfolio = Portfolio::new();
        for (coin_id, quantity) in iter {
            portfolio.add(coin_id, quantity);
        }
        portfolio
    }
}

impl Serialize for Portfolio {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.coin_id, &entry.quantity)?;
        }
        map.end()
    }
}

struct PortfolioVisitor;

impl<'de> Visitor<'de> for PortfolioVisitor {
    type Value = Portfolio;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of coin id to non-negative quantity")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Portfolio, A::Error> {
        let mut portfolio = Portfolio::new();
        while let Some((coin_id, quantity)) = access.next_entry::<String, f64>()? {
            if !valid_quantity(quantity) {
                return Err(serde::de::Error::custom(format!(
                    "invalid quantity {} for {}",
                    quantity, coin_id
                )));
            }
            portfolio.add(coin_id, quantity);
        }
        Ok(portfolio)
    }
}

impl<'de> Deserialize<'de> for Portfolio {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(PortfolioVisitor)
    }
}

//
// ================= Intent =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    CheckValue,
    SavePortfolio,
    UpdatePortfolio,
    CoinPriceLookup,
    Unknown,
}

impl Intent {
    pub const ALL: [Intent; 5] = [
        Intent::CheckValue,
        Intent::SavePortfolio,
        Intent::UpdatePortfolio,
        Intent::CoinPriceLookup,
        Intent::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::CheckValue => "check_value",
            Intent::SavePortfolio => "save_portfolio",
            Intent::UpdatePortfolio => "update_portfolio",
            Intent::CoinPriceLookup => "coin_price_lookup",
            Intent::Unknown => "unknown",
        }
    }

    pub fn parse(raw: &str) -> Option<Intent> {
        Self::ALL.into_iter().find(|i| i.as_str() == raw.trim())
    }
}

/// Validated classifier output. `portfolio` keys are raw coin phrases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    pub portfolio: Portfolio,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            portfolio: Portfolio::new(),
        }
    }
}

//
// ================= Dialogue =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DialogueMode {
    #[default]
    Idle,
    Saving,
}

/// Per-session dialogue record. At most one unconfirmed entry at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueState {
    pub mode: DialogueMode,
    pub pending_entry: Option<PortfolioEntry>,
    pub portfolio: Portfolio,
    pub updated_at: DateTime<Utc>,
}

impl Default for DialogueState {
    fn default() -> Self {
        Self {
            mode: DialogueMode::Idle,
            pending_entry: None,
            portfolio: Portfolio::new(),
            updated_at: Utc::now(),
        }
    }
}

//
// ================= Valuation =================
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationLine {
    pub coin_id: String,
    pub quantity: f64,
    pub price: f64,
    pub value: f64,
    /// Raw share of the total, 0–100. Presentation decides the precision.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ValuationResult {
    pub total_value: f64,
    pub breakdown: Vec<ValuationLine>,
    pub unresolved_coins: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PresentationMode {
    /// Multi-line, currency values and two-decimal percentages.
    #[default]
    Detailed,
    /// One sentence with whole-number percentages, for voice output.
    Spoken,
}

//
// ================= Turn I/O =================
//

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReply {
    pub summary: String,
    pub mode: DialogueMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valuation: Option<ValuationResult>,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for DialogueMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DialogueMode::Idle => "idle",
            DialogueMode::Saving => "saving",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portfolio_add_sums_and_keeps_order() {
        let mut p = Portfolio::new();
        p.add("ethereum", 2.0);
        p.add("bitcoin", 1.0);
        p.add("ethereum", 0.5);

        let ids: Vec<&str> = p.coin_ids().collect();
        assert_eq!(ids, vec!["ethereum", "bitcoin"]);
        assert_eq!(p.get("ethereum"), Some(2.5));
    }

    #[test]
    fn test_portfolio_rejects_negative_quantity() {
        let mut p = Portfolio::new();
        p.add("bitcoin", -1.0);
        p.set("ethereum", f64::NAN);
        assert!(p.is_empty());
    }

    #[test]
    fn test_portfolio_json_preserves_document_order() {
        let p: Portfolio = serde_json::from_str(r#"{"tether": 10, "bitcoin": 1.5}"#).unwrap();
        let ids: Vec<&str> = p.coin_ids().collect();
        assert_eq!(ids, vec!["tether", "bitcoin"]);
        assert_eq!(serde_json::to_string(&p).unwrap(), r#"{"tether":10.0,"bitcoin":1.5}"#);
    }

    #[test]
    fn test_portfolio_json_rejects_bad_values() {
        assert!(serde_json::from_str::<Portfolio>(r#"{"bitcoin": -1}"#).is_err());
        assert!(serde_json::from_str::<Portfolio>(r#"{"bitcoin": "lots"}"#).is_err());
        assert!(serde_json::from_str::<Portfolio>(r#"["bitcoin"]"#).is_err());
    }

    #[test]
    fn test_intent_parse() {
        assert_eq!(Intent::parse("save_portfolio"), Some(Intent::SavePortfolio));
        assert_eq!(Intent::parse(" check_value "), Some(Intent::CheckValue));
        assert_eq!(Intent::parse("sell_everything"), None);
    }
}
