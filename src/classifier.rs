//! Intent Classifier
//!
//! A cheap keyword gate drops obviously unrelated utterances to `unknown`
//! without spending an oracle call. Everything else goes to the NLU oracle,
//! whose JSON is validated before use. Any failure degrades to `unknown`.

use crate::error::AssistantError;
use crate::models::{Classification, Intent, NormalizedTranscript, Portfolio};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Static keyword list, matched by substring
const GATE_KEYWORDS: &[&str] = &[
    // Coins
    "bitcoin", "btc", "ethereum", "eth", "dogecoin", "doge", "coin", "crypto",
    // Portfolio tasks
    "portfolio", "save", "update", "add",
    // Value checks
    "check", "value", "worth", "price",
];

/// External natural-language oracle: prompt in, raw completion text out.
#[async_trait]
pub trait NluOracle: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct IntentClassifier {
    oracle: Arc<dyn NluOracle>,
}

impl IntentClassifier {
    pub fn new(oracle: Arc<dyn NluOracle>) -> Self {
        Self { oracle }
    }

    /// Classify a transcript. Never fails; oracle trouble yields `unknown`.
    pub async fn classify(&self, text: &NormalizedTranscript) -> Classification {
        if !passes_keyword_gate(text) {
            debug!("Keyword gate rejected transcript");
            return Classification::unknown();
        }

        let raw = match self.oracle.complete(&build_prompt(text)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("NLU oracle call failed: {}", e);
                return Classification::unknown();
            }
        };
        debug!(raw = %raw, "NLU oracle response");

        match parse_oracle_response(&raw) {
            Ok(classification) => {
                info!(
                    intent = %classification.intent,
                    coins = classification.portfolio.len(),
                    "Classified transcript"
                );
                classification
            }
            Err(e) => {
                warn!("Rejected NLU oracle response: {}", e);
                Classification::unknown()
            }
        }
    }
}

/// Fast path relevance check
pub fn passes_keyword_gate(text: &NormalizedTranscript) -> bool {
    let text = text.as_str();
    GATE_KEYWORDS.iter().any(|kw| text.contains(kw))
}

/// Build the fixed instruction prompt around the transcript
pub fn build_prompt(text: &NormalizedTranscript) -> String {
    format!(
        r#"You are a crypto voice assistant. Classify the user's intent as exactly one of:
- check_value
- save_portfolio
- update_portfolio
- coin_price_lookup
- unknown

Also extract any mentioned coins and amounts (e.g. "2 ethereum").

Rules:
- Return ONLY one JSON object
- No explanation text
- JSON format:

{{
  "intent": "check_value",
  "portfolio": {{"bitcoin": 1.0, "ethereum": 2.0}}
}}

User: "{}""#,
        text.as_str().replace('"', "'")
    )
}

/// Validate an oracle completion against the documented shape.
///
/// Accepts the object bare, fenced in markdown, or embedded in prose. A
/// missing or null `portfolio` is read as empty; any other deviation is an
/// `OracleMalformed` error.
pub fn parse_oracle_response(raw: &str) -> Result<Classification> {
    let json = extract_json_object(raw)
        .ok_or_else(|| AssistantError::OracleMalformed("no JSON object in response".to_string()))?;

    let object = json
        .as_object()
        .ok_or_else(|| AssistantError::OracleMalformed("response is not an object".to_string()))?;

    let raw_intent = object
        .get("intent")
        .and_then(Value::as_str)
        .ok_or_else(|| AssistantError::OracleMalformed("missing string 'intent'".to_string()))?;

    let intent = Intent::parse(raw_intent).ok_or_else(|| {
        AssistantError::OracleMalformed(format!("unsupported intent '{}'", raw_intent))
    })?;

    let portfolio = match object.get("portfolio") {
        None | Some(Value::Null) => Portfolio::new(),
        Some(Value::Object(entries)) => {
            let mut portfolio = Portfolio::new();
            for (phrase, quantity) in entries {
                let quantity = quantity
                    .as_f64()
                    .filter(|q| q.is_finite() && *q >= 0.0)
                    .ok_or_else(|| {
                        AssistantError::OracleMalformed(format!(
                            "invalid quantity for '{}': {}",
                            phrase, quantity
                        ))
                    })?;
                let phrase = phrase.trim().to_lowercase();
                if phrase.is_empty() {
                    return Err(AssistantError::OracleMalformed(
                        "empty coin phrase".to_string(),
                    ));
                }
                portfolio.add(phrase, quantity);
            }
            portfolio
        }
        Some(other) => {
            return Err(AssistantError::OracleMalformed(format!(
                "'portfolio' is not an object: {}",
                other
            )))
        }
    };

    Ok(Classification { intent, portfolio })
}

fn extract_json_object(raw: &str) -> Option<Value> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if let Ok(parsed) = serde_json::from_str::<Value>(cleaned) {
        return Some(parsed);
    }

    // Fallback: the largest { ... } block in the text
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&cleaned[start..=end]).ok()
}
