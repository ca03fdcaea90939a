//! Entity Extractor
//!
//! Finds `<quantity> <coin phrase>` pairs in a normalized transcript and
//! resolves each phrase to a coin id. Several pairs per utterance are
//! supported ("1 bitcoin and 2 ethereum"); repeated coins are summed.

use crate::models::{NormalizedTranscript, Portfolio};
use crate::resolver::CoinResolver;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

/// Longest coin phrase tried against the resolver, in words.
const MAX_PHRASE_WORDS: usize = 3;

/// Words that end a coin phrase.
const CONNECTORS: &[&str] = &["and", "plus", "also", "then"];

lazy_static! {
    /// Decimal quantity (optionally comma grouped) followed by the text up to
    /// the next digit or list separator.
    static ref QUANTITY_PHRASE: Regex =
        Regex::new(r"(\d+(?:,\d{3})*(?:\.\d+)?)\s+([^\d,;&]+)").unwrap();
}

pub struct EntityExtractor {
    resolver: Arc<CoinResolver>,
}

impl EntityExtractor {
    pub fn new(resolver: Arc<CoinResolver>) -> Self {
        Self { resolver }
    }

    /// All (coin, quantity) mentions, summed per resolved coin id.
    ///
    /// No match yields an empty portfolio.
    pub fn extract(&self, text: &NormalizedTranscript) -> Portfolio {
        let mut portfolio = Portfolio::new();

        for captures in QUANTITY_PHRASE.captures_iter(text.as_str()) {
            let raw_quantity = &captures[1];
            let quantity = match raw_quantity.replace(',', "").parse::<f64>() {
                Ok(q) => q,
                Err(e) => {
                    debug!(raw_quantity, error = %e, "Skipping malformed quantity");
                    continue;
                }
            };

            let words = phrase_words(&captures[2]);
            if words.is_empty() {
                continue;
            }

            let coin_id = self.resolve_phrase(&words);
            debug!(quantity, coin = %coin_id, "Extracted entity");
            portfolio.add(coin_id, quantity);
        }

        portfolio
    }

    /// Longest resolvable prefix wins; otherwise the first word stands in
    /// as the unresolved token.
    fn resolve_phrase(&self, words: &[&str]) -> String {
        let longest = words.len().min(MAX_PHRASE_WORDS);
        for n in (1..=longest).rev() {
            let resolution = self.resolver.resolve(&words[..n].join(" "));
            if resolution.is_resolved() {
                return resolution.into_coin_id();
            }
        }
        self.resolver.resolve_id(words[0])
    }
}

/// Alphanumeric words of a raw phrase, cut at the first connector.
fn phrase_words(raw: &str) -> Vec<&str> {
    raw.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .take_while(|w| !CONNECTORS.contains(w))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;

    fn extractor() -> EntityExtractor {
        EntityExtractor::new(Arc::new(CoinResolver::with_defaults()))
    }

    #[test]
    fn test_multiple_entries() {
        let p = extractor().extract(&normalize("1 bitcoin and 2 ethereum"));
        assert_eq!(p.len(), 2);
        assert_eq!(p.get("bitcoin"), Some(1.0));
        assert_eq!(p.get("ethereum"), Some(2.0));
    }

    #[test]
    fn test_duplicates_are_summed() {
        let p = extractor().extract(&normalize("1 btc and 2 btc"));
        assert_eq!(p.len(), 1);
        assert_eq!(p.get("bitcoin"), Some(3.0));
    }

    #[test]
    fn test_spoken_numbers_and_plurals() {
        let p = extractor().extract(&normalize("I have two bitcoins"));
        assert_eq!(p.get("bitcoin"), Some(2.0));
    }

    #[test]
    fn test_comma_grouped_and_decimal_quantities() {
        let p = extractor().extract(&normalize("1,500 doge coin, 0.25 eth"));
        assert_eq!(p.get("dogecoin"), Some(1500.0));
        assert_eq!(p.get("ethereum"), Some(0.25));
    }

    #[test]
    fn test_trailing_words_ignored_when_prefix_resolves() {
        let p = extractor().extract(&normalize("3 ether please"));
        assert_eq!(p.get("ethereum"), Some(3.0));
    }

    #[test]
    fn test_unresolved_coin_kept_as_token() {
        let p = extractor().extract(&normalize("5 solana tokens"));
        assert_eq!(p.get("solana"), Some(5.0));
    }

    #[test]
    fn test_insertion_order_follows_utterance() {
        let p = extractor().extract(&normalize("2 eth and 1 btc"));
        let ids: Vec<&str> = p.coin_ids().collect();
        assert_eq!(ids, vec!["ethereum", "bitcoin"]);
    }

    #[test]
    fn test_no_entities_is_empty() {
        assert!(extractor().extract(&normalize("save my portfolio")).is_empty());
        assert!(extractor().extract(&normalize("")).is_empty());
        assert!(extractor().extract(&normalize("42")).is_empty());
    }
}
