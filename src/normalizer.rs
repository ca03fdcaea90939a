//! Transcript Normalizer
//!
//! Cleans a raw speech transcript before classification and extraction:
//! lower-casing, spoken small numbers to digits, and known
//! mis-transcriptions of coin names.

use crate::models::NormalizedTranscript;

/// Whole-word spoken number substitutions. "to"/"too" are the usual
/// speech-to-text renderings of "two" in "to bitcoin".
const NUMBER_WORDS: &[(&str, &str)] = &[
    ("zero", "0"),
    ("one", "1"),
    ("two", "2"),
    ("to", "2"),
    ("too", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
];

/// Word-prefix corrections for garbled coin names.
const MIS_TRANSCRIPTIONS: &[(&str, &str)] = &[
    ("douchecoin", "dogecoin"),
    ("pipi", "pepe"),
];

/// Normalize a raw transcript. Pure and idempotent.
///
/// Tokens are whitespace separated; punctuation stays attached to its word,
/// so `"one,"` is not rewritten. Runs of whitespace collapse to one space.
pub fn normalize(text: &str) -> NormalizedTranscript {
    let lowered = text.to_lowercase();

    let words: Vec<String> = lowered
        .split_whitespace()
        .map(|token| correct_token(substitute_number(token)))
        .collect();

    NormalizedTranscript::new(words.join(" "))
}

fn substitute_number(token: &str) -> &str {
    NUMBER_WORDS
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, digit)| *digit)
        .unwrap_or(token)
}

fn correct_token(token: &str) -> String {
    for (wrong, right) in MIS_TRANSCRIPTIONS {
        if let Some(rest) = token.strip_prefix(wrong) {
            return format!("{}{}", right, rest);
        }
    }
    token.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_words_become_digits() {
        assert_eq!(normalize("I have Two bitcoin").as_str(), "i have 2 bitcoin");
        assert_eq!(normalize("one eth and nine doge").as_str(), "1 eth and 9 doge");
        assert_eq!(normalize("zero pepe").as_str(), "0 pepe");
    }

    #[test]
    fn test_number_words_inside_other_words_untouched() {
        assert_eq!(normalize("someone tonight").as_str(), "someone tonight");
        assert_eq!(normalize("tether").as_str(), "tether");
    }

    #[test]
    fn test_adjacent_number_words_all_replaced() {
        assert_eq!(normalize("one one two").as_str(), "1 1 2");
    }

    #[test]
    fn test_mis_transcriptions_corrected() {
        assert_eq!(normalize("5 Douchecoin").as_str(), "5 dogecoin");
        assert_eq!(normalize("100 pipis").as_str(), "100 pepes");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "  One  BITCOIN and too ethereum ",
            "save my portfolio",
            "3 douchecoin, 4 pipi",
            "ünïcödé €100 one",
            "to too two",
        ];
        for s in samples {
            let once = normalize(s);
            let twice = normalize(once.as_str());
            assert_eq!(once, twice, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_empty_and_non_ascii_input() {
        assert!(normalize("").is_empty());
        assert!(normalize("   ").is_empty());
        assert_eq!(normalize("ÉTHER").as_str(), "éther");
    }
}
