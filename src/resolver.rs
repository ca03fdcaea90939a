//! Coin Resolver
//!
//! Maps a free-text coin mention to a canonical coin id. Exact alias hits
//! win, then a fuzzy match against the known-coin set, otherwise the cleaned
//! input comes back as an unresolved token. No network access happens here.

use lazy_static::lazy_static;
use std::collections::{BTreeSet, HashMap};

/// Minimum similarity (0–1) for a fuzzy match to count.
pub const FUZZY_CUTOFF: f64 = 0.8;

lazy_static! {
    /// Informal spellings → canonical id
    static ref DEFAULT_ALIASES: HashMap<&'static str, &'static str> = [
        ("btc", "bitcoin"),
        ("bit coin", "bitcoin"),
        ("bitcon", "bitcoin"),
        ("eth", "ethereum"),
        ("ether", "ethereum"),
        ("doge", "dogecoin"),
        ("doge coin", "dogecoin"),
        ("dodge coin", "dogecoin"),
        ("bnb", "binancecoin"),
        ("binance", "binancecoin"),
        ("usdt", "tether"),
        ("tether", "tether"),
        ("pepe", "pepe"),
    ]
    .into_iter()
    .collect();
}

/// Read-only alias table
#[derive(Debug, Clone)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
}

impl AliasTable {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        let aliases = aliases
            .into_iter()
            .map(|(alias, coin)| (clean_phrase(&alias), coin))
            .collect();
        Self { aliases }
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(|s| s.as_str())
    }

    /// Distinct canonical ids the table points at
    pub fn canonical_ids(&self) -> BTreeSet<String> {
        self.aliases.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_ALIASES
                .iter()
                .map(|(a, c)| (a.to_string(), c.to_string()))
                .collect(),
        )
    }
}

/// Canonical ids the resolver may resolve to.
///
/// Ordered so fuzzy tie-breaking is deterministic.
#[derive(Debug, Clone, Default)]
pub struct KnownCoinSet {
    ids: BTreeSet<String>,
}

impl KnownCoinSet {
    pub fn from_aliases(aliases: &AliasTable) -> Self {
        Self {
            ids: aliases.canonical_ids(),
        }
    }

    /// Merge a coin catalog snapshot into the set
    pub fn extend_with_catalog<I, S>(&mut self, catalog: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in catalog {
            let id = id.as_ref().trim().to_lowercase();
            if !id.is_empty() {
                self.ids.insert(id);
            }
        }
    }

    pub fn contains(&self, coin_id: &str) -> bool {
        self.ids.contains(coin_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Outcome of resolving one coin phrase
#[derive(Debug, Clone, PartialEq)]
pub enum CoinResolution {
    Alias(String),
    Exact(String),
    Fuzzy { coin_id: String, score: f64 },
    /// Cleaned input, not guaranteed to be a canonical id
    Unresolved(String),
}

impl CoinResolution {
    pub fn into_coin_id(self) -> String {
        match self {
            CoinResolution::Alias(id)
            | CoinResolution::Exact(id)
            | CoinResolution::Fuzzy { coin_id: id, .. }
            | CoinResolution::Unresolved(id) => id,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, CoinResolution::Unresolved(_))
    }
}

pub struct CoinResolver {
    aliases: AliasTable,
    known: KnownCoinSet,
    cutoff: f64,
}

impl CoinResolver {
    pub fn new(aliases: AliasTable, known: KnownCoinSet) -> Self {
        Self {
            aliases,
            known,
            cutoff: FUZZY_CUTOFF,
        }
    }

    /// Curated aliases with their targets as the known set
    pub fn with_defaults() -> Self {
        let aliases = AliasTable::default();
        let known = KnownCoinSet::from_aliases(&aliases);
        Self::new(aliases, known)
    }

    /// Curated set plus a catalog snapshot
    pub fn with_catalog<I, S>(catalog: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let aliases = AliasTable::default();
        let mut known = KnownCoinSet::from_aliases(&aliases);
        known.extend_with_catalog(catalog);
        Self::new(aliases, known)
    }

    pub fn resolve(&self, phrase: &str) -> CoinResolution {
        let cleaned = clean_phrase(phrase);

        if let Some(coin_id) = self.aliases.get(&cleaned) {
            return CoinResolution::Alias(coin_id.to_string());
        }

        if self.known.contains(&cleaned) {
            return CoinResolution::Exact(cleaned);
        }

        match self.best_fuzzy_match(&cleaned) {
            Some((coin_id, score)) => CoinResolution::Fuzzy {
                coin_id: coin_id.to_string(),
                score,
            },
            None => CoinResolution::Unresolved(cleaned),
        }
    }

    pub fn resolve_id(&self, phrase: &str) -> String {
        self.resolve(phrase).into_coin_id()
    }

    /// Membership test against the known-coin set
    pub fn is_known(&self, coin_id: &str) -> bool {
        self.known.contains(coin_id)
    }

    pub fn known_coins(&self) -> &KnownCoinSet {
        &self.known
    }

    fn best_fuzzy_match(&self, cleaned: &str) -> Option<(&str, f64)> {
        if cleaned.is_empty() {
            return None;
        }

        let query: Vec<char> = cleaned.chars().collect();
        let mut best: Option<(&str, f64)> = None;

        for candidate in self.known.iter() {
            let candidate_chars: Vec<char> = candidate.chars().collect();

            // Upper bound on the ratio from lengths alone
            let total = query.len() + candidate_chars.len();
            let bound = 2.0 * query.len().min(candidate_chars.len()) as f64 / total as f64;
            if bound < self.cutoff {
                continue;
            }

            // Known coin on the left: block ties break toward its spelling
            let score = ratio(&candidate_chars, &query);
            if score < self.cutoff {
                continue;
            }

            // Ties go to the lexically greater id
            let better = match best {
                None => true,
                Some((best_id, best_score)) => {
                    score > best_score || (score == best_score && candidate > best_id)
                }
            };
            if better {
                best = Some((candidate, score));
            }
        }

        best
    }
}

impl Default for CoinResolver {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Trim, lower-case, collapse inner whitespace, drop one trailing plural `s`.
pub fn clean_phrase(phrase: &str) -> String {
    let lowered = phrase.to_lowercase();
    let mut cleaned = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.ends_with('s') {
        cleaned.pop();
    }
    cleaned
}

/// Similarity ratio in 0–1: twice the matched characters over the combined
/// length, with matches found as recursive longest common blocks.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio(&a, &b)
}

fn ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(a, b) as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (i, j, k) = longest_common_block(a, b);
    if k == 0 {
        return 0;
    }
    k + matching_characters(&a[..i], &b[..j]) + matching_characters(&a[i + k..], &b[j + k..])
}

/// Longest common substring as (start in a, start in b, length); earliest in
/// `a`, then earliest in `b`, among equally long blocks.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];

    for i in 0..a.len() {
        let mut curr = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                let run = prev[j] + 1;
                curr[j + 1] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            }
        }
        prev = curr;
    }

    best
}
