//! Lexical normalization for free-text positions.
//!
//! Free-text answers cannot be bucketed by raw equality: trivial
//! differences in casing, punctuation, and whitespace would split
//! semantically identical answers across buckets. The [`Lexicon`]
//! reduces text to a canonical token form and scores pairwise
//! similarity with domain terms counted at double weight, so agreement
//! on the legal substance matters more than agreement on filler words.

use std::collections::HashSet;

use regex::Regex;

/// Terms that carry domain weight in similarity scoring.
///
/// Overlap on these counts double relative to ordinary tokens.
const DOMAIN_TERMS: &[&str] = &[
    "liability",
    "indemnity",
    "negligence",
    "statute",
    "precedent",
    "jurisdiction",
    "contract",
    "tort",
    "damages",
    "breach",
    "clause",
    "warranty",
    "remedy",
    "estoppel",
    "consideration",
];

/// Weight applied to domain-term overlap.
const DOMAIN_TERM_WEIGHT: f64 = 2.0;

/// Normalizer and similarity scorer for free text.
#[derive(Debug, Clone)]
pub struct Lexicon {
    /// Matches every character that is not a letter, digit, or space.
    strip: Regex,
    /// Domain terms, for weighted overlap.
    domain_terms: HashSet<&'static str>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexicon {
    /// Creates a lexicon with the built-in legal domain terms.
    pub fn new() -> Self {
        Self {
            strip: Regex::new(r"[^a-z0-9\s]").unwrap(),
            domain_terms: DOMAIN_TERMS.iter().copied().collect(),
        }
    }

    /// Reduces text to its canonical form: lowercase, punctuation
    /// stripped, whitespace collapsed.
    pub fn normalize(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let stripped = self.strip.replace_all(&lowered, " ");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Splits normalized text into a token set.
    pub fn tokens(&self, text: &str) -> HashSet<String> {
        self.normalize(text)
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Weighted token-overlap similarity in [0, 1].
    ///
    /// Jaccard over token sets with domain terms counted at
    /// [`DOMAIN_TERM_WEIGHT`]. Two empty texts score 0.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        let tokens_a = self.tokens(a);
        let tokens_b = self.tokens(b);
        if tokens_a.is_empty() && tokens_b.is_empty() {
            return 0.0;
        }

        let weight = |token: &str| {
            if self.domain_terms.contains(token) {
                DOMAIN_TERM_WEIGHT
            } else {
                1.0
            }
        };

        let intersection: f64 = tokens_a
            .intersection(&tokens_b)
            .map(|t| weight(t))
            .sum();
        let union: f64 = tokens_a.union(&tokens_b).map(|t| weight(t)).sum();

        if union == 0.0 {
            0.0
        } else {
            intersection / union
        }
    }

    /// Returns true if the token is a recognized domain term.
    pub fn is_domain_term(&self, token: &str) -> bool {
        self.domain_terms.contains(token)
    }
}
