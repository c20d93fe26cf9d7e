//! Canonical positions.
//!
//! A [`Position`] is the comparable unit extracted from one feedback
//! record. Equality, hashing, and ordering all go through the canonical
//! key so that semantically identical answers land in the same
//! aggregation bucket regardless of label order, casing, or phrasing.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A canonical, order-independent representation of "what this feedback
/// asserts". Not persisted; derived transiently during aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Canonical key. Two positions are the same iff their keys match.
    key: String,
    /// Human-readable rendering for results and reports.
    display: String,
}

impl Position {
    /// Creates a position from a canonical key and display form.
    pub fn new(key: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            display: display.into(),
        }
    }

    /// Builds a position from an unordered label set.
    ///
    /// Labels are lowercased, trimmed, deduplicated, and sorted, so
    /// `["B", "a"]` and `["a ", "b"]` collapse to the same key.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = labels
            .into_iter()
            .map(|l| l.as_ref().trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();
        let display = normalized.join(", ");
        let key = normalized.join("|");
        Self { key, display }
    }

    /// Returns the canonical key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the display form.
    pub fn display(&self) -> &str {
        &self.display
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Position {}

impl Hash for Position {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_label_order_is_irrelevant() {
        let a = Position::from_labels(["negligence", "liability"]);
        let b = Position::from_labels(["liability", "negligence"]);
        assert_eq!(a, b);
        assert_eq!(a.key(), "liability|negligence");
    }

    #[test]
    fn test_labels_are_case_folded_and_deduped() {
        let a = Position::from_labels(["Breach", "breach ", "DAMAGES"]);
        assert_eq!(a.key(), "breach|damages");
        assert_eq!(a.display(), "breach, damages");
    }

    #[test]
    fn test_positions_hash_by_key() {
        let mut set = HashSet::new();
        set.insert(Position::from_labels(["a", "b"]));
        set.insert(Position::from_labels(["b", "a"]));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_display_differences_do_not_split_buckets() {
        let a = Position::new("k", "first rendering");
        let b = Position::new("k", "second rendering");
        assert_eq!(a, b);
    }

    #[test]
    fn test_ordering_is_by_key() {
        let mut positions = vec![Position::new("b", "B"), Position::new("a", "A")];
        positions.sort();
        assert_eq!(positions[0].key(), "a");
    }
}
