use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::normalize::CanonicalKey;

// ---------------------------------------------------------------------------
// KnowledgeEntry
// ---------------------------------------------------------------------------

/// One medication explanation, as authored in the explanation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnowledgeEntry {
    pub key: CanonicalKey,
    /// Name with the casing and accents used by the table author.
    pub display_name: String,
    pub explanation: String,
}

// ---------------------------------------------------------------------------
// InteractionRule
// ---------------------------------------------------------------------------

/// A known risk when two medications are taken together.
///
/// The pair is unordered and always holds two distinct keys; construction
/// goes through [`InteractionRule::new`] which enforces that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionRule {
    first: CanonicalKey,
    second: CanonicalKey,
    risk: String,
}

impl InteractionRule {
    /// Build a rule from two keys, rejecting an empty key or a self-pair.
    pub fn new(first: CanonicalKey, second: CanonicalKey, risk: String) -> Result<Self, InvalidPair> {
        if first.is_empty() || second.is_empty() {
            return Err(InvalidPair::EmptyName);
        }
        if first == second {
            return Err(InvalidPair::SelfPair(first));
        }
        Ok(Self {
            first,
            second,
            risk,
        })
    }

    pub fn keys(&self) -> (&CanonicalKey, &CanonicalKey) {
        (&self.first, &self.second)
    }

    pub fn risk(&self) -> &str {
        &self.risk
    }

    /// Unordered pair equality against two list keys.
    pub fn matches_pair(&self, a: &CanonicalKey, b: &CanonicalKey) -> bool {
        (self.first == *a && self.second == *b) || (self.first == *b && self.second == *a)
    }

    /// Whether this rule names the given medication on either side.
    pub fn involves(&self, key: &CanonicalKey) -> bool {
        self.first == *key || self.second == *key
    }

    /// The other medication of the pair, if `key` is one side of it.
    pub fn other(&self, key: &CanonicalKey) -> Option<&CanonicalKey> {
        if self.first == *key {
            Some(&self.second)
        } else if self.second == *key {
            Some(&self.first)
        } else {
            None
        }
    }
}

/// Why two keys cannot form an [`InteractionRule`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidPair {
    #[error("empty medication name")]
    EmptyName,

    #[error("'{0}' is paired with itself")]
    SelfPair(CanonicalKey),
}

// ---------------------------------------------------------------------------
// Raw table records (as read from disk)
// ---------------------------------------------------------------------------

/// One record of the interaction table before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    #[serde(alias = "nomes")]
    pub pair: Vec<String>,
    #[serde(alias = "descricao")]
    pub risk: String,
}

// ---------------------------------------------------------------------------
// KnowledgeError
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum KnowledgeError {
    #[error("Knowledge table load failed ({0}): {1}")]
    Load(String, String),

    #[error("Knowledge table parse failed ({0}): {1}")]
    Parse(String, String),

    #[error("Unsupported knowledge table format: {0}")]
    UnsupportedFormat(String),

    #[error("Explanation entry {index} has an empty medication name")]
    EmptyName { index: usize },

    #[error("Interaction rule {index} is invalid: {reason}")]
    InvalidRule { index: usize, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::normalize::normalize;

    fn rule(a: &str, b: &str) -> InteractionRule {
        InteractionRule::new(normalize(a), normalize(b), "risk".into()).unwrap()
    }

    #[test]
    fn self_pair_rejected() {
        let err = InteractionRule::new(normalize("Dipirona"), normalize("dipirôna"), "x".into())
            .unwrap_err();
        assert_eq!(err, InvalidPair::SelfPair(normalize("dipirona")));
        assert!(err.to_string().contains("itself"));
    }

    #[test]
    fn empty_key_rejected() {
        assert_eq!(
            InteractionRule::new(normalize(""), normalize("ibuprofeno"), "x".into()),
            Err(InvalidPair::EmptyName)
        );
        assert_eq!(
            InteractionRule::new(normalize("ibuprofeno"), normalize("  "), "x".into()),
            Err(InvalidPair::EmptyName)
        );
    }

    #[test]
    fn matches_pair_is_unordered() {
        let r = rule("paracetamol", "ibuprofeno");
        let p = normalize("Paracetamol");
        let i = normalize("Ibuprofeno");
        assert!(r.matches_pair(&p, &i));
        assert!(r.matches_pair(&i, &p));
        assert!(!r.matches_pair(&p, &p));
    }

    #[test]
    fn other_side_of_pair() {
        let r = rule("paracetamol", "ibuprofeno");
        assert_eq!(r.other(&normalize("ibuprofeno")), Some(&normalize("paracetamol")));
        assert_eq!(r.other(&normalize("varfarina")), None);
        assert!(r.involves(&normalize("PARACETAMOL")));
    }

    #[test]
    fn record_accepts_legacy_field_names() {
        let record: InteractionRecord =
            serde_json::from_str(r#"{"nomes": ["a", "b"], "descricao": "perigo"}"#).unwrap();
        assert_eq!(record.pair, vec!["a", "b"]);
        assert_eq!(record.risk, "perigo");
    }
}
