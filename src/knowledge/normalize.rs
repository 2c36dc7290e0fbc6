//! Canonical name keys for medication mentions.
//!
//! Every component that compares medication names goes through
//! [`normalize`]. Two mentions denote the same medication iff their keys are
//! equal: case, accents and surrounding whitespace are ignored, nothing else
//! is. No fuzzy or substring matching happens here.

use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Normalized identity of a medication name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the mention carried no usable name.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a raw mention into its comparison key.
///
/// Lowercases, splits accented letters into base letter plus combining marks
/// (NFD), drops the marks and trims surrounding whitespace. Letters with no
/// canonical decomposition (ß, æ, œ, ł, ...) go through a small fold table.
/// Total: blank input yields an empty key, which callers treat as "no
/// medication given".
pub fn normalize(raw: &str) -> CanonicalKey {
    let lower = raw.to_lowercase();
    let mut folded = String::with_capacity(lower.len());
    // Lowercase again after NFD: some decompositions yield uppercase bases.
    for ch in lower.nfd().flat_map(char::to_lowercase) {
        if is_combining_mark(ch) {
            continue;
        }
        match fold_char(ch) {
            Some(replacement) => folded.push_str(replacement),
            None => folded.push(ch),
        }
    }
    // Trim last: a stripped combining mark can expose trailing whitespace.
    CanonicalKey(folded.trim().to_string())
}

/// Combining diacritical marks left over after decomposition.
fn is_combining_mark(ch: char) -> bool {
    matches!(ch, '\u{0300}'..='\u{036F}' | '\u{1AB0}'..='\u{1AFF}' | '\u{1DC0}'..='\u{1DFF}' | '\u{20D0}'..='\u{20FF}')
}

/// Letters that carry a diacritic but have no canonical decomposition.
fn fold_char(ch: char) -> Option<&'static str> {
    let folded = match ch {
        'đ' => "d",
        'ħ' => "h",
        'ı' => "i",
        'ŀ' | 'ł' => "l",
        'ø' => "o",
        'ŧ' => "t",
        'ß' => "ss",
        'æ' => "ae",
        'œ' => "oe",
        _ => return None,
    };
    Some(folded)
}
