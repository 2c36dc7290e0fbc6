//! Per-conversation medication list.
//!
//! An ordered, deduplicated collection keyed by [`CanonicalKey`]. Entries keep
//! the wording the user first typed so later output reads back in their own
//! words. The list only grows through [`MedicationList::insert`] and only
//! shrinks through [`MedicationList::reset`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::knowledge::{normalize, CanonicalKey, KnowledgeBase};

// ═══════════════════════════════════════════
// Insert policy
// ═══════════════════════════════════════════

/// Whether a medication must be known to the knowledge base before it can be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPolicy {
    /// Any non-empty name is accepted; unknown names simply have no explanation.
    #[default]
    Permissive,
    /// Names without a knowledge base entry are rejected.
    Strict,
}

impl InsertPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permissive => "permissive",
            Self::Strict => "strict",
        }
    }
}

impl FromStr for InsertPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown insert policy '{other}'")),
        }
    }
}

// ═══════════════════════════════════════════
// Result types
// ═══════════════════════════════════════════

/// Why an insertion was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Strict policy and the knowledge base has no entry for this name.
    UnknownMedication,
}

/// Outcome of [`MedicationList::insert`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InsertResult {
    Added { display: String },
    /// Already listed; `display` is the wording stored on first insertion.
    AlreadyPresent { display: String },
    Rejected { input: String, reason: RejectReason },
    /// Input carried no medication name.
    Empty,
}

/// Outcome of listing medications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ListResult {
    Empty,
    Medications { names: Vec<String> },
}

/// Outcome of clearing a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetOutcome {
    pub cleared: usize,
}

// ═══════════════════════════════════════════
// MedicationList
// ═══════════════════════════════════════════

/// One listed medication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationListEntry {
    pub key: CanonicalKey,
    /// Trimmed wording from the first time the user entered it.
    pub display: String,
}

/// Ordered medication list with set semantics on the canonical key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MedicationList {
    entries: Vec<MedicationListEntry>,
}

impl MedicationList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a medication unless it is already listed.
    ///
    /// Never reorders: a repeated name leaves the list untouched and reports
    /// the stored wording.
    pub fn insert(&mut self, raw: &str, policy: InsertPolicy, kb: &KnowledgeBase) -> InsertResult {
        let key = normalize(raw);
        if key.is_empty() {
            return InsertResult::Empty;
        }

        if let Some(existing) = self.entries.iter().find(|e| e.key == key) {
            return InsertResult::AlreadyPresent {
                display: existing.display.clone(),
            };
        }

        let display = raw.trim().to_string();

        if policy == InsertPolicy::Strict && !kb.contains(&key) {
            tracing::debug!(key = %key, "Rejected unknown medication under strict policy");
            return InsertResult::Rejected {
                input: display,
                reason: RejectReason::UnknownMedication,
            };
        }

        self.entries.push(MedicationListEntry {
            key,
            display: display.clone(),
        });
        InsertResult::Added { display }
    }

    /// Display wording of every listed medication, in insertion order.
    pub fn list(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.display.as_str()).collect()
    }

    /// Listing with an explicit reason when there is nothing to show.
    pub fn list_result(&self) -> ListResult {
        if self.entries.is_empty() {
            ListResult::Empty
        } else {
            ListResult::Medications {
                names: self.entries.iter().map(|e| e.display.clone()).collect(),
            }
        }
    }

    pub fn entries(&self) -> &[MedicationListEntry] {
        &self.entries
    }

    /// Remove every entry. Irreversible.
    pub fn reset(&mut self) -> ResetOutcome {
        let cleared = self.entries.len();
        self.entries.clear();
        ResetOutcome { cleared }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn insert_adds_with_user_wording() {
        let kb = KnowledgeBase::load_test();
        let mut list = MedicationList::new();
        assert_eq!(
            list.insert("  Paracetamol ", InsertPolicy::Permissive, &kb),
            InsertResult::Added {
                display: "Paracetamol".into()
            }
        );
        assert_eq!(list.list(), vec!["Paracetamol"]);
    }

    #[test]
    fn renormalized_duplicate_is_already_present() {
        let kb = KnowledgeBase::load_test();
        let mut list = MedicationList::new();
        list.insert("Paracetamol", InsertPolicy::Permissive, &kb);
        assert_eq!(
            list.insert("PARACETAMOL ", InsertPolicy::Permissive, &kb),
            InsertResult::AlreadyPresent {
                display: "Paracetamol".into()
            }
        );
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn order_is_insertion_order() {
        let kb = KnowledgeBase::load_test();
        let mut list = MedicationList::new();
        list.insert("Dipirona", InsertPolicy::Permissive, &kb);
        list.insert("Varfarina", InsertPolicy::Permissive, &kb);
        list.insert("dipirôna", InsertPolicy::Permissive, &kb);
        assert_eq!(list.list(), vec!["Dipirona", "Varfarina"]);
    }

    #[test]
    fn blank_input_is_empty_and_not_stored() {
        let kb = KnowledgeBase::load_test();
        let mut list = MedicationList::new();
        assert_eq!(list.insert("  ", InsertPolicy::Permissive, &kb), InsertResult::Empty);
        assert_eq!(list.insert("", InsertPolicy::Strict, &kb), InsertResult::Empty);
        assert!(list.is_empty());
    }

    #[test]
    fn permissive_accepts_unknown_medication() {
        let kb = KnowledgeBase::load_test();
        let mut list = MedicationList::new();
        assert_eq!(
            list.insert("Ibuprofeno", InsertPolicy::Permissive, &kb),
            InsertResult::Added {
                display: "Ibuprofeno".into()
            }
        );
    }

    #[test]
    fn strict_rejects_unknown_medication() {
        let kb = KnowledgeBase::load_test();
        let mut list = MedicationList::new();
        assert_eq!(
            list.insert("Ibuprofeno", InsertPolicy::Strict, &kb),
            InsertResult::Rejected {
                input: "Ibuprofeno".into(),
                reason: RejectReason::UnknownMedication,
            }
        );
        assert!(list.is_empty());
        assert!(matches!(
            list.insert("paracetamol", InsertPolicy::Strict, &kb),
            InsertResult::Added { .. }
        ));
    }

    #[test]
    fn keys_stay_unique_across_spellings() {
        let kb = KnowledgeBase::load_test();
        let mut list = MedicationList::new();
        for raw in ["Dipirona", "DIPIRONA", " dipirôna", "Paracetamol", "paracetamol", "Dipirona"] {
            list.insert(raw, InsertPolicy::Permissive, &kb);
        }
        let keys: HashSet<&CanonicalKey> = list.entries().iter().map(|e| &e.key).collect();
        assert_eq!(keys.len(), list.len());
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn reset_clears_and_list_is_empty_result() {
        let kb = KnowledgeBase::load_test();
        let mut list = MedicationList::new();
        list.insert("Paracetamol", InsertPolicy::Permissive, &kb);
        list.insert("Ibuprofeno", InsertPolicy::Permissive, &kb);

        assert_eq!(list.reset(), ResetOutcome { cleared: 2 });
        assert!(list.list().is_empty());
        assert_eq!(list.list_result(), ListResult::Empty);
    }

    #[test]
    fn list_result_carries_names() {
        let kb = KnowledgeBase::load_test();
        let mut list = MedicationList::new();
        list.insert("Varfarina", InsertPolicy::Permissive, &kb);
        assert_eq!(
            list.list_result(),
            ListResult::Medications {
                names: vec!["Varfarina".into()]
            }
        );
    }

    #[test]
    fn insert_policy_parses() {
        assert_eq!("strict".parse::<InsertPolicy>(), Ok(InsertPolicy::Strict));
        assert_eq!(" Permissive ".parse::<InsertPolicy>(), Ok(InsertPolicy::Permissive));
        assert!("lenient".parse::<InsertPolicy>().is_err());
        assert_eq!(InsertPolicy::default(), InsertPolicy::Permissive);
    }
}
