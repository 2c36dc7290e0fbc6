use serde::{Deserialize, Serialize};

use crate::medications::MedicationList;

use super::types::InteractionRule;

/// A triggered interaction between two medications on the user's list.
///
/// Names are the user's own wording from insertion time, not the
/// knowledge base's display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionMatch {
    pub first: String,
    pub second: String,
    pub risk: String,
}

/// Outcome of an interaction check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InteractionCheck {
    /// Fewer than two medications on the list; nothing was checked.
    InsufficientMedications { count: usize },
    /// Every pair was checked and none matched a rule.
    NoInteractions,
    /// One entry per (pair, matching rule).
    Found { matches: Vec<InteractionMatch> },
}

impl InteractionCheck {
    /// Matches found, empty for the two "nothing to show" outcomes.
    pub fn matches(&self) -> &[InteractionMatch] {
        match self {
            Self::Found { matches } => matches,
            _ => &[],
        }
    }
}

/// Scan every unordered pair of the list against the rule set.
///
/// Pairs are generated as (i, j) with i < j in list order; for each pair every
/// matching rule contributes one result, in rule order. Results are not
/// deduplicated.
pub fn find_interactions(list: &MedicationList, rules: &[InteractionRule]) -> InteractionCheck {
    let entries = list.entries();
    if entries.len() < 2 {
        return InteractionCheck::InsufficientMedications {
            count: entries.len(),
        };
    }

    let mut matches = Vec::new();
    for (i, a) in entries.iter().enumerate() {
        for b in &entries[i + 1..] {
            for rule in rules.iter().filter(|r| r.matches_pair(&a.key, &b.key)) {
                matches.push(InteractionMatch {
                    first: a.display.clone(),
                    second: b.display.clone(),
                    risk: rule.risk().to_string(),
                });
            }
        }
    }

    tracing::debug!(
        medications = entries.len(),
        pairs = entries.len() * (entries.len() - 1) / 2,
        matched = matches.len(),
        "Interaction scan complete"
    );

    if matches.is_empty() {
        InteractionCheck::NoInteractions
    } else {
        InteractionCheck::Found { matches }
    }
}
