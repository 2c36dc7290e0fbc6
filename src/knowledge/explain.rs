use serde::{Deserialize, Serialize};

use super::normalize::normalize;
use super::reference::KnowledgeBase;

/// Outcome of an explanation lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExplainResult {
    Found {
        display_name: String,
        explanation: String,
    },
    /// No usable name in the input; the caller should ask again.
    NotIdentified,
    /// A name was given but the knowledge base has no entry for it.
    NotFound { input: String },
}

/// Resolve a raw mention to its stored explanation.
pub fn explain(raw: &str, kb: &KnowledgeBase) -> ExplainResult {
    let key = normalize(raw);
    if key.is_empty() {
        return ExplainResult::NotIdentified;
    }

    match kb.entry(&key) {
        Some(entry) => ExplainResult::Found {
            display_name: entry.display_name.clone(),
            explanation: entry.explanation.clone(),
        },
        None => {
            tracing::debug!(key = %key, "No explanation for medication");
            ExplainResult::NotFound {
                input: raw.trim().to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn found_uses_knowledge_display_name() {
        let kb = KnowledgeBase::load_test();
        assert_eq!(
            explain("  DIPIRÔNA", &kb),
            ExplainResult::Found {
                display_name: "Dipirona".into(),
                explanation: "Analgésico e antitérmico.".into(),
            }
        );
    }

    #[test]
    fn unknown_medication_is_not_found() {
        let kb = KnowledgeBase::load_test();
        assert_eq!(
            explain("AspirinaXYZ", &kb),
            ExplainResult::NotFound {
                input: "AspirinaXYZ".into()
            }
        );
    }

    #[test]
    fn blank_input_is_not_identified() {
        let kb = KnowledgeBase::load_test();
        assert_eq!(explain("", &kb), ExplainResult::NotIdentified);
        assert_eq!(explain("   ", &kb), ExplainResult::NotIdentified);
    }

    #[test]
    fn interaction_only_medication_has_no_explanation() {
        // Ibuprofeno appears in rules but not in the explanation table.
        let kb = KnowledgeBase::load_test();
        assert!(matches!(explain("Ibuprofeno", &kb), ExplainResult::NotFound { .. }));
    }
}
