use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use super::normalize::{normalize, CanonicalKey};
use super::types::{InteractionRecord, InteractionRule, KnowledgeEntry, KnowledgeError};

// ---------------------------------------------------------------------------
// On-disk table shapes
// ---------------------------------------------------------------------------

/// Medication name → explanation pairs in source order.
///
/// Read through a map visitor rather than a `HashMap` so that the order the
/// author wrote entries in survives, which the first-wins policy depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplanationTable(pub Vec<(String, String)>);

impl<'de> Deserialize<'de> for ExplanationTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = ExplanationTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of medication name to explanation")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, text)) = map.next_entry::<String, String>()? {
                    entries.push((name, text));
                }
                Ok(ExplanationTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

#[derive(Debug, Deserialize)]
struct ExplanationFile {
    #[serde(alias = "explicacoes")]
    explanations: ExplanationTable,
}

#[derive(Debug, Deserialize)]
struct InteractionFile {
    #[serde(alias = "interacoes")]
    interactions: Vec<InteractionRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableFormat {
    Yaml,
    Json,
}

fn table_format(path: &Path) -> Result<TableFormat, KnowledgeError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("yml") | Some("yaml") => Ok(TableFormat::Yaml),
        Some("json") => Ok(TableFormat::Json),
        _ => Err(KnowledgeError::UnsupportedFormat(path.display().to_string())),
    }
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<T, KnowledgeError> {
    let format = table_format(path)?;
    let raw = std::fs::read_to_string(path)
        .map_err(|e| KnowledgeError::Load(path.display().to_string(), e.to_string()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    match format {
        TableFormat::Yaml => {
            serde_yaml::from_str(&raw).map_err(|e| KnowledgeError::Parse(file_name, e.to_string()))
        }
        TableFormat::Json => {
            serde_json::from_str(&raw).map_err(|e| KnowledgeError::Parse(file_name, e.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// KnowledgeBase
// ---------------------------------------------------------------------------

/// Immutable medication reference data: explanations and interaction rules.
///
/// Built once, then shared read-only (behind an `Arc`) by every conversation.
/// Duplicate explanation names resolve first-wins: the first entry whose name
/// normalizes to a key is kept, later ones are counted and logged.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeEntry>,
    index: HashMap<CanonicalKey, usize>,
    rules: Vec<InteractionRule>,
    duplicates_ignored: usize,
}

impl KnowledgeBase {
    /// Load both tables from disk. Fails if either is unreadable or malformed.
    pub fn load(explanations_path: &Path, interactions_path: &Path) -> Result<Self, KnowledgeError> {
        let explanations: ExplanationFile = read_table(explanations_path)?;
        let interactions: InteractionFile = read_table(interactions_path)?;

        let kb = Self::from_tables(explanations.explanations.0, interactions.interactions)?;

        tracing::info!(
            explanations = kb.len(),
            rules = kb.rule_count(),
            duplicates_ignored = kb.duplicates_ignored,
            "Knowledge base loaded"
        );

        Ok(kb)
    }

    /// Build from in-memory records with the same validation as [`Self::load`].
    pub fn from_tables(
        explanations: Vec<(String, String)>,
        interactions: Vec<InteractionRecord>,
    ) -> Result<Self, KnowledgeError> {
        let mut entries = Vec::with_capacity(explanations.len());
        let mut index = HashMap::with_capacity(explanations.len());
        let mut duplicates_ignored = 0;

        for (i, (name, explanation)) in explanations.into_iter().enumerate() {
            let key = normalize(&name);
            if key.is_empty() {
                return Err(KnowledgeError::EmptyName { index: i });
            }
            if let Some(&existing) = index.get(&key) {
                let kept: &KnowledgeEntry = &entries[existing];
                tracing::warn!(
                    key = %key,
                    kept = %kept.display_name,
                    ignored = %name.trim(),
                    "Duplicate explanation entry ignored"
                );
                duplicates_ignored += 1;
                continue;
            }
            index.insert(key.clone(), entries.len());
            entries.push(KnowledgeEntry {
                key,
                display_name: name.trim().to_string(),
                explanation,
            });
        }

        let rules = interactions
            .into_iter()
            .enumerate()
            .map(|(i, record)| validate_rule(i, record))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            entries,
            index,
            rules,
            duplicates_ignored,
        })
    }

    /// Explanation text for a medication key.
    pub fn explanation(&self, key: &CanonicalKey) -> Option<&str> {
        self.entry(key).map(|e| e.explanation.as_str())
    }

    pub fn entry(&self, key: &CanonicalKey) -> Option<&KnowledgeEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, key: &CanonicalKey) -> bool {
        self.index.contains_key(key)
    }

    /// All explanation entries in load order.
    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    /// Interaction rules in load order.
    pub fn interaction_rules(&self) -> &[InteractionRule] {
        &self.rules
    }

    /// Rules that name the given medication on either side.
    pub fn interactions_involving(&self, key: &CanonicalKey) -> Vec<&InteractionRule> {
        self.rules.iter().filter(|r| r.involves(key)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Explanation entries dropped at load because their key was already taken.
    pub fn duplicates_ignored(&self) -> usize {
        self.duplicates_ignored
    }

    /// Reference data for tests (no file I/O).
    #[cfg(test)]
    pub(crate) fn load_test() -> Self {
        let explanations = vec![
            ("paracetamol".to_string(), "Analgésico".to_string()),
            (
                "Dipirona".to_string(),
                "Analgésico e antitérmico.".to_string(),
            ),
            (
                "Varfarina".to_string(),
                "Anticoagulante oral.".to_string(),
            ),
        ];
        let interactions = vec![
            InteractionRecord {
                pair: vec!["paracetamol".into(), "ibuprofeno".into()],
                risk: "Risco gástrico aumentado".into(),
            },
            InteractionRecord {
                pair: vec!["Varfarina".into(), "Ibuprofeno".into()],
                risk: "Risco de sangramento".into(),
            },
            InteractionRecord {
                pair: vec!["ibuprofeno".into(), "varfarina".into()],
                risk: "Pode reduzir a função renal".into(),
            },
        ];
        match Self::from_tables(explanations, interactions) {
            Ok(kb) => kb,
            Err(e) => panic!("test knowledge base is invalid: {e}"),
        }
    }
}

fn validate_rule(index: usize, record: InteractionRecord) -> Result<InteractionRule, KnowledgeError> {
    let [first, second] = <[String; 2]>::try_from(record.pair).map_err(|pair| {
        KnowledgeError::InvalidRule {
            index,
            reason: format!("expected 2 medication names, found {}", pair.len()),
        }
    })?;

    InteractionRule::new(normalize(&first), normalize(&second), record.risk).map_err(|e| {
        KnowledgeError::InvalidRule {
            index,
            reason: e.to_string(),
        }
    })
}
