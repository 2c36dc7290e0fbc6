//! Medication knowledge: name normalization, reference tables, interaction
//! matching and explanation lookup.

pub mod explain;
pub mod interactions;
pub mod normalize;
pub mod reference;
pub mod types;

pub use explain::{explain, ExplainResult};
pub use interactions::{find_interactions, InteractionCheck, InteractionMatch};
pub use normalize::{normalize, CanonicalKey};
pub use reference::KnowledgeBase;
pub use types::{InteractionRecord, InteractionRule, InvalidPair, KnowledgeEntry, KnowledgeError};
