pub mod config;
pub mod conversation_cache;
pub mod core_state; // Boundary for the dialogue layer
pub mod knowledge; // Normalization, reference tables, interaction matching
pub mod medications; // Per-conversation medication list

pub use conversation_cache::ConversationSummary;
pub use core_state::{CoreError, CoreState};
pub use knowledge::{ExplainResult, InteractionCheck, InteractionMatch, KnowledgeBase};
pub use medications::{InsertPolicy, InsertResult, ListResult, ResetOutcome};

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG` or the default filter.
///
/// Does nothing if the host already installed a global subscriber.
pub fn init_tracing() {
    let result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    if result.is_ok() {
        tracing::info!("{} core v{}", config::APP_NAME, config::APP_VERSION);
    }
}
