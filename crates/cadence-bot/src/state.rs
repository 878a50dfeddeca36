use std::path::Path;
use std::sync::Arc;

use cadence_core::dedup::DedupGate;
use cadence_core::store::Store;

use crate::config::Config;
use crate::feedback::FeedbackClient;
use crate::messenger::Messenger;
use crate::sheet::SheetClient;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub dedup: Arc<DedupGate>,
    pub sheet: Arc<SheetClient>,
    pub feedback: Arc<FeedbackClient>,
    pub messenger: Arc<Messenger>,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let store = Store::open(Path::new(&config.database_path))?;
        Ok(Self::with_store(store, config))
    }

    /// Build state around an existing store (tests use an in-memory one).
    pub fn with_store(store: Store, config: &Config) -> Self {
        Self {
            store: Arc::new(store),
            dedup: Arc::new(DedupGate::new(config.dedup_capacity)),
            sheet: Arc::new(SheetClient::new(config.chat.clone())),
            feedback: Arc::new(FeedbackClient::new(config.llm.clone())),
            messenger: Arc::new(Messenger::new(config.chat.clone())),
        }
    }
}
