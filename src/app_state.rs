use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::artifacts::ArtifactStore;
use crate::services::queue::JobQueue;
use crate::services::store::ResultStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub queue: Arc<JobQueue>,
    pub store: Arc<ResultStore>,
    pub artifacts: ArtifactStore,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        queue: Arc<JobQueue>,
        store: Arc<ResultStore>,
        artifacts: ArtifactStore,
    ) -> Self {
        Self {
            config: Arc::new(config),
            queue,
            store,
            artifacts,
        }
    }
}
