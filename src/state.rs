use std::sync::Arc;

use crate::config::Settings;
use crate::services::{AgentService, DocumentService, IngestionService, RetrievalService, VaultService};

/// Shared application state, injected into handlers via `Extension<AppState>`.
/// All services are process-wide singletons set up once in `main.rs` and
/// torn down on shutdown.
#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub vault_service: Arc<VaultService>,
    pub document_service: Arc<DocumentService>,
    pub agent_service: Arc<AgentService>,
    pub ingestion_service: Arc<IngestionService>,
    pub retrieval_service: Arc<RetrievalService>,
}
