pub mod agent_service;
pub mod document_service;
pub mod ingestion_service;
pub mod retrieval_service;
pub mod session_lock;
pub mod vault_service;

pub use agent_service::AgentService;
pub use document_service::DocumentService;
pub use ingestion_service::IngestionService;
pub use retrieval_service::{ChatOutcome, RetrievalService, SourceRef};
pub use session_lock::SessionLocks;
pub use vault_service::VaultService;
