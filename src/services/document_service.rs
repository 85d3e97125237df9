use std::sync::Arc;

use uuid::Uuid;

use crate::database::models::DocumentWithChunkCount;
use crate::database::{Repository, VectorStore};
use crate::utils::ApiError;

/// Entity service for Documents. Ingestion (chunk + embed +
/// persist) lives in `IngestionService`; this is CRUD over already-ingested
/// documents.
pub struct DocumentService {
    repo: Arc<Repository>,
    vector_store: Arc<VectorStore>,
}

impl DocumentService {
    pub fn new(repo: Arc<Repository>, vector_store: Arc<VectorStore>) -> Self {
        Self { repo, vector_store }
    }

    pub async fn get(&self, id: Uuid) -> Result<DocumentWithChunkCount, ApiError> {
        self.repo
            .get_document(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("document {id} not found")))
    }

    pub async fn list(
        &self,
        vault_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<DocumentWithChunkCount>, i64), ApiError> {
        Ok(self.repo.list_documents(vault_id, limit, offset).await?)
    }

    /// Removes a Document and its Chunks/Embeddings. The Vector Store
    /// embeddings go first so no partially-cleaned document is ever
    /// searchable.
    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        self.repo
            .get_document(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("document {id} not found")))?;

        self.vector_store.delete_by_document(id).await?;
        self.repo.delete_document_row(id).await?;
        Ok(())
    }
}
