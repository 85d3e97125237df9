use std::sync::Arc;

use uuid::Uuid;

use crate::chunker::Chunker;
use crate::database::models::EmbeddedChunk;
use crate::database::{Repository, VectorStore};
use crate::providers::Embedder;
use crate::utils::ApiError;

/// Orchestrates the write path: validate -> chunk -> embed -> persist
/// (document + chunks, then the Vector Store upsert), compensating by
/// deleting the Document row if the Vector Store write fails.
pub struct IngestionService {
    repo: Arc<Repository>,
    vector_store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
}

impl IngestionService {
    pub fn new(
        repo: Arc<Repository>,
        vector_store: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
        chunker: Chunker,
    ) -> Self {
        Self {
            repo,
            vector_store,
            embedder,
            chunker,
        }
    }

    pub async fn ingest(
        &self,
        text: &str,
        title: Option<&str>,
        source: Option<&str>,
        vault_id: Option<Uuid>,
        metadata: serde_json::Value,
    ) -> Result<Uuid, ApiError> {
        if text.trim().is_empty() {
            return Err(ApiError::ValidationError("document text must not be empty".to_string()));
        }

        if let Some(vault_id) = vault_id {
            if !self.repo.vault_exists(vault_id).await? {
                return Err(ApiError::NotFound(format!("vault {vault_id} not found")));
            }
        }

        let document_id = Uuid::new_v4();
        let drafts = self
            .chunker
            .chunk(text)
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        if drafts.is_empty() {
            return Err(ApiError::ValidationError("document text must not be empty".to_string()));
        }

        let texts: Vec<String> = drafts.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        if vectors.len() != drafts.len() {
            return Err(ApiError::Internal(
                "embedder returned a different number of vectors than chunks".to_string(),
            ));
        }

        let persisted_chunks = self
            .repo
            .create_document_with_chunks(document_id, vault_id, title, source, &metadata, &drafts)
            .await?;

        let chunk_ids: Vec<Uuid> = persisted_chunks.iter().map(|c| c.id).collect();
        let embedded: Vec<EmbeddedChunk> = drafts
            .iter()
            .zip(vectors.into_iter())
            .map(|(draft, vector)| EmbeddedChunk {
                ordinal: draft.ordinal,
                vector,
            })
            .collect();

        if let Err(err) = self
            .vector_store
            .upsert_chunks(document_id, vault_id, title, source, &chunk_ids, &embedded)
            .await
        {
            // Vector Store half of the coordinated write failed after the
            // Metadata Store half succeeded; compensate so no orphaned
            // Document is left half-indexed.
            let _ = self.repo.delete_document_row(document_id).await;
            return Err(err.into());
        }

        Ok(document_id)
    }
}
