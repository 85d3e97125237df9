use pgvector::Vector;
use uuid::Uuid;

use super::models::{make_snippet, EmbeddedChunk, SearchHit};
use super::repository::RepoError;
use super::DbPool;

/// Scopes a `VectorStore::search` call to a vault. A document with no
/// vault (`None` here) belongs to no vault: it is never returned by a
/// vault-scoped search, and is the only thing returned when the filter
/// itself asks for "no vault".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultFilter {
    Vault(Uuid),
    None,
}

pub struct VectorStore {
    pool: DbPool,
}

impl VectorStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Writes one `embeddings` row per chunk, denormalizing `document_id`,
    /// `vault_id`, `ordinal`, `title` and `source` so `search` never has to
    /// join back to `documents`/`chunks`. This is the Vector
    /// Store half of the ingestion pipeline's two coordinated writes; on
    /// failure the caller compensates by deleting the Document row.
    pub async fn upsert_chunks(
        &self,
        document_id: Uuid,
        vault_id: Option<Uuid>,
        title: Option<&str>,
        source: Option<&str>,
        chunk_ids: &[Uuid],
        embedded: &[EmbeddedChunk],
    ) -> Result<(), RepoError> {
        if chunk_ids.len() != embedded.len() {
            return Err(RepoError::Other(anyhow::anyhow!(
                "chunk_ids and embedded chunks must have the same length"
            )));
        }

        let mut tx = self.pool.get_pool().begin().await?;

        for (chunk_id, chunk) in chunk_ids.iter().zip(embedded.iter()) {
            sqlx::query(
                r#"INSERT INTO embeddings (chunk_id, document_id, vault_id, ordinal, title, source, vector)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)
                   ON CONFLICT (chunk_id) DO UPDATE SET vector = EXCLUDED.vector"#,
            )
            .bind(chunk_id)
            .bind(document_id)
            .bind(vault_id)
            .bind(chunk.ordinal)
            .bind(title)
            .bind(source)
            .bind(Vector::from(chunk.vector.clone()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Cosine-similarity search using pgvector's `<=>` distance operator
    /// (`score = 1 - distance`). Ties break on ordinal ascending, then
    /// document id ascending.
    pub async fn search(
        &self,
        query_vector: &[f32],
        top_k: i64,
        filter: VaultFilter,
    ) -> Result<Vec<SearchHit>, RepoError> {
        let vector = Vector::from(query_vector.to_vec());

        let rows = match filter {
            VaultFilter::Vault(vault_id) => {
                sqlx::query_as::<_, (Uuid, Uuid, Option<String>, String, f32)>(
                    r#"SELECT chunk_id, document_id, title, text, (1.0 - (vector <=> $1))::real AS score
                       FROM embeddings
                       JOIN chunks ON chunks.id = embeddings.chunk_id
                       WHERE vault_id = $2
                       ORDER BY vector <=> $1 ASC, ordinal ASC, document_id::text ASC
                       LIMIT $3"#,
                )
                .bind(&vector)
                .bind(vault_id)
                .bind(top_k)
                .fetch_all(self.pool.get_pool())
                .await?
            }
            VaultFilter::None => {
                sqlx::query_as::<_, (Uuid, Uuid, Option<String>, String, f32)>(
                    r#"SELECT chunk_id, document_id, title, text, (1.0 - (vector <=> $1))::real AS score
                       FROM embeddings
                       JOIN chunks ON chunks.id = embeddings.chunk_id
                       WHERE vault_id IS NULL
                       ORDER BY vector <=> $1 ASC, ordinal ASC, document_id::text ASC
                       LIMIT $2"#,
                )
                .bind(&vector)
                .bind(top_k)
                .fetch_all(self.pool.get_pool())
                .await?
            }
        };

        Ok(rows
            .into_iter()
            .map(|(chunk_id, document_id, title, text, score)| SearchHit {
                chunk_id,
                document_id,
                title,
                snippet: make_snippet(&text),
                score,
            })
            .collect())
    }

    pub async fn delete_by_document(&self, document_id: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM embeddings WHERE document_id = $1")
            .bind(document_id)
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    pub async fn delete_by_vault(&self, vault_id: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM embeddings WHERE vault_id = $1")
            .bind(vault_id)
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }
}
