use chrono::Utc;
use sqlx::Row;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use super::models::{
    Agent, Chunk, ChunkDraft, Document, DocumentWithChunkCount, Message, MessageRow, Session,
    Vault, VaultWithCount,
};
use super::DbPool;

/// Errors raised by the Metadata Store, distinguished at the type level so
/// services can map them onto HTTP-facing error kinds without re-inspecting
/// a Postgres error code at every call site.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // Postgres unique_violation
            if db_err.code().as_deref() == Some("23505") {
                return RepoError::Conflict(db_err.message().to_string());
            }
        }
        RepoError::Other(err.into())
    }
}

pub struct Repository {
    pool: DbPool,
}

impl Repository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    // ===== Vaults =====

    pub async fn create_vault(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Vault, RepoError> {
        let vault = sqlx::query_as::<_, Vault>(
            r#"INSERT INTO vaults (name, description)
               VALUES ($1, $2)
               RETURNING id, name, description, created_at"#,
        )
        .bind(name)
        .bind(description)
        .fetch_one(self.pool.get_pool())
        .await?;

        debug!(vault_id = %vault.id, name, "created vault");
        Ok(vault)
    }

    pub async fn list_vaults(&self) -> Result<Vec<VaultWithCount>, RepoError> {
        let rows = sqlx::query_as::<_, (Uuid, String, Option<String>, chrono::DateTime<Utc>, i64)>(
            r#"SELECT v.id, v.name, v.description, v.created_at,
                      COUNT(d.id) AS document_count
               FROM vaults v
               LEFT JOIN documents d ON d.vault_id = v.id
               GROUP BY v.id
               ORDER BY v.created_at ASC"#,
        )
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, description, created_at, document_count)| VaultWithCount {
                vault: Vault {
                    id,
                    name,
                    description,
                    created_at,
                },
                document_count,
            })
            .collect())
    }

    pub async fn get_vault_with_count(&self, id: Uuid) -> Result<Option<VaultWithCount>, RepoError> {
        let row = sqlx::query_as::<_, (Uuid, String, Option<String>, chrono::DateTime<Utc>, i64)>(
            r#"SELECT v.id, v.name, v.description, v.created_at,
                      COUNT(d.id) AS document_count
               FROM vaults v
               LEFT JOIN documents d ON d.vault_id = v.id
               WHERE v.id = $1
               GROUP BY v.id"#,
        )
        .bind(id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(row.map(|(id, name, description, created_at, document_count)| VaultWithCount {
            vault: Vault {
                id,
                name,
                description,
                created_at,
            },
            document_count,
        }))
    }

    pub async fn get_vault(&self, id: Uuid) -> Result<Option<Vault>, RepoError> {
        let vault = sqlx::query_as::<_, Vault>(
            "SELECT id, name, description, created_at FROM vaults WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(vault)
    }

    pub async fn vault_exists(&self, id: Uuid) -> Result<bool, RepoError> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM vaults WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool.get_pool())
            .await?;
        Ok(exists)
    }

    /// Deletes all Document rows owned by `vault_id` (chunks cascade via FK).
    /// Idempotent: safe to call again after a crash mid-delete.
    pub async fn delete_documents_by_vault(&self, vault_id: Uuid) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM documents WHERE vault_id = $1")
            .bind(vault_id)
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    /// Deletes the vault row. Agents cascade via FK; callers must remove the
    /// vault's Documents (and, before that, its Embeddings from the Vector
    /// Store) first, so no document is ever left half-deleted.
    pub async fn delete_vault_row(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM vaults WHERE id = $1")
            .bind(id)
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ===== Documents =====

    /// Inserts the Document row and all of its Chunk rows as a single
    /// transaction — the Metadata Store half of the two coordinated writes
    /// in the ingestion pipeline.
    pub async fn create_document_with_chunks(
        &self,
        document_id: Uuid,
        vault_id: Option<Uuid>,
        title: Option<&str>,
        source: Option<&str>,
        metadata: &serde_json::Value,
        chunks: &[ChunkDraft],
    ) -> Result<Vec<Chunk>, RepoError> {
        let mut tx = self.pool.get_pool().begin().await?;

        sqlx::query(
            r#"INSERT INTO documents (id, vault_id, title, source, metadata)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(document_id)
        .bind(vault_id)
        .bind(title)
        .bind(source)
        .bind(metadata)
        .execute(&mut *tx)
        .await?;

        let mut persisted = Vec::with_capacity(chunks.len());
        for draft in chunks {
            let chunk = sqlx::query_as::<_, Chunk>(
                r#"INSERT INTO chunks (document_id, ordinal, text, token_count)
                   VALUES ($1, $2, $3, $4)
                   RETURNING id, document_id, ordinal, text, token_count"#,
            )
            .bind(document_id)
            .bind(draft.ordinal)
            .bind(&draft.text)
            .bind(draft.token_count)
            .fetch_one(&mut *tx)
            .await?;
            persisted.push(chunk);
        }

        tx.commit().await?;
        debug!(document_id = %document_id, chunk_count = persisted.len(), "persisted document + chunks");
        Ok(persisted)
    }

    pub async fn get_document(&self, id: Uuid) -> Result<Option<DocumentWithChunkCount>, RepoError> {
        let row = sqlx::query(
            r#"SELECT d.id, d.vault_id, d.title, d.source, d.metadata, d.created_at,
                      COUNT(c.id) AS chunk_count
               FROM documents d
               LEFT JOIN chunks c ON c.document_id = d.id
               WHERE d.id = $1
               GROUP BY d.id"#,
        )
        .bind(id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(DocumentWithChunkCount {
            document: Document {
                id: row.try_get("id")?,
                vault_id: row.try_get("vault_id")?,
                title: row.try_get("title")?,
                source: row.try_get("source")?,
                metadata: row.try_get("metadata")?,
                created_at: row.try_get("created_at")?,
            },
            chunk_count: row.try_get("chunk_count")?,
        }))
    }

    pub async fn list_documents(
        &self,
        vault_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<DocumentWithChunkCount>, i64), RepoError> {
        let rows = sqlx::query(
            r#"SELECT d.id, d.vault_id, d.title, d.source, d.metadata, d.created_at,
                      COUNT(c.id) AS chunk_count
               FROM documents d
               LEFT JOIN chunks c ON c.document_id = d.id
               WHERE ($1::uuid IS NULL OR d.vault_id = $1)
               GROUP BY d.id
               ORDER BY d.created_at DESC
               LIMIT $2 OFFSET $3"#,
        )
        .bind(vault_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.get_pool())
        .await?;

        let documents = rows
            .into_iter()
            .map(|row| -> Result<DocumentWithChunkCount, RepoError> {
                Ok(DocumentWithChunkCount {
                    document: Document {
                        id: row.try_get("id")?,
                        vault_id: row.try_get("vault_id")?,
                        title: row.try_get("title")?,
                        source: row.try_get("source")?,
                        metadata: row.try_get("metadata")?,
                        created_at: row.try_get("created_at")?,
                    },
                    chunk_count: row.try_get("chunk_count")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM documents WHERE ($1::uuid IS NULL OR vault_id = $1)",
        )
        .bind(vault_id)
        .fetch_one(self.pool.get_pool())
        .await?;

        Ok((documents, total))
    }

    /// Deletes the document row (and its chunks, via FK cascade). Callers
    /// must remove the document's `Embedding`s from the Vector Store first.
    pub async fn delete_document_row(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ===== Sessions =====

    pub async fn get_or_create_session(
        &self,
        id: &str,
        user_id: Option<&str>,
    ) -> Result<Session, RepoError> {
        if let Some(session) = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, created_at, last_active_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.get_pool())
        .await?
        {
            return Ok(session);
        }

        // Two concurrent first-turns for the same new session id would both
        // reach here; ON CONFLICT DO NOTHING + a re-fetch makes the race safe.
        sqlx::query(
            r#"INSERT INTO sessions (id, user_id) VALUES ($1, $2)
               ON CONFLICT (id) DO NOTHING"#,
        )
        .bind(id)
        .bind(user_id)
        .execute(self.pool.get_pool())
        .await?;

        let session = sqlx::query_as::<_, Session>(
            "SELECT id, user_id, created_at, last_active_at FROM sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_one(self.pool.get_pool())
        .await?;

        debug!(session_id = id, "session ready");
        Ok(session)
    }

    pub async fn update_last_active(&self, id: &str) -> Result<(), RepoError> {
        sqlx::query("UPDATE sessions SET last_active_at = now() WHERE id = $1 AND last_active_at <= now()")
            .bind(id)
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    // ===== Messages =====

    pub async fn append_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
    ) -> Result<Message, RepoError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"INSERT INTO messages (session_id, role, content)
               VALUES ($1, $2, $3)
               RETURNING id, session_id, role, content, created_at"#,
        )
        .bind(session_id)
        .bind(role)
        .bind(content)
        .fetch_one(self.pool.get_pool())
        .await?;

        row.try_into().map_err(RepoError::Other)
    }

    /// Returns the last `limit` messages for a session in ascending
    /// chronological order.
    pub async fn list_recent_messages(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<Message>, RepoError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"SELECT id, session_id, role, content, created_at FROM (
                   SELECT id, session_id, role, content, created_at
                   FROM messages
                   WHERE session_id = $1
                   ORDER BY created_at DESC
                   LIMIT $2
               ) recent
               ORDER BY created_at ASC"#,
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(self.pool.get_pool())
        .await?;

        rows.into_iter()
            .map(|row| row.try_into().map_err(RepoError::Other))
            .collect()
    }

    // ===== Agents =====

    pub async fn create_agent(
        &self,
        name: &str,
        vault_id: Uuid,
        system_prompt: &str,
    ) -> Result<Agent, RepoError> {
        let agent = sqlx::query_as::<_, Agent>(
            r#"INSERT INTO agents (name, vault_id, system_prompt)
               VALUES ($1, $2, $3)
               RETURNING id, name, vault_id, system_prompt, created_at"#,
        )
        .bind(name)
        .bind(vault_id)
        .bind(system_prompt)
        .fetch_one(self.pool.get_pool())
        .await?;

        Ok(agent)
    }

    pub async fn list_agents(&self, vault_id: Option<Uuid>) -> Result<Vec<Agent>, RepoError> {
        let agents = sqlx::query_as::<_, Agent>(
            r#"SELECT id, name, vault_id, system_prompt, created_at
               FROM agents
               WHERE ($1::uuid IS NULL OR vault_id = $1)
               ORDER BY created_at ASC"#,
        )
        .bind(vault_id)
        .fetch_all(self.pool.get_pool())
        .await?;

        Ok(agents)
    }

    pub async fn get_agent(&self, id: Uuid) -> Result<Option<Agent>, RepoError> {
        let agent = sqlx::query_as::<_, Agent>(
            "SELECT id, name, vault_id, system_prompt, created_at FROM agents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.get_pool())
        .await?;

        Ok(agent)
    }

    pub async fn delete_agent(&self, id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM agents WHERE id = $1")
            .bind(id)
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
