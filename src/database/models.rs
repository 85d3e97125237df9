use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Vault {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A vault plus its live document count, computed at query time.
#[derive(Debug, Clone, Serialize)]
pub struct VaultWithCount {
    pub vault: Vault,
    pub document_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Document {
    pub id: Uuid,
    pub vault_id: Option<Uuid>,
    pub title: Option<String>,
    pub source: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentWithChunkCount {
    pub document: Document,
    pub chunk_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub ordinal: i32,
    pub text: String,
    pub token_count: i32,
}

/// A chunk ready to be persisted, produced by the chunker and consumed by
/// the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct ChunkDraft {
    pub ordinal: i32,
    pub text: String,
    pub token_count: i32,
}

/// A chunk plus its vector, ready for `VectorStore::upsert_chunks`.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub ordinal: i32,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => anyhow::bail!("invalid message role: {other}"),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: row.id,
            session_id: row.session_id,
            role: row.role.parse()?,
            content: row.content,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Session {
    pub id: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub vault_id: Uuid,
    pub system_prompt: String,
    pub created_at: DateTime<Utc>,
}

/// A row returned by `VectorStore::search`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub title: Option<String>,
    pub snippet: String,
    pub score: f32,
}

/// Snippet rule shared by `VectorStore::search`: first 200 chars with
/// collapsed whitespace; shorter chunks return their full text verbatim.
pub fn make_snippet(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= 200 {
        collapsed
    } else {
        collapsed.chars().take(200).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_collapses_whitespace_and_caps_length() {
        let text = "word ".repeat(100);
        let snippet = make_snippet(&text);
        assert_eq!(snippet.chars().count(), 200);
        assert!(!snippet.contains("  "));
    }

    #[test]
    fn snippet_returns_full_text_when_short() {
        let text = "short   chunk\nwith   whitespace";
        let snippet = make_snippet(text);
        assert_eq!(snippet, "short chunk with whitespace");
    }
}
