use std::sync::Arc;
use std::time::Duration;

use tiktoken_rs::CoreBPE;
use uuid::Uuid;

use crate::database::models::{Message, Role, SearchHit};
use crate::database::{Repository, VaultFilter, VectorStore};
use crate::providers::{ChatCompleter, ChatTurn, Embedder};
use crate::utils::ApiError;

use super::session_lock::SessionLocks;

const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant. Answer using the provided context \
when it is relevant; if the context doesn't cover the question, say so rather than guessing.";

/// A source in the response, mirroring `VectorStore::search`'s ordering and
/// `{documentId, title, snippet, score}` shape.
#[derive(Debug, Clone)]
pub struct SourceRef {
    pub document_id: Uuid,
    pub title: Option<String>,
    pub snippet: String,
    pub score: f32,
}

pub struct ChatOutcome {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Retrieval + Memory Core: the conversational read path.
/// Shares the Vector Store and Metadata Store with the Ingestion Pipeline.
pub struct RetrievalService {
    repo: Arc<Repository>,
    vector_store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    chat_completer: Arc<dyn ChatCompleter>,
    session_locks: Arc<SessionLocks>,
    max_history: i64,
    context_token_budget: usize,
    request_timeout: Duration,
    tokenizer: CoreBPE,
}

impl RetrievalService {
    pub fn new(
        repo: Arc<Repository>,
        vector_store: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
        chat_completer: Arc<dyn ChatCompleter>,
        session_locks: Arc<SessionLocks>,
        max_history: i64,
        context_token_budget: usize,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            repo,
            vector_store,
            embedder,
            chat_completer,
            session_locks,
            max_history,
            context_token_budget,
            request_timeout,
            tokenizer: tiktoken_rs::cl100k_base()?,
        })
    }

    pub async fn chat(
        &self,
        session_id: &str,
        message: &str,
        vault_id: Option<Uuid>,
        top_k: i64,
        temperature: f32,
    ) -> Result<ChatOutcome, ApiError> {
        if message.trim().is_empty() {
            return Err(ApiError::ValidationError("message must not be empty".to_string()));
        }
        if top_k < 0 {
            return Err(ApiError::ValidationError("top_k must not be negative".to_string()));
        }

        match tokio::time::timeout(
            self.request_timeout,
            self.chat_inner(session_id, message, vault_id, top_k, temperature),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout),
        }
    }

    async fn chat_inner(
        &self,
        session_id: &str,
        message: &str,
        vault_id: Option<Uuid>,
        top_k: i64,
        temperature: f32,
    ) -> Result<ChatOutcome, ApiError> {
        // Holds the whole turn, not just the writes: simplest realization of
        // "messages from concurrent turns on the same session are totally
        // ordered" without a finer-grained locking scheme.
        let _session_guard = self.session_locks.acquire(session_id).await;

        self.repo.get_or_create_session(session_id, None).await?;
        let history = self.repo.list_recent_messages(session_id, self.max_history).await?;

        // Durable intent: the user message is persisted before any call to
        // an external provider, so it survives even if those calls fail.
        self.repo.append_message(session_id, Role::User.as_str(), message).await?;

        let query_vectors = self.embedder.embed(&[message.to_string()]).await?;
        let query_vector = query_vectors
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("embedder returned no vector for query".to_string()))?;

        let filter = match vault_id {
            Some(v) => VaultFilter::Vault(v),
            None => VaultFilter::None,
        };
        let hits = self.vector_store.search(&query_vector, top_k, filter).await?;
        let budgeted_hits = self.truncate_to_budget(hits.clone());

        let prompt = self.build_prompt(&budgeted_hits, &history, message);
        let reply = self.chat_completer.complete(&prompt, temperature).await?;

        self.repo
            .append_message(session_id, Role::Assistant.as_str(), &reply)
            .await?;
        self.repo.update_last_active(session_id).await?;

        Ok(ChatOutcome {
            answer: reply,
            sources: hits.into_iter().map(Into::into).collect(),
        })
    }

    fn build_prompt(&self, hits: &[SearchHit], history: &[Message], user_message: &str) -> Vec<ChatTurn> {
        let mut messages = Vec::with_capacity(history.len() + 3);

        messages.push(ChatTurn {
            role: Role::System.as_str().to_string(),
            content: SYSTEM_INSTRUCTION.to_string(),
        });

        if !hits.is_empty() {
            messages.push(ChatTurn {
                role: Role::System.as_str().to_string(),
                content: format!("Context:\n{}", format_context_block(hits)),
            });
        }

        for msg in history {
            messages.push(ChatTurn {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
            });
        }

        messages.push(ChatTurn {
            role: Role::User.as_str().to_string(),
            content: user_message.to_string(),
        });

        messages
    }

    /// Drops lowest-scoring snippets first until the budget fits. `hits`
    /// is already sorted best-first, so dropping from the end drops the
    /// worst-scoring ones.
    fn truncate_to_budget(&self, mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
        while !hits.is_empty() {
            let block = format_context_block(&hits);
            let tokens = self.tokenizer.encode_ordinary(&block).len();
            if tokens <= self.context_token_budget {
                break;
            }
            hits.pop();
        }
        hits
    }
}

fn format_context_block(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            format!(
                "[document:{} title:{}]\n{}",
                hit.document_id,
                hit.title.as_deref().unwrap_or("untitled"),
                hit.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl From<SearchHit> for SourceRef {
    fn from(hit: SearchHit) -> Self {
        SourceRef {
            document_id: hit.document_id,
            title: hit.title,
            snippet: hit.snippet,
            score: hit.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(score: f32) -> SearchHit {
        SearchHit {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            title: Some("t".to_string()),
            snippet: "word ".repeat(200),
            score,
        }
    }

    #[test]
    fn format_context_block_orders_as_given() {
        let hits = vec![hit(0.9), hit(0.5)];
        let block = format_context_block(&hits);
        let first_pos = block.find(&hits[0].document_id.to_string()).unwrap();
        let second_pos = block.find(&hits[1].document_id.to_string()).unwrap();
        assert!(first_pos < second_pos);
    }
}
