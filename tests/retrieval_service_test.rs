//! RetrievalService tests: real, ephemeral Postgres for session/message and
//! vector-store state, mocked Embedder/ChatCompleter for determinism.

use std::sync::Arc;
use std::time::Duration;

use rag_core::database::models::{ChunkDraft, EmbeddedChunk};
use rag_core::database::{DbPool, Repository, VectorStore};
use rag_core::providers::{ChatCompleter, ChatTurn, Embedder, MockChatCompleter, MockEmbedder};
use rag_core::services::{RetrievalService, SessionLocks};
use sqlx::PgPool;
use uuid::Uuid;

/// `embeddings.vector` is `VECTOR(1536)`, matching the default
/// `provider.embedding_dimension`; a mocked embedder still has to return
/// vectors of that width or the Vector Store insert rejects them.
const TEST_DIM: usize = 1536;

fn constant_embedder() -> MockEmbedder {
    let mut mock = MockEmbedder::new();
    mock.expect_embed()
        .returning(|batch| Ok(batch.iter().map(|_| vec![1.0; TEST_DIM]).collect()));
    mock.expect_dimension().return_const(TEST_DIM);
    mock
}

/// Pads a short, readable pattern out to the real column width with zeros;
/// cosine similarity between test vectors is unaffected.
fn v(pattern: &[f32]) -> Vec<f32> {
    let mut vector = pattern.to_vec();
    vector.resize(TEST_DIM, 0.0);
    vector
}

fn echoing_chat_completer() -> MockChatCompleter {
    let mut mock = MockChatCompleter::new();
    mock.expect_complete()
        .returning(|messages: &[ChatTurn], _temp| Ok(format!("reply #{}", messages.len())));
    mock
}

async fn service(
    pool: PgPool,
    embedder: MockEmbedder,
    chat_completer: MockChatCompleter,
) -> (RetrievalService, Repository, VectorStore) {
    let db = DbPool::from_pool(pool);
    let repo = Arc::new(Repository::new(db.clone()));
    let store = Arc::new(VectorStore::new(db.clone()));
    let embedder: Arc<dyn Embedder> = Arc::new(embedder);
    let chat_completer: Arc<dyn ChatCompleter> = Arc::new(chat_completer);

    let service = RetrievalService::new(
        repo.clone(),
        store.clone(),
        embedder,
        chat_completer,
        Arc::new(SessionLocks::new()),
        10,
        2000,
        Duration::from_secs(30),
    )
    .unwrap();

    (
        service,
        Repository::new(db.clone()),
        VectorStore::new(db),
    )
}

async fn seed_chunk(repo: &Repository, store: &VectorStore, vault_id: Uuid, title: &str, vector: Vec<f32>) -> Uuid {
    let document_id = Uuid::new_v4();
    let chunks = repo
        .create_document_with_chunks(
            document_id,
            Some(vault_id),
            Some(title),
            None,
            &serde_json::json!({}),
            &[ChunkDraft { ordinal: 0, text: "Paris is the capital of France.".to_string(), token_count: 6 }],
        )
        .await
        .unwrap();
    let chunk_ids: Vec<Uuid> = chunks.iter().map(|c| c.id).collect();
    store
        .upsert_chunks(document_id, Some(vault_id), Some(title), None, &chunk_ids, &[EmbeddedChunk { ordinal: 0, vector }])
        .await
        .unwrap();
    document_id
}

#[sqlx::test(migrations = "./migrations")]
async fn empty_message_is_rejected(pool: PgPool) {
    let (service, _repo, _store) = service(pool, constant_embedder(), echoing_chat_completer()).await;
    let err = service.chat("s1", "   ", None, 5, 0.3).await;
    assert!(err.is_err());
}

#[sqlx::test(migrations = "./migrations")]
async fn user_message_is_durable_even_though_no_sources_exist(pool: PgPool) {
    let (service, repo, _store) = service(pool, constant_embedder(), echoing_chat_completer()).await;

    let outcome = service.chat("s2", "hello there", None, 5, 0.3).await.unwrap();
    assert!(outcome.sources.is_empty());

    let history = repo.list_recent_messages("s2", 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "hello there");
}

#[sqlx::test(migrations = "./migrations")]
async fn two_turn_session_accumulates_four_messages_in_order(pool: PgPool) {
    let (service, repo, _store) = service(pool, constant_embedder(), echoing_chat_completer()).await;

    service.chat("s3", "My name is Zoe.", None, 5, 0.3).await.unwrap();
    service.chat("s3", "What is my name?", None, 5, 0.3).await.unwrap();

    let history = repo.list_recent_messages("s3", 10).await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].content, "My name is Zoe.");
    assert_eq!(history[1].role.as_str(), "assistant");
    assert_eq!(history[2].content, "What is my name?");
    assert_eq!(history[3].role.as_str(), "assistant");
}

#[sqlx::test(migrations = "./migrations")]
async fn sources_are_scoped_to_the_requested_vault(pool: PgPool) {
    let (service, repo, store) = service(pool, constant_embedder(), echoing_chat_completer()).await;

    let vault_a = repo.create_vault("A", None).await.unwrap();
    let vault_b = repo.create_vault("B", None).await.unwrap();
    let doc_a = seed_chunk(&repo, &store, vault_a.id, "in-a", v(&[1.0, 0.0, 0.0])).await;
    seed_chunk(&repo, &store, vault_b.id, "in-b", v(&[1.0, 0.0, 0.0])).await;

    let outcome = service
        .chat("s4", "What is the capital of France?", Some(vault_a.id), 5, 0.3)
        .await
        .unwrap();

    assert_eq!(outcome.sources.len(), 1);
    assert_eq!(outcome.sources[0].document_id, doc_a);
}

#[sqlx::test(migrations = "./migrations")]
async fn sources_are_sorted_by_score_descending(pool: PgPool) {
    let (service, repo, store) = service(pool, constant_embedder(), echoing_chat_completer()).await;

    let vault = repo.create_vault("Scored", None).await.unwrap();
    seed_chunk(&repo, &store, vault.id, "far", v(&[0.0, 1.0, 0.0])).await;
    seed_chunk(&repo, &store, vault.id, "near", v(&[0.9, 0.1, 0.0])).await;
    seed_chunk(&repo, &store, vault.id, "exact", v(&[1.0, 0.0, 0.0])).await;

    let outcome = service
        .chat("s5", "What is the capital of France?", Some(vault.id), 10, 0.3)
        .await
        .unwrap();

    assert!(outcome.sources.windows(2).all(|w| w[0].score >= w[1].score));
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_turns_on_the_same_session_do_not_interleave(pool: PgPool) {
    let db = DbPool::from_pool(pool);
    let repo = Arc::new(Repository::new(db.clone()));
    let store = Arc::new(VectorStore::new(db));
    let embedder: Arc<dyn Embedder> = Arc::new(constant_embedder());
    let chat_completer: Arc<dyn ChatCompleter> = Arc::new(echoing_chat_completer());

    let service = Arc::new(
        RetrievalService::new(
            repo.clone(),
            store,
            embedder,
            chat_completer,
            Arc::new(SessionLocks::new()),
            10,
            2000,
            Duration::from_secs(30),
        )
        .unwrap(),
    );

    let mut handles = Vec::new();
    for i in 0..4 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service
                .chat("shared-session", &format!("turn {i}"), None, 5, 0.3)
                .await
                .unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let history = repo.list_recent_messages("shared-session", 20).await.unwrap();
    assert_eq!(history.len(), 8);
    // Every user message must be immediately followed, at some point, by an
    // assistant message from the same turn: since turns are fully
    // serialized by the per-session lock, user/assistant pairs can never
    // interleave across turns.
    for pair in history.chunks(2) {
        assert_eq!(pair[0].role.as_str(), "user");
        assert_eq!(pair[1].role.as_str(), "assistant");
    }
}
