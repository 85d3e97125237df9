use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::info;

mod chunker;
mod config;
mod database;
mod handlers;
mod providers;
mod services;
mod state;
mod utils;

use chunker::Chunker;
use config::Settings;
use database::{DbPool, Repository, VectorStore};
use providers::{ChatCompleter, Embedder, OpenAiChatCompleter, OpenAiEmbedder};
use services::{AgentService, DocumentService, IngestionService, RetrievalService, SessionLocks, VaultService};
use state::AppState;
use utils::Limiters;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info,rag_core=debug".to_string()))
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("starting rag-core");

    let settings = Settings::load()?;
    info!("configuration loaded");

    let db_pool = DbPool::new(&settings.database).await?;
    db_pool.migrate().await?;
    info!("database connected and migrated");

    let repo = Arc::new(Repository::new(db_pool.clone()));
    let vector_store = Arc::new(VectorStore::new(db_pool));
    let limiters = Arc::new(Limiters::new(settings.provider.max_concurrency));
    let request_timeout = Duration::from_secs(settings.server.request_timeout_seconds);

    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
        &settings.provider,
        settings.rag.embedding_batch_size,
        request_timeout,
        limiters.clone(),
    ));
    let chat_completer: Arc<dyn ChatCompleter> = Arc::new(OpenAiChatCompleter::new(
        &settings.provider,
        request_timeout,
        limiters.clone(),
    ));
    let chunker = Chunker::new(settings.rag.chunk_window_tokens, settings.rag.chunk_overlap_tokens);
    let session_locks = Arc::new(SessionLocks::new());

    let vault_service = Arc::new(VaultService::new(repo.clone(), vector_store.clone()));
    let document_service = Arc::new(DocumentService::new(repo.clone(), vector_store.clone()));
    let agent_service = Arc::new(AgentService::new(repo.clone()));
    let ingestion_service = Arc::new(IngestionService::new(
        repo.clone(),
        vector_store.clone(),
        embedder.clone(),
        chunker,
    ));
    let retrieval_service = Arc::new(RetrievalService::new(
        repo,
        vector_store,
        embedder,
        chat_completer,
        session_locks,
        settings.rag.max_history_messages as i64,
        settings.rag.context_token_budget,
        request_timeout,
    )?);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));
    let max_request_bytes = settings.server.max_request_bytes;

    let state = AppState {
        settings,
        vault_service,
        document_service,
        agent_service,
        ingestion_service,
        retrieval_service,
    };

    let app = build_router(state, max_request_bytes);

    info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState, max_request_bytes: usize) -> Router {
    let cors = if state.settings.server.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<axum::http::HeaderValue> = state
            .settings
            .server
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    };

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/vaults", post(handlers::vaults::create_vault).get(handlers::vaults::list_vaults))
        .route(
            "/vaults/{id}",
            get(handlers::vaults::get_vault).delete(handlers::vaults::delete_vault),
        )
        .route("/ingest", post(handlers::ingest::ingest))
        .route("/chat", post(handlers::chat::chat))
        .route(
            "/documents",
            get(handlers::documents::list_documents),
        )
        .route(
            "/documents/{id}",
            get(handlers::documents::get_document).delete(handlers::documents::delete_document),
        )
        .route("/agents", post(handlers::agents::create_agent).get(handlers::agents::list_agents))
        .route(
            "/agents/{id}",
            get(handlers::agents::get_agent).delete(handlers::agents::delete_agent),
        )
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default().include_headers(true)))
        .layer(DefaultBodyLimit::max(max_request_bytes))
}
