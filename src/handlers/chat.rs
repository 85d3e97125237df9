use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::ApiError;

#[derive(Deserialize)]
pub struct ChatConfig {
    pub top_k: Option<i64>,
    pub temperature: Option<f32>,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    pub vault_id: Option<Uuid>,
    pub config: Option<ChatConfig>,
}

#[derive(Serialize)]
pub struct SourceResponse {
    pub document_id: Uuid,
    pub title: Option<String>,
    pub snippet: String,
    pub score: f32,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub answer: String,
    pub sources: Vec<SourceResponse>,
}

pub async fn chat(
    Extension(state): Extension<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    if body.session_id.trim().is_empty() {
        return Err(ApiError::ValidationError("session_id must not be empty".to_string()));
    }

    let config = body.config.unwrap_or(ChatConfig {
        top_k: None,
        temperature: None,
    });
    let top_k = config.top_k.unwrap_or(state.settings.rag.top_k_default as i64);
    let temperature = config
        .temperature
        .unwrap_or(state.settings.rag.default_temperature);

    let outcome = state
        .retrieval_service
        .chat(&body.session_id, &body.message, body.vault_id, top_k, temperature)
        .await?;

    Ok(Json(ChatResponse {
        session_id: body.session_id,
        answer: outcome.answer,
        sources: outcome
            .sources
            .into_iter()
            .map(|s| SourceResponse {
                document_id: s.document_id,
                title: s.title,
                snippet: s.snippet,
                score: s.score,
            })
            .collect(),
    }))
}
