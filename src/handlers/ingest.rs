use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::ApiError;

#[derive(Deserialize)]
pub struct IngestRequest {
    pub text: String,
    pub title: Option<String>,
    pub source: Option<String>,
    pub vault_id: Option<Uuid>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct IngestResponse {
    pub document_id: Uuid,
    pub status: &'static str,
}

pub async fn ingest(
    Extension(state): Extension<AppState>,
    Json(body): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let document_id = state
        .ingestion_service
        .ingest(
            &body.text,
            body.title.as_deref(),
            body.source.as_deref(),
            body.vault_id,
            body.metadata.unwrap_or_else(|| serde_json::json!({})),
        )
        .await?;

    Ok(Json(IngestResponse {
        document_id,
        status: "indexed",
    }))
}
