use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::DocumentWithChunkCount;
use crate::state::AppState;
use crate::utils::ApiError;

const DEFAULT_LIMIT: i64 = 20;

#[derive(Deserialize)]
pub struct ListDocumentsQuery {
    pub vault_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub vault_id: Option<Uuid>,
    pub title: Option<String>,
    pub source: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub chunk_count: i64,
}

impl From<DocumentWithChunkCount> for DocumentResponse {
    fn from(d: DocumentWithChunkCount) -> Self {
        DocumentResponse {
            id: d.document.id,
            vault_id: d.document.vault_id,
            title: d.document.title,
            source: d.document.source,
            metadata: d.document.metadata,
            created_at: d.document.created_at,
            chunk_count: d.chunk_count,
        }
    }
}

#[derive(Serialize)]
pub struct ListDocumentsResponse {
    pub documents: Vec<DocumentResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

pub async fn list_documents(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListDocumentsQuery>,
) -> Result<Json<ListDocumentsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);

    let (documents, total) = state
        .document_service
        .list(query.vault_id, limit, offset)
        .await?;

    Ok(Json(ListDocumentsResponse {
        documents: documents.into_iter().map(Into::into).collect(),
        total,
        limit,
        offset,
    }))
}

pub async fn get_document(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = state.document_service.get(id).await?;
    Ok(Json(document.into()))
}

#[derive(Serialize)]
pub struct DeleteDocumentResponse {
    pub message: &'static str,
    pub document_id: Uuid,
}

pub async fn delete_document(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteDocumentResponse>, ApiError> {
    state.document_service.delete(id).await?;
    Ok(Json(DeleteDocumentResponse {
        message: "document deleted",
        document_id: id,
    }))
}
