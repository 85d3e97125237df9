use axum::extract::Path;
use axum::{http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::VaultWithCount;
use crate::state::AppState;
use crate::utils::ApiError;

#[derive(Deserialize)]
pub struct CreateVaultRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct VaultResponse {
    pub vault_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub document_count: i64,
}

impl From<VaultWithCount> for VaultResponse {
    fn from(v: VaultWithCount) -> Self {
        VaultResponse {
            vault_id: v.vault.id,
            name: v.vault.name,
            description: v.vault.description,
            created_at: v.vault.created_at,
            document_count: v.document_count,
        }
    }
}

pub async fn create_vault(
    Extension(state): Extension<AppState>,
    Json(body): Json<CreateVaultRequest>,
) -> Result<(StatusCode, Json<VaultResponse>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::ValidationError("name must not be empty".to_string()));
    }

    let vault = state
        .vault_service
        .create(&body.name, body.description.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(vault.into())))
}

pub async fn list_vaults(
    Extension(state): Extension<AppState>,
) -> Result<Json<Vec<VaultResponse>>, ApiError> {
    let vaults = state.vault_service.list().await?;
    Ok(Json(vaults.into_iter().map(Into::into).collect()))
}

pub async fn get_vault(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<VaultResponse>, ApiError> {
    let vault = state.vault_service.get(id).await?;
    Ok(Json(vault.into()))
}

#[derive(Serialize)]
pub struct DeleteVaultResponse {
    pub vault_id: Uuid,
    pub status: &'static str,
}

pub async fn delete_vault(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteVaultResponse>, ApiError> {
    state.vault_service.delete(id).await?;
    Ok(Json(DeleteVaultResponse {
        vault_id: id,
        status: "deleted",
    }))
}
