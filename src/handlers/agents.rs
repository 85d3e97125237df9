use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::Agent;
use crate::state::AppState;
use crate::utils::ApiError;

#[derive(Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub vault_id: Uuid,
    pub system_prompt: String,
}

#[derive(Serialize)]
pub struct AgentResponse {
    pub agent_id: Uuid,
    pub name: String,
    pub vault_id: Uuid,
    pub system_prompt: String,
    pub created_at: DateTime<Utc>,
}

impl From<Agent> for AgentResponse {
    fn from(a: Agent) -> Self {
        AgentResponse {
            agent_id: a.id,
            name: a.name,
            vault_id: a.vault_id,
            system_prompt: a.system_prompt,
            created_at: a.created_at,
        }
    }
}

pub async fn create_agent(
    Extension(state): Extension<AppState>,
    Json(body): Json<CreateAgentRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    if body.name.trim().is_empty() || body.system_prompt.trim().is_empty() {
        return Err(ApiError::ValidationError(
            "name and system_prompt must not be empty".to_string(),
        ));
    }

    let agent = state
        .agent_service
        .create(&body.name, body.vault_id, &body.system_prompt)
        .await?;

    Ok(Json(agent.into()))
}

#[derive(Deserialize)]
pub struct ListAgentsQuery {
    pub vault_id: Option<Uuid>,
}

pub async fn list_agents(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListAgentsQuery>,
) -> Result<Json<Vec<AgentResponse>>, ApiError> {
    let agents = state.agent_service.list(query.vault_id).await?;
    Ok(Json(agents.into_iter().map(Into::into).collect()))
}

pub async fn get_agent(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentResponse>, ApiError> {
    let agent = state.agent_service.get(id).await?;
    Ok(Json(agent.into()))
}

#[derive(Serialize)]
pub struct DeleteAgentResponse {
    pub success: bool,
    pub message: String,
}

pub async fn delete_agent(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteAgentResponse>, ApiError> {
    state.agent_service.delete(id).await?;
    Ok(Json(DeleteAgentResponse {
        success: true,
        message: format!("agent {id} deleted"),
    }))
}
