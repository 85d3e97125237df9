use std::sync::Arc;

use uuid::Uuid;

use crate::database::models::Agent;
use crate::database::Repository;
use crate::utils::ApiError;

/// Entity service for Agents: named (system prompt, vault) pairs used to
/// parameterize chat turns. Unique on `(name, vault_id)`.
pub struct AgentService {
    repo: Arc<Repository>,
}

impl AgentService {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, name: &str, vault_id: Uuid, system_prompt: &str) -> Result<Agent, ApiError> {
        if !self.repo.vault_exists(vault_id).await? {
            return Err(ApiError::NotFound(format!("vault {vault_id} not found")));
        }

        Ok(self.repo.create_agent(name, vault_id, system_prompt).await?)
    }

    pub async fn list(&self, vault_id: Option<Uuid>) -> Result<Vec<Agent>, ApiError> {
        Ok(self.repo.list_agents(vault_id).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Agent, ApiError> {
        self.repo
            .get_agent(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("agent {id} not found")))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let deleted = self.repo.delete_agent(id).await?;
        if !deleted {
            return Err(ApiError::NotFound(format!("agent {id} not found")));
        }
        Ok(())
    }
}
