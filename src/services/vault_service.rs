use std::sync::Arc;

use uuid::Uuid;

use crate::database::models::VaultWithCount;
use crate::database::{Repository, VectorStore};
use crate::utils::ApiError;

pub struct VaultService {
    repo: Arc<Repository>,
    vector_store: Arc<VectorStore>,
}

impl VaultService {
    pub fn new(repo: Arc<Repository>, vector_store: Arc<VectorStore>) -> Self {
        Self { repo, vector_store }
    }

    pub async fn create(&self, name: &str, description: Option<&str>) -> Result<VaultWithCount, ApiError> {
        let vault = self.repo.create_vault(name, description).await?;
        Ok(VaultWithCount {
            vault,
            document_count: 0,
        })
    }

    pub async fn list(&self) -> Result<Vec<VaultWithCount>, ApiError> {
        Ok(self.repo.list_vaults().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<VaultWithCount, ApiError> {
        self.repo
            .get_vault_with_count(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("vault {id} not found")))
    }

    /// Deletes a vault and everything it owns, in order: Vector Store
    /// embeddings, then Document rows, then the Vault row itself (Agents
    /// cascade via FK when the vault row goes).
    /// Every step is idempotent, so retrying after a crash mid-delete
    /// converges to fully deleted.
    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        if !self.repo.vault_exists(id).await? {
            return Err(ApiError::NotFound(format!("vault {id} not found")));
        }

        self.vector_store.delete_by_vault(id).await?;
        self.repo.delete_documents_by_vault(id).await?;
        self.repo.delete_vault_row(id).await?;
        Ok(())
    }
}
