pub mod models;
pub mod pool;
pub mod repository;
pub mod vector_store;

pub use models::*;
pub use pool::DbPool;
pub use repository::{RepoError, Repository};
pub use vector_store::{VaultFilter, VectorStore};
