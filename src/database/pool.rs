use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;

/// Thin wrapper over the shared Postgres pool. The Vector Store and the
/// Metadata Store are separate components conceptually, but both are
/// backed by the same Postgres instance here (pgvector is a Postgres
/// extension, not a separate service), so they share one pool — the "may
/// share the pool when co-located" since there's no reason to hold two.
#[derive(Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.pool_min)
            .max_connections(config.pool_max)
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    /// Wraps an already-connected, already-migrated pool (e.g. the one
    /// `#[sqlx::test]` hands to a test function) without going through
    /// `new`'s own connect + migrate. Only exercised from tests, kept
    /// outside a `cfg(test)` gate so `tests/*.rs` integration tests (which
    /// link against the crate built without `cfg(test)`) can call it.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}
