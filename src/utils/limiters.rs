use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Bounds in-flight concurrent calls to each provider capability, per
/// `provider.max_concurrency`. Excess callers queue on the semaphore rather
/// than piling onto the HTTP client unbounded.
pub struct Limiters {
    embedding: Arc<Semaphore>,
    chat: Arc<Semaphore>,
}

impl Limiters {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            embedding: Arc::new(Semaphore::new(max_concurrency)),
            chat: Arc::new(Semaphore::new(max_concurrency)),
        }
    }

    pub async fn acquire_embedding(&self) -> Result<SemaphorePermit<'_>> {
        Self::acquire_timed(&self.embedding, Duration::from_secs(30)).await
    }

    pub async fn acquire_chat(&self) -> Result<SemaphorePermit<'_>> {
        Self::acquire_timed(&self.chat, Duration::from_secs(30)).await
    }

    async fn acquire_timed(semaphore: &Semaphore, wait_cap: Duration) -> Result<SemaphorePermit<'_>> {
        tokio::time::timeout(wait_cap, semaphore.acquire())
            .await
            .map_err(|_| anyhow::anyhow!("timed out waiting for provider capacity"))?
            .map_err(|_| anyhow::anyhow!("provider semaphore closed"))
    }
}
