pub mod openai_chat;
pub mod openai_embedder;
pub mod retry;

use async_trait::async_trait;
use thiserror::Error;

pub use openai_chat::OpenAiChatCompleter;
pub use openai_embedder::OpenAiEmbedder;

/// Failure taxonomy for the two outbound provider capabilities.
/// `Unavailable` is only ever produced by the retry executor once attempts
/// are exhausted or the deadline can't cover another backoff; adapters
/// themselves only ever raise `Transient`/`Permanent`.
#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    #[error("transient provider failure: {0}")]
    Transient(String),
    #[error("permanent provider failure: {0}")]
    Permanent(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// A single turn in the chat completion wire format. Reuses the same
/// role vocabulary as a persisted `Message`.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// text -> fixed-dimension vector, order preserved, batched internally.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// The fixed dimension D this embedder produces; used to validate
    /// provider responses against configuration.
    fn dimension(&self) -> usize;
}

/// ordered messages + temperature -> reply text.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    async fn complete(&self, messages: &[ChatTurn], temperature: f32) -> Result<String, ProviderError>;
}
