use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub rag: RagConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_request_bytes: usize,
    pub cors_origins: Vec<String>,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_min: u32,
    pub pool_max: u32,
}

/// Configuration for the two outbound provider adapters.
/// Both capabilities share one OpenAI-compatible base URL/API key in the
/// common case, but the model identifiers differ and must be passed through
/// verbatim (no built-in allow-list).
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub chat_model: String,
    pub max_concurrency: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RagConfig {
    pub chunk_window_tokens: usize,
    pub chunk_overlap_tokens: usize,
    pub embedding_batch_size: usize,
    pub max_history_messages: usize,
    pub top_k_default: usize,
    pub default_temperature: f32,
    /// Token budget for the assembled context block (retrieved snippets
    /// only, not history) within a chat prompt. When snippets don't fit,
    /// the lowest-scoring ones are dropped first.
    pub context_token_budget: usize,
}

impl Settings {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }
}
