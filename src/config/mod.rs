pub mod settings;

pub use settings::{DatabaseConfig, ProviderConfig, RagConfig, ServerConfig, Settings};
