use config::{Config, ConfigError, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct NutriaConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dimensions: u32,
    pub retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: 1536,
            retries: 2,
            retry_base_delay_ms: 250,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RagConfig {
    pub context_top_k: u32,
    pub memory_top_k: u32,
    pub history_depth: u32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            context_top_k: 5,
            memory_top_k: 5,
            history_depth: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6969,
        }
    }
}

impl NutriaConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }
}
