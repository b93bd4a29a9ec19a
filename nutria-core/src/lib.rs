pub mod config;
pub mod context;
pub mod db;
pub mod dietplan;
pub mod error;
pub mod history;
pub mod inference;
pub mod memory;
pub mod models;
pub mod retrieve;

pub use config::NutriaConfig;
pub use context::ContextAssembler;
pub use dietplan::{DietPlanDocument, DietPlanError, DietPlanGenerator, DietPlanSettings};
pub use error::NutriaError;
pub use history::ChatHistory;
pub use inference::{
    ChatCompletion, ChatOptions, ChatRole, ModelClient, ModelConfig, ModelError, PromptMessage,
    DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_MODEL, EMBEDDING_DIMENSIONS,
};
pub use memory::{MemoryPage, MemoryStore};
pub use retrieve::{Corpus, Retriever};
