pub mod config;
pub mod error;
pub mod models;
pub mod llm;
pub mod tools;
pub mod graph;
pub mod manifest;
pub mod storage;

pub use config::{AgentConfig, Config};
pub use error::{Error, Result};
pub use llm::{LlmProvider, OllamaProvider};
pub use tools::{KedroCli, ToolRegistry};
pub use graph::ReactAgent;
pub use storage::Storage;
