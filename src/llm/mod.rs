pub mod provider;
pub mod ollama;
pub mod prompts;
pub mod parser;

pub use provider::LlmProvider;
pub use ollama::OllamaProvider;
pub use prompts::{DEFAULT_TASK, SYSTEM_PROMPT};
