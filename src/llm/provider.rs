use async_trait::async_trait;
use crate::error::Result;
use crate::models::{ChatMessage, ToolSpec};

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// One non-streaming chat turn. The reply may carry tool calls.
    async fn chat(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage>;
    fn model(&self) -> &str;
    fn name(&self) -> &str;
}
