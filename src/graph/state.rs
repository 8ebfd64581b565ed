use crate::models::{ChatMessage, Role, ToolCall};

/// State threaded through the agent graph.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    pub messages: Vec<ChatMessage>,
    /// Node executions so far in this invocation.
    pub steps: usize,
}

impl AgentState {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(prompt)],
            steps: 0,
        }
    }

    pub fn last_assistant(&self) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// Tool calls of the latest message, if that message is an assistant turn.
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        match self.messages.last() {
            Some(m) if m.role == Role::Assistant => &m.tool_calls,
            _ => &[],
        }
    }

    pub fn final_output(&self) -> String {
        self.last_assistant()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}
