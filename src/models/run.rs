use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::{ChatMessage, Role};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl From<&str> for RunStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "completed" => RunStatus::Completed,
            _ => RunStatus::Failed,
        }
    }
}

/// One agent invocation: the prompt, the full transcript and the final answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRun {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub prompt: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub output: String,
    pub messages: Vec<ChatMessage>,
}

impl AgentRun {
    pub fn tool_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role == Role::Tool)
    }
}
