use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::llm::parser::normalize_arguments;
use crate::llm::provider::LlmProvider;
use crate::models::{ChatMessage, Role, ToolCall, ToolSpec};

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct OllamaToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: OllamaFunction,
}

#[derive(Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessage>,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaProvider {
    pub fn new(base_url: &str, agent: &AgentConfig, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: agent.model.clone(),
            temperature: agent.temperature,
        })
    }
}

impl From<&ChatMessage> for OllamaMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role.to_string(),
            content: message.content.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|call| OllamaToolCall {
                    id: None,
                    function: OllamaFunction {
                        name: call.name.clone(),
                        arguments: if call.arguments.is_object() {
                            call.arguments.clone()
                        } else {
                            Value::Object(Default::default())
                        },
                    },
                })
                .collect(),
            tool_name: message.tool_name.clone(),
        }
    }
}

/// Arguments that cannot be normalized are kept raw; the tool registry
/// reports them back to the model instead of failing the turn.
fn into_chat_message(message: OllamaMessage) -> ChatMessage {
    if message.role != "assistant" {
        tracing::debug!(role = %message.role, "unexpected role in Ollama reply");
    }

    let tool_calls = message
        .tool_calls
        .into_iter()
        .map(|call| {
            let raw = call.function.arguments;
            let arguments = match normalize_arguments(raw.clone()) {
                Ok(arguments) => arguments,
                Err(e) => {
                    tracing::warn!(tool = %call.function.name, error = %e, "Malformed tool arguments");
                    raw
                }
            };
            ToolCall {
                id: call.id.unwrap_or_default(),
                name: call.function.name,
                arguments,
            }
        })
        .collect();

    ChatMessage {
        role: Role::Assistant,
        content: message.content,
        tool_calls,
        tool_name: None,
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn chat(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage> {
        let request_body = OllamaRequest {
            model: &self.model,
            messages: messages.iter().map(OllamaMessage::from).collect(),
            tools: tools.iter().map(ToolSpec::to_wire).collect(),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat request to Ollama"
        );

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Error::LlmApi(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::LlmApi(format!(
                "Ollama API error ({}): {}",
                status, body
            )));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| Error::LlmApi(format!("Failed to parse Ollama response: {}", e)))?;

        if let Some(error) = result.error {
            return Err(Error::LlmApi(error));
        }

        let message = result
            .message
            .ok_or_else(|| Error::LlmApi("Ollama response has no message".to_string()))?;

        Ok(into_chat_message(message))
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}
