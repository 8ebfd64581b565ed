use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;

use super::runtime::{Node, NodeOutput};
use super::state::AgentState;
use crate::error::{Error, Result};
use crate::llm::parser::{recover_tool_call, strip_think};
use crate::llm::LlmProvider;
use crate::models::{ChatMessage, ToolCall, ToolSpec};
use crate::tools::ToolRegistry;

pub const AGENT_NODE: &str = "agent";
pub const TOOLS_NODE: &str = "tools";

/// Asks the model for the next move.
pub struct AgentNode {
    provider: Arc<dyn LlmProvider>,
    system_prompt: String,
    tools: Vec<ToolSpec>,
    tool_names: Vec<String>,
}

impl AgentNode {
    pub fn new(provider: Arc<dyn LlmProvider>, system_prompt: String, registry: &ToolRegistry) -> Self {
        Self {
            provider,
            system_prompt,
            tools: registry.specs(),
            tool_names: registry.names(),
        }
    }
}

#[async_trait]
impl Node for AgentNode {
    fn id(&self) -> &'static str {
        AGENT_NODE
    }

    async fn execute(&self, state: &mut AgentState) -> Result<NodeOutput> {
        let mut messages = Vec::with_capacity(state.messages.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(state.messages.iter().cloned());

        let reply = self.provider.chat(&messages, &self.tools).await?;

        let mut content = strip_think(&reply.content);
        let mut tool_calls = reply.tool_calls;

        if tool_calls.is_empty() {
            if let Some((name, arguments)) = recover_tool_call(&content, &self.tool_names) {
                tracing::debug!(tool = %name, "Recovered tool call from message text");
                tool_calls.push(ToolCall {
                    id: String::new(),
                    name,
                    arguments,
                });
                content.clear();
            }
        }

        for (i, call) in tool_calls.iter_mut().enumerate() {
            if call.id.is_empty() {
                call.id = format!("call_{}_{}", state.steps, i);
            }
        }

        let message = ChatMessage::assistant_with_calls(content, tool_calls);
        let has_calls = message.has_tool_calls();
        if has_calls {
            let names: Vec<_> = message.tool_calls.iter().map(|c| c.name.as_str()).collect();
            tracing::info!(tools = ?names, "Model requested tools");
        }
        state.messages.push(message);

        Ok(if has_calls {
            NodeOutput::Branch(TOOLS_NODE.to_string())
        } else {
            NodeOutput::Final
        })
    }
}

/// Runs every tool call of the last assistant turn and records the results.
pub struct ToolsNode {
    registry: ToolRegistry,
}

impl ToolsNode {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Node for ToolsNode {
    fn id(&self) -> &'static str {
        TOOLS_NODE
    }

    async fn execute(&self, state: &mut AgentState) -> Result<NodeOutput> {
        let calls = state.pending_tool_calls().to_vec();
        if calls.is_empty() {
            return Err(Error::graph(TOOLS_NODE, "no pending tool calls"));
        }

        let outputs = join_all(calls.iter().map(|call| self.registry.call(call))).await;

        for (call, output) in calls.iter().zip(outputs) {
            if output.is_error {
                tracing::warn!(tool = %call.name, id = %call.id, "Tool returned an error");
            }
            state
                .messages
                .push(ChatMessage::tool(call.name.clone(), output.content));
        }

        Ok(NodeOutput::Continue(None))
    }
}
