use chrono::Utc;
use std::sync::Arc;

use super::nodes::{AgentNode, ToolsNode, AGENT_NODE, TOOLS_NODE};
use super::runtime::{EdgeCondition, StateGraph};
use super::state::AgentState;
use crate::config::AgentConfig;
use crate::error::Result;
use crate::llm::LlmProvider;
use crate::models::{AgentRun, RunStatus};
use crate::tools::ToolRegistry;

/// Reason/act loop: `agent` ⇄ `tools` until the model answers without tool calls.
pub struct ReactAgent {
    graph: StateGraph,
    model: String,
}

impl ReactAgent {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: ToolRegistry,
        system_prompt: impl Into<String>,
        config: &AgentConfig,
    ) -> Result<Self> {
        let model = provider.model().to_string();
        let tool_names = registry.names();

        let mut graph = StateGraph::new()
            .with_entry(AGENT_NODE)
            .with_max_steps(config.recursion_limit);
        graph.add_node(Box::new(AgentNode::new(provider, system_prompt.into(), &registry)));
        graph.add_node(Box::new(ToolsNode::new(registry)));
        graph.add_conditional_edge(AGENT_NODE, TOOLS_NODE, EdgeCondition::on(TOOLS_NODE))?;
        graph.add_edge(TOOLS_NODE, AGENT_NODE)?;

        tracing::info!(model = %model, tools = ?tool_names, "Created ReAct agent");
        Ok(Self { graph, model })
    }

    /// Runs the graph for one user prompt. Failures are captured in the returned
    /// run (status `failed`, output = error text) together with the partial transcript.
    pub async fn invoke(&self, prompt: &str) -> AgentRun {
        let started_at = Utc::now();
        let mut state = AgentState::new(prompt);

        tracing::info!(model = %self.model, "Invoking agent");
        let (status, output) = match self.graph.run(&mut state).await {
            Ok(()) => {
                tracing::info!(steps = state.steps, messages = state.messages.len(), "Agent execution completed");
                (RunStatus::Completed, state.final_output())
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    retryable = e.is_retryable(),
                    steps = state.steps,
                    "Agent execution failed"
                );
                (RunStatus::Failed, e.to_string())
            }
        };

        AgentRun {
            id: None,
            prompt: prompt.to_string(),
            model: self.model.clone(),
            started_at,
            finished_at: Utc::now(),
            status,
            output,
            messages: state.messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::{ChatMessage, Role, ToolCall, ToolSpec};
    use crate::tools::testing::FakeRunner;
    use crate::tools::KedroCli;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records what it was sent.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<Result<ChatMessage>>>,
        repeat_last: Option<ChatMessage>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<ChatMessage>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                repeat_last: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn forever(reply: ChatMessage) -> Self {
            Self {
                repeat_last: Some(reply),
                ..Self::new(Vec::new())
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(&self, messages: &[ChatMessage], _tools: &[ToolSpec]) -> Result<ChatMessage> {
            self.seen.lock().unwrap().push(messages.to_vec());
            if let Some(reply) = self.replies.lock().unwrap().pop_front() {
                return reply;
            }
            self.repeat_last
                .clone()
                .ok_or_else(|| Error::LlmApi("script exhausted".to_string()))
        }

        fn model(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "Scripted"
        }
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: String::new(),
            name: name.to_string(),
            arguments,
        }
    }

    fn agent(provider: Arc<ScriptedProvider>, runner: Arc<FakeRunner>, limit: usize) -> ReactAgent {
        let registry = ToolRegistry::kedro(KedroCli::with_runner(runner, "kedro", "/work"));
        let config = AgentConfig {
            recursion_limit: limit,
            ..AgentConfig::default()
        };
        ReactAgent::new(provider, registry, "system prompt", &config).unwrap()
    }

    #[tokio::test]
    async fn test_creates_project_then_answers() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ChatMessage::assistant_with_calls(
                "<think>user wants analytics-pipeline</think>",
                vec![call(
                    "create_kedro_project",
                    json!({
                        "project_name": "analytics-pipeline",
                        "tools": "all",
                        "example": "y",
                        "telemetry": "n"
                    }),
                )],
            )),
            Ok(ChatMessage::assistant(
                "<think>done</think>The project 'analytics-pipeline' was created.",
            )),
        ]));
        let runner = Arc::new(FakeRunner::succeeding(""));

        let run = agent(provider.clone(), runner.clone(), 25)
            .invoke("Create a project called 'analytics-pipeline'")
            .await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.output, "The project 'analytics-pipeline' was created.");
        assert_eq!(run.model, "scripted");

        let roles: Vec<_> = run.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(run.messages[1].tool_calls[0].id, "call_0_0");
        assert_eq!(
            run.messages[2].content,
            "Kedro project 'analytics-pipeline' created successfully!"
        );
        assert_eq!(run.tool_messages().count(), 1);

        assert_eq!(
            runner.calls()[0].1,
            vec![
                "new", "--name", "analytics-pipeline", "--tools", "all", "--example", "y",
                "--telemetry", "n"
            ]
        );

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0][0].role, Role::System);
        assert_eq!(seen[0][0].content, "system prompt");
        assert_eq!(seen[1].last().unwrap().role, Role::Tool);
    }

    #[tokio::test]
    async fn test_parallel_tool_calls_keep_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ChatMessage::assistant_with_calls(
                "",
                vec![
                    call("run_kedro_pipeline", json!({"pipeline_name": "ingest"})),
                    call("unknown_tool", json!({})),
                    call("run_kedro_pipeline", json!({})),
                ],
            )),
            Ok(ChatMessage::assistant("All done.")),
        ]));
        let runner = Arc::new(FakeRunner::succeeding(""));

        let run = agent(provider, runner.clone(), 25).invoke("run things").await;

        assert_eq!(run.status, RunStatus::Completed);
        let tool_outputs: Vec<_> = run.tool_messages().map(|m| m.content.as_str()).collect();
        assert_eq!(tool_outputs.len(), 3);
        assert_eq!(tool_outputs[0], "Pipeline 'ingest' executed successfully.");
        assert!(tool_outputs[1].starts_with("Error: unknown_tool is not a valid tool"));
        assert_eq!(tool_outputs[2], "Pipeline 'default' executed successfully.");
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_recovers_tool_call_written_as_text() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ChatMessage::assistant(
                r#"{"name": "run_kedro_pipeline", "arguments": {"pipeline_name": "reporting"}}"#,
            )),
            Ok(ChatMessage::assistant("Reporting pipeline finished.")),
        ]));
        let runner = Arc::new(FakeRunner::succeeding(""));

        let run = agent(provider, runner.clone(), 25).invoke("run reporting").await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.messages[1].content, "");
        assert_eq!(run.messages[1].tool_calls[0].name, "run_kedro_pipeline");
        assert_eq!(runner.calls()[0].1, vec!["run", "--pipeline", "reporting"]);
        assert_eq!(run.output, "Reporting pipeline finished.");
    }

    #[tokio::test]
    async fn test_model_retries_after_malformed_arguments() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(ChatMessage::assistant_with_calls(
                "",
                vec![call("create_kedro_project", json!("{\"project_name\": \"demo\""))],
            )),
            Ok(ChatMessage::assistant_with_calls(
                "",
                vec![call("create_kedro_project", json!({"project_name": "demo"}))],
            )),
            Ok(ChatMessage::assistant("Created demo.")),
        ]));
        let runner = Arc::new(FakeRunner::succeeding(""));

        let run = agent(provider.clone(), runner.clone(), 25).invoke("make demo").await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.output, "Created demo.");
        let tool_outputs: Vec<_> = run.tool_messages().map(|m| m.content.as_str()).collect();
        assert!(tool_outputs[0].starts_with("Error: invalid arguments for create_kedro_project"));
        assert_eq!(tool_outputs[1], "Kedro project 'demo' created successfully!");
        assert_eq!(runner.calls().len(), 1);

        let seen = provider.seen.lock().unwrap();
        assert!(seen[1].last().unwrap().content.starts_with("Error: invalid arguments"));
    }

    #[tokio::test]
    async fn test_recursion_limit_fails_the_run() {
        let provider = Arc::new(ScriptedProvider::forever(ChatMessage::assistant_with_calls(
            "",
            vec![call("run_kedro_pipeline", json!({}))],
        )));
        let runner = Arc::new(FakeRunner::succeeding(""));

        let run = agent(provider, runner.clone(), 5).invoke("loop forever").await;

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(
            run.output,
            "Recursion limit of 5 reached without hitting a stop condition"
        );
        // agent, tools, agent, tools, agent
        assert_eq!(runner.calls().len(), 2);
        assert_eq!(run.messages.len(), 6);
    }

    #[tokio::test]
    async fn test_provider_error_fails_the_run() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(Error::LlmApi(
            "connection refused".to_string(),
        ))]));
        let run = agent(provider, Arc::new(FakeRunner::succeeding("")), 25)
            .invoke("hello")
            .await;

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.output, "LLM API error: connection refused");
        assert_eq!(run.messages.len(), 1);
    }
}
