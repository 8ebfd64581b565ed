pub mod runner;
pub mod kedro;
pub mod manifest;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::llm::parser::normalize_arguments;
use crate::models::{ToolCall, ToolOutput, ToolSpec};

pub use kedro::{CreateProjectArgs, CreateProjectTool, KedroCli, RunPipelineTool};
pub use manifest::CheckManifestTool;
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};

#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// `Err` only for unusable arguments; execution failures are `ToolOutput::error`.
    async fn call(&self, args: Value) -> Result<ToolOutput>;
}

/// Tools available to the agent, in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<(String, Arc<dyn Tool>)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The Kedro project tools, all sharing one work directory.
    pub fn kedro(kedro: KedroCli) -> Self {
        let mut registry = Self::new();
        let workdir = kedro.workdir().to_path_buf();
        registry
            .register(RunPipelineTool::new(kedro.clone()))
            .register(CreateProjectTool::new(kedro))
            .register(CheckManifestTool::new(workdir));
        registry
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) -> &mut Self {
        let name = tool.spec().name;
        let tool: Arc<dyn Tool> = Arc::new(tool);
        match self.tools.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = tool,
            None => self.tools.push((name, tool)),
        }
        self
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|(_, tool)| tool.spec()).collect()
    }

    pub async fn call(&self, call: &ToolCall) -> ToolOutput {
        let Some((_, tool)) = self.tools.iter().find(|(name, _)| *name == call.name) else {
            tracing::warn!(tool = %call.name, "Model requested an unknown tool");
            return ToolOutput::error(format!(
                "Error: {} is not a valid tool, try one of [{}].",
                call.name,
                self.names().join(", ")
            ));
        };

        let result = match normalize_arguments(call.arguments.clone()) {
            Ok(arguments) => tool.call(arguments).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Rejected tool arguments");
                ToolOutput::error(format!("Error: invalid arguments for {}: {}", call.name, e))
            }
        }
    }
}
