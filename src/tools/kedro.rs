use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::models::{ToolOutput, ToolSpec};
use crate::tools::runner::{CommandRunner, ProcessRunner};
use crate::tools::Tool;

pub const RUN_PIPELINE_TOOL: &str = "run_kedro_pipeline";
pub const CREATE_PROJECT_TOOL: &str = "create_kedro_project";

/// Tools `kedro new --tools` understands by name.
pub const PROJECT_TOOLS: &[&str] = &["lint", "test", "log", "docs", "data", "pyspark", "viz"];

/// Thin wrapper over the `kedro` executable.
#[derive(Clone)]
pub struct KedroCli {
    runner: Arc<dyn CommandRunner>,
    program: String,
    workdir: PathBuf,
}

impl KedroCli {
    pub fn new(program: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self::with_runner(Arc::new(ProcessRunner), program, workdir)
    }

    pub fn with_runner(
        runner: Arc<dyn CommandRunner>,
        program: impl Into<String>,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            program: program.into(),
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub async fn run_pipeline(&self, pipeline_name: &str) -> ToolOutput {
        tracing::info!(pipeline_name = %pipeline_name, "Tool called: run_kedro_pipeline");

        let args = run_args(pipeline_name);
        tracing::info!(command = %self.display(&args), "Running pipeline");

        match self.runner.run(&self.program, &args, &self.workdir).await {
            Ok(output) if output.success => {
                let result = format!("Pipeline '{}' executed successfully.", pipeline_name);
                tracing::info!(pipeline_name = %pipeline_name, "Pipeline execution completed");
                ToolOutput::ok(result)
            }
            Ok(output) => {
                let detail = output.failure_detail();
                tracing::error!(pipeline_name = %pipeline_name, error = %detail, "Pipeline execution failed");
                ToolOutput::error(format!("Error running pipeline: {}", detail))
            }
            Err(e) => {
                tracing::error!(pipeline_name = %pipeline_name, error = %e, "Pipeline execution failed");
                ToolOutput::error(format!("Error running pipeline: {}", e))
            }
        }
    }

    pub async fn create_project(&self, args: &CreateProjectArgs) -> ToolOutput {
        tracing::info!(
            project_name = %args.project_name,
            tools = %args.tools,
            example = %args.example,
            telemetry = %args.telemetry,
            "Tool called: create_kedro_project"
        );

        let cli_args = args.to_cli_args();
        tracing::info!(command = %self.display(&cli_args), "Executing kedro new command");

        match self.runner.run(&self.program, &cli_args, &self.workdir).await {
            Ok(output) if output.success => {
                let mut message = format!("Kedro project '{}' created successfully!", args.project_name);
                if !output.stdout.is_empty() {
                    message.push_str(&format!("\n\nOutput:\n{}", output.stdout));
                }
                tracing::info!(project_name = %args.project_name, "Project creation completed");
                ToolOutput::ok(message)
            }
            Ok(output) => {
                let message = format!("Error creating Kedro project: {}", output.failure_detail());
                tracing::error!(project_name = %args.project_name, error = %message, "Project creation failed");
                ToolOutput::error(message)
            }
            Err(e) => {
                tracing::error!(project_name = %args.project_name, error = %e, "Project creation failed");
                ToolOutput::error(format!("Error creating Kedro project: {}", e))
            }
        }
    }

    fn display(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// `kedro run` arguments; the default pipeline needs no `--pipeline` flag.
pub fn run_args(pipeline_name: &str) -> Vec<String> {
    let mut args = vec!["run".to_string()];
    let name = pipeline_name.trim();
    if !matches!(name, "" | "default" | "__default__") {
        args.push("--pipeline".to_string());
        args.push(name.to_string());
    }
    args
}

/// Validated arguments for `kedro new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProjectArgs {
    pub project_name: String,
    pub tools: String,
    pub example: String,
    pub telemetry: String,
}

impl CreateProjectArgs {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            tools: "none".to_string(),
            example: "n".to_string(),
            telemetry: "n".to_string(),
        }
    }

    /// Parses model-supplied arguments, normalizing yes/no flags and the tool list.
    pub fn from_value(value: &Value) -> Result<Self> {
        let project_name = match value.get("project_name") {
            Some(Value::String(name)) => name.trim().to_string(),
            Some(_) => {
                return Err(Error::InvalidArguments(
                    "project_name must be a string".to_string(),
                ))
            }
            None => {
                return Err(Error::InvalidArguments(
                    "project_name is required".to_string(),
                ))
            }
        };
        if project_name.is_empty() {
            return Err(Error::InvalidArguments(
                "project_name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            project_name,
            tools: normalize_tools(value.get("tools"))?,
            example: yes_no(value.get("example"), "example")?.to_string(),
            telemetry: yes_no(value.get("telemetry"), "telemetry")?.to_string(),
        })
    }

    pub fn to_cli_args(&self) -> Vec<String> {
        [
            "new",
            "--name",
            self.project_name.as_str(),
            "--tools",
            self.tools.as_str(),
            "--example",
            self.example.as_str(),
            "--telemetry",
            self.telemetry.as_str(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

fn yes_no(value: Option<&Value>, field: &str) -> Result<&'static str> {
    match value {
        None | Some(Value::Null) => Ok("n"),
        Some(Value::Bool(true)) => Ok("y"),
        Some(Value::Bool(false)) => Ok("n"),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "y" | "yes" | "true" => Ok("y"),
            "n" | "no" | "false" | "" => Ok("n"),
            other => Err(Error::InvalidArguments(format!(
                "{} must be 'y' or 'n', got '{}'",
                field, other
            ))),
        },
        Some(other) => Err(Error::InvalidArguments(format!(
            "{} must be 'y' or 'n', got {}",
            field, other
        ))),
    }
}

fn normalize_tools(value: Option<&Value>) -> Result<String> {
    let requested: Vec<String> = match value {
        None | Some(Value::Null) => return Ok("none".to_string()),
        Some(Value::String(s)) => s.split(',').map(|t| t.trim().to_lowercase()).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|t| t.trim().to_lowercase())
                    .ok_or_else(|| Error::InvalidArguments("tools must be strings".to_string()))
            })
            .collect::<Result<_>>()?,
        Some(other) => {
            return Err(Error::InvalidArguments(format!(
                "tools must be 'all', 'none' or a comma-separated list, got {}",
                other
            )))
        }
    };

    let requested: Vec<String> = requested.into_iter().filter(|t| !t.is_empty()).collect();
    match requested.as_slice() {
        [] => return Ok("none".to_string()),
        [single] if single == "all" || single == "none" => return Ok(single.clone()),
        _ => {}
    }

    let mut selected: Vec<String> = Vec::new();
    for tool in requested {
        if !PROJECT_TOOLS.contains(&tool.as_str()) {
            return Err(Error::InvalidArguments(format!(
                "unknown project tool '{}', expected 'all', 'none' or any of {}",
                tool,
                PROJECT_TOOLS.join(", ")
            )));
        }
        if !selected.contains(&tool) {
            selected.push(tool);
        }
    }
    Ok(selected.join(","))
}

pub struct RunPipelineTool {
    kedro: KedroCli,
}

impl RunPipelineTool {
    pub fn new(kedro: KedroCli) -> Self {
        Self { kedro }
    }
}

#[async_trait]
impl Tool for RunPipelineTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            RUN_PIPELINE_TOOL,
            "Runs a pipeline of the Kedro project in the working directory, by name (default: 'default').",
            json!({
                "type": "object",
                "properties": {
                    "pipeline_name": {
                        "type": "string",
                        "description": "Name of the registered pipeline to run",
                        "default": "default"
                    }
                }
            }),
        )
    }

    async fn call(&self, args: Value) -> Result<ToolOutput> {
        let pipeline_name = match args.get("pipeline_name") {
            None | Some(Value::Null) => "default",
            Some(Value::String(name)) => name.as_str(),
            Some(_) => {
                return Err(Error::InvalidArguments(
                    "pipeline_name must be a string".to_string(),
                ))
            }
        };
        Ok(self.kedro.run_pipeline(pipeline_name).await)
    }
}

pub struct CreateProjectTool {
    kedro: KedroCli,
}

impl CreateProjectTool {
    pub fn new(kedro: KedroCli) -> Self {
        Self { kedro }
    }
}

#[async_trait]
impl Tool for CreateProjectTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            CREATE_PROJECT_TOOL,
            "Creates a new Kedro project. Take the EXACT project name from the user's request, \
             usually in quotes or after 'called'/'named'. tools: 'all' when the user asks for all tools, \
             otherwise 'none' or a comma-separated list. example: 'y' when the user mentions an example \
             or sample pipeline, otherwise 'n'. telemetry: 'y' only when the user explicitly asks for it.",
            json!({
                "type": "object",
                "properties": {
                    "project_name": {
                        "type": "string",
                        "description": "Exact name of the new project as given by the user"
                    },
                    "tools": {
                        "type": "string",
                        "description": "'all', 'none', or a comma-separated list of lint, test, log, docs, data, pyspark, viz",
                        "default": "none"
                    },
                    "example": {
                        "type": "string",
                        "enum": ["y", "n"],
                        "description": "Include the example pipeline",
                        "default": "n"
                    },
                    "telemetry": {
                        "type": "string",
                        "enum": ["y", "n"],
                        "description": "Enable telemetry",
                        "default": "n"
                    }
                },
                "required": ["project_name"]
            }),
        )
    }

    async fn call(&self, args: Value) -> Result<ToolOutput> {
        let args = CreateProjectArgs::from_value(&args)?;
        Ok(self.kedro.create_project(&args).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::FakeRunner;
    use crate::tools::runner::CommandOutput;

    fn cli(runner: Arc<FakeRunner>) -> KedroCli {
        KedroCli::with_runner(runner, "kedro", "/work")
    }

    #[test]
    fn test_run_args() {
        assert_eq!(run_args("default"), vec!["run"]);
        assert_eq!(run_args("__default__"), vec!["run"]);
        assert_eq!(run_args(" "), vec!["run"]);
        assert_eq!(run_args("data_processing"), vec!["run", "--pipeline", "data_processing"]);
    }

    #[test]
    fn test_create_args_normalization() {
        let args = CreateProjectArgs::from_value(&json!({
            "project_name": " analytics-pipeline ",
            "tools": "all",
            "example": "Yes",
            "telemetry": false
        }))
        .unwrap();
        assert_eq!(args.project_name, "analytics-pipeline");
        assert_eq!(args.tools, "all");
        assert_eq!(args.example, "y");
        assert_eq!(args.telemetry, "n");

        let listed = CreateProjectArgs::from_value(&json!({
            "project_name": "demo",
            "tools": "Lint, test,lint,,docs"
        }))
        .unwrap();
        assert_eq!(listed.tools, "lint,test,docs");
        assert_eq!(listed.example, "n");

        let array = CreateProjectArgs::from_value(&json!({
            "project_name": "demo",
            "tools": ["data", "viz"]
        }))
        .unwrap();
        assert_eq!(array.tools, "data,viz");
    }

    #[test]
    fn test_create_args_rejections() {
        for bad in [
            json!({}),
            json!({"project_name": "  "}),
            json!({"project_name": 5}),
            json!({"project_name": "demo", "tools": "lint,kubernetes"}),
            json!({"project_name": "demo", "example": "maybe"}),
            json!({"project_name": "demo", "telemetry": 1}),
        ] {
            assert!(
                matches!(CreateProjectArgs::from_value(&bad), Err(Error::InvalidArguments(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_create_project_success_includes_stdout() {
        let runner = Arc::new(FakeRunner::succeeding("Congratulations!"));
        let kedro = cli(runner.clone());

        let output = kedro
            .create_project(&CreateProjectArgs::new("analytics-pipeline"))
            .await;

        assert!(!output.is_error);
        assert_eq!(
            output.content,
            "Kedro project 'analytics-pipeline' created successfully!\n\nOutput:\nCongratulations!"
        );
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "kedro");
        assert_eq!(
            calls[0].1,
            vec![
                "new", "--name", "analytics-pipeline", "--tools", "none", "--example", "n",
                "--telemetry", "n"
            ]
        );
        assert_eq!(calls[0].2, PathBuf::from("/work"));
    }

    #[tokio::test]
    async fn test_create_project_failure_reports_stderr() {
        let runner = Arc::new(FakeRunner::returning(CommandOutput {
            success: false,
            code: Some(1),
            stdout: String::new(),
            stderr: "Directory already exists".to_string(),
        }));
        let output = cli(runner)
            .create_project(&CreateProjectArgs::new("demo"))
            .await;

        assert!(output.is_error);
        assert_eq!(output.content, "Error creating Kedro project: Directory already exists");
    }

    #[tokio::test]
    async fn test_create_project_spawn_failure() {
        let runner = Arc::new(FakeRunner::failing_to_spawn());
        let output = cli(runner)
            .create_project(&CreateProjectArgs::new("demo"))
            .await;

        assert!(output.is_error);
        assert!(output.content.starts_with("Error creating Kedro project: "));
    }

    #[tokio::test]
    async fn test_run_pipeline_messages() {
        let ok = cli(Arc::new(FakeRunner::succeeding("")))
            .run_pipeline("default")
            .await;
        assert_eq!(ok.content, "Pipeline 'default' executed successfully.");

        let runner = Arc::new(FakeRunner::returning(CommandOutput {
            success: false,
            code: Some(1),
            stdout: String::new(),
            stderr: "Pipeline 'missing' not found".to_string(),
        }));
        let failed = cli(runner.clone()).run_pipeline("missing").await;
        assert!(failed.is_error);
        assert_eq!(failed.content, "Error running pipeline: Pipeline 'missing' not found");
        assert_eq!(runner.calls()[0].1, vec!["run", "--pipeline", "missing"]);
    }

    #[tokio::test]
    async fn test_run_pipeline_tool_defaults_name() {
        let runner = Arc::new(FakeRunner::succeeding(""));
        let tool = RunPipelineTool::new(cli(runner.clone()));

        let output = tool.call(json!({})).await.unwrap();
        assert_eq!(output.content, "Pipeline 'default' executed successfully.");
        assert_eq!(runner.calls()[0].1, vec!["run"]);

        assert!(tool.call(json!({"pipeline_name": 3})).await.is_err());
    }
}
