use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::manifest;
use crate::models::{ToolOutput, ToolSpec};
use crate::tools::Tool;

pub const CHECK_MANIFEST_TOOL: &str = "check_project_manifest";

pub struct CheckManifestTool {
    workdir: PathBuf,
}

impl CheckManifestTool {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn resolve(&self, path: Option<&str>) -> PathBuf {
        let path = self.workdir.join(path.unwrap_or("pyproject.toml"));
        if path.is_dir() {
            path.join("pyproject.toml")
        } else {
            path
        }
    }
}

#[async_trait]
impl Tool for CheckManifestTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new(
            CHECK_MANIFEST_TOOL,
            "Checks a project's pyproject.toml: Python version constraint, dependency specifiers and ruff lint settings. \
             Accepts a file or project directory relative to the working directory.",
            json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to pyproject.toml or to the project directory",
                        "default": "pyproject.toml"
                    }
                }
            }),
        )
    }

    async fn call(&self, args: Value) -> Result<ToolOutput> {
        let path = match args.get("path") {
            None | Some(Value::Null) => None,
            Some(Value::String(p)) if p.trim().is_empty() => None,
            Some(Value::String(p)) => Some(p.trim()),
            Some(_) => return Err(Error::InvalidArguments("path must be a string".to_string())),
        };
        let path = self.resolve(path);
        tracing::info!(path = %path.display(), "Tool called: check_project_manifest");

        match manifest::inspect(&path) {
            Ok(report) => {
                tracing::info!(issues = report.issues.len(), "Manifest checked");
                Ok(ToolOutput::ok(report.render()))
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Manifest check failed");
                Ok(ToolOutput::error(format!(
                    "Error checking manifest {}: {}",
                    path.display(),
                    e
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_checks_project_directory() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("spaceflights");
        std::fs::create_dir(&project).unwrap();
        std::fs::write(
            project.join("pyproject.toml"),
            "[project]\nname = \"spaceflights\"\nrequires-python = \">=3.9\"\ndependencies = [\"kedro~=0.19.10\"]\n",
        )
        .unwrap();

        let tool = CheckManifestTool::new(dir.path());
        let output = tool.call(json!({"path": "spaceflights"})).await.unwrap();

        assert!(!output.is_error);
        assert!(output.content.contains("Project: spaceflights"));
        assert!(output.content.contains("Result: OK"));
    }

    #[tokio::test]
    async fn test_missing_manifest_is_reported_to_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let output = CheckManifestTool::new(dir.path()).call(json!({})).await.unwrap();

        assert!(output.is_error);
        assert!(output.content.starts_with("Error checking manifest"));
    }
}
