//! Static checks for a project's `pyproject.toml`.
//!
//! `inspect` fails only when the file cannot be read or is not TOML. Everything
//! else (bad specifiers, unknown lint selectors, wrong value types) is collected
//! into the report as an [`Issue`].

pub mod lint;
pub mod specifier;

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use toml::{Table, Value};

use crate::error::{Error, Result};
pub use lint::LintConfig;
use specifier::{is_valid_name, validate_requirement, validate_specifier_set};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub location: String,
    pub message: String,
}

impl Issue {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KedroSettings {
    pub package_name: Option<String>,
    pub project_name: Option<String>,
    pub kedro_init_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestReport {
    pub path: PathBuf,
    pub project_name: Option<String>,
    pub requires_python: Option<String>,
    pub dependencies: Vec<String>,
    pub optional_dependencies: BTreeMap<String, Vec<String>>,
    pub lint: Option<LintConfig>,
    pub kedro: Option<KedroSettings>,
    pub issues: Vec<Issue>,
}

impl ManifestReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn render(&self) -> String {
        let mut output = format!("Manifest: {}\n", self.path.display());

        output.push_str(&format!(
            "Project: {}\n",
            self.project_name.as_deref().unwrap_or("(unnamed)")
        ));
        if let Some(ref requires) = self.requires_python {
            output.push_str(&format!("Requires-Python: {}\n", requires));
        }

        output.push_str(&format!("Dependencies: {}", self.dependencies.len()));
        if !self.optional_dependencies.is_empty() {
            let groups: Vec<_> = self.optional_dependencies.keys().map(String::as_str).collect();
            output.push_str(&format!(" (optional groups: {})", groups.join(", ")));
        }
        output.push('\n');

        if let Some(ref lint) = self.lint {
            output.push_str(&format!("Lint [{}]:", lint.section));
            if !lint.select.is_empty() {
                output.push_str(&format!(" select {}", lint.select.join(", ")));
            }
            if let Some(ref convention) = lint.convention {
                output.push_str(&format!("; docstring convention {}", convention));
            }
            output.push('\n');
            for (pattern, codes) in &lint.per_file_ignores {
                output.push_str(&format!("  ignore {} in {}\n", codes.join(", "), pattern));
            }
        }

        if let Some(ref kedro) = self.kedro {
            output.push_str(&format!(
                "Kedro: package {} (initialised with kedro {})\n",
                kedro.package_name.as_deref().unwrap_or("?"),
                kedro.kedro_init_version.as_deref().unwrap_or("?")
            ));
        }

        if self.issues.is_empty() {
            output.push_str("Result: OK\n");
        } else {
            output.push_str(&format!("Result: {} issue(s)\n", self.issues.len()));
            for issue in &self.issues {
                output.push_str(&format!("  - {}\n", issue));
            }
        }

        output
    }
}

pub fn inspect(path: impl AsRef<Path>) -> Result<ManifestReport> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let mut report = inspect_str(&text)?;
    report.path = path.to_path_buf();
    Ok(report)
}

pub fn inspect_str(text: &str) -> Result<ManifestReport> {
    let root: Table = toml::from_str(text).map_err(|e| Error::Manifest(e.to_string()))?;

    let mut report = ManifestReport {
        path: PathBuf::new(),
        project_name: None,
        requires_python: None,
        dependencies: Vec::new(),
        optional_dependencies: BTreeMap::new(),
        lint: None,
        kedro: None,
        issues: Vec::new(),
    };

    match root.get("project") {
        Some(Value::Table(project)) => inspect_project(project, &mut report),
        Some(_) => report.issues.push(Issue::new("project", "expected a table")),
        None => report.issues.push(Issue::new("project", "missing [project] table")),
    }

    match root.get("tool") {
        Some(Value::Table(tool)) => {
            report.lint = lint::inspect_ruff(tool, &mut report.issues);
            report.kedro = inspect_kedro(tool);
        }
        Some(_) => report.issues.push(Issue::new("tool", "expected a table")),
        None => {}
    }

    Ok(report)
}

fn inspect_project(project: &Table, report: &mut ManifestReport) {
    match project.get("name") {
        Some(Value::String(name)) if is_valid_name(name) => {
            report.project_name = Some(name.clone());
        }
        Some(Value::String(name)) => report.issues.push(Issue::new(
            "project.name",
            format!("'{}' is not a valid project name", name),
        )),
        Some(_) => report.issues.push(Issue::new("project.name", "expected a string")),
        None => report.issues.push(Issue::new("project.name", "missing")),
    }

    match project.get("requires-python") {
        Some(Value::String(spec)) => {
            if let Err(reason) = validate_specifier_set(spec) {
                report
                    .issues
                    .push(Issue::new("project.requires-python", reason));
            }
            report.requires_python = Some(spec.clone());
        }
        Some(_) => report
            .issues
            .push(Issue::new("project.requires-python", "expected a string")),
        None => {}
    }

    if let Some(deps) = project.get("dependencies") {
        report.dependencies = requirement_list(deps, "project.dependencies", &mut report.issues);
    }

    match project.get("optional-dependencies") {
        Some(Value::Table(groups)) => {
            for (group, deps) in groups {
                let location = format!("project.optional-dependencies.{}", group);
                if !is_valid_name(group) {
                    report.issues.push(Issue::new(
                        &location,
                        format!("'{}' is not a valid group name", group),
                    ));
                }
                let deps = requirement_list(deps, &location, &mut report.issues);
                report.optional_dependencies.insert(group.clone(), deps);
            }
        }
        Some(_) => report.issues.push(Issue::new(
            "project.optional-dependencies",
            "expected a table of groups",
        )),
        None => {}
    }
}

fn requirement_list(value: &Value, location: &str, issues: &mut Vec<Issue>) -> Vec<String> {
    let Value::Array(items) = value else {
        issues.push(Issue::new(location, "expected an array of requirement strings"));
        return Vec::new();
    };

    let mut requirements = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let item_location = format!("{}[{}]", location, i);
        match item.as_str() {
            Some(req) => {
                if let Err(reason) = validate_requirement(req) {
                    issues.push(Issue::new(item_location, reason));
                }
                requirements.push(req.to_string());
            }
            None => issues.push(Issue::new(item_location, "requirement must be a string")),
        }
    }
    requirements
}

fn inspect_kedro(tool: &Table) -> Option<KedroSettings> {
    let kedro = tool.get("kedro")?.as_table()?;
    let text = |key: &str| kedro.get(key).and_then(Value::as_str).map(str::to_string);

    Some(KedroSettings {
        package_name: text("package_name"),
        project_name: text("project_name"),
        kedro_init_version: text("kedro_init_version"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MANIFEST: &str = r#"
[project]
name = "kedro-agent-experiments"
version = "0.1.0"
requires-python = ">=3.11"
dependencies = [
    "langgraph>=0.2.0",
    "langchain>=0.3.0",
    "langchain-ollama>=0.2.0",
    "ollama>=0.4.0",
    "structlog>=24.1.0",
    "kedro>=0.19.0",
]

[tool.ruff.lint]
select = ["F", "E", "W", "D", "UP", "I", "PL"]

[tool.ruff.lint.pydocstyle]
convention = "google"

[tool.ruff.lint.per-file-ignores]
"tests/**" = ["D"]
"#;

    #[test]
    fn test_well_formed_manifest() {
        let report = inspect_str(MANIFEST).unwrap();

        assert!(report.is_valid(), "{:?}", report.issues);
        assert_eq!(report.project_name.as_deref(), Some("kedro-agent-experiments"));
        assert_eq!(report.requires_python.as_deref(), Some(">=3.11"));
        assert_eq!(report.dependencies.len(), 6);
        let lint = report.lint.as_ref().unwrap();
        assert_eq!(lint.convention.as_deref(), Some("google"));
        assert_eq!(lint.per_file_ignores["tests/**"], vec!["D"]);
        assert!(report.render().contains("Result: OK"));
    }

    #[test]
    fn test_malformed_entries_become_issues() {
        let report = inspect_str(
            r#"
[project]
name = "demo"
requires-python = "3.11+"
dependencies = ["kedro>=", "structlog", 7]

[project.optional-dependencies]
dev = ["pytest>=8"]
"#,
        )
        .unwrap();

        let locations: Vec<_> = report.issues.iter().map(|i| i.location.as_str()).collect();
        assert_eq!(
            locations,
            vec![
                "project.requires-python",
                "project.dependencies[0]",
                "project.dependencies[2]",
            ]
        );
        assert_eq!(report.dependencies, vec!["kedro>=", "structlog"]);
        assert_eq!(report.optional_dependencies["dev"], vec!["pytest>=8"]);
        assert!(report.render().contains("3 issue(s)"));
    }

    #[test]
    fn test_missing_project_table() {
        let report = inspect_str("[tool.kedro]\npackage_name = \"spaceflights\"\n").unwrap();
        assert_eq!(report.issues, vec![Issue::new("project", "missing [project] table")]);
        assert_eq!(
            report.kedro.unwrap().package_name.as_deref(),
            Some("spaceflights")
        );
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let err = inspect_str("[project\nname = 1").unwrap_err();
        assert!(matches!(err, Error::Manifest(_)));
    }

    #[test]
    fn test_inspect_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();

        let report = inspect(file.path()).unwrap();
        assert_eq!(report.path, file.path());
        assert!(report.is_valid());
    }
}
