use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use toml::{Table, Value};

use super::Issue;

pub const DOCSTRING_CONVENTIONS: &[&str] = &["google", "numpy", "pep257"];

const SELECTOR_LISTS: &[&str] = &["select", "extend-select", "ignore", "fixable", "unfixable"];

fn selector_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(ALL|[A-Z]+[0-9]*)$").expect("valid selector regex"))
}

pub fn is_valid_selector(selector: &str) -> bool {
    selector_re().is_match(selector)
}

/// The ruff lint settings we report on.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LintConfig {
    pub section: String,
    pub select: Vec<String>,
    pub extend_select: Vec<String>,
    pub ignore: Vec<String>,
    pub convention: Option<String>,
    pub per_file_ignores: BTreeMap<String, Vec<String>>,
}

/// Reads the legacy top-level `[tool.ruff]` settings and then `[tool.ruff.lint]`,
/// which wins for any key it sets. Both are checked.
pub fn inspect_ruff(tool: &Table, issues: &mut Vec<Issue>) -> Option<LintConfig> {
    let ruff = match tool.get("ruff") {
        Some(Value::Table(ruff)) => ruff,
        Some(_) => {
            issues.push(Issue::new("tool.ruff", "expected a table"));
            return None;
        }
        None => return None,
    };

    let mut config = LintConfig {
        section: "tool.ruff".to_string(),
        ..Default::default()
    };
    read_lint_table("tool.ruff", ruff, &mut config, issues);

    match ruff.get("lint") {
        Some(Value::Table(lint)) => {
            config.section = "tool.ruff.lint".to_string();
            read_lint_table("tool.ruff.lint", lint, &mut config, issues);
        }
        Some(_) => issues.push(Issue::new("tool.ruff.lint", "expected a table")),
        None => {}
    }

    Some(config)
}

fn read_lint_table(section: &str, table: &Table, config: &mut LintConfig, issues: &mut Vec<Issue>) {
    for key in SELECTOR_LISTS {
        let Some(value) = table.get(*key) else {
            continue;
        };
        let selectors = selector_list(value, &format!("{}.{}", section, key), issues);
        match *key {
            "select" => config.select = selectors,
            "extend-select" => config.extend_select = selectors,
            "ignore" => config.ignore = selectors,
            _ => {}
        }
    }

    if let Some(pydocstyle) = table.get("pydocstyle") {
        if let Some(convention) = docstring_convention(pydocstyle, section, issues) {
            config.convention = Some(convention);
        }
    }

    if let Some(ignores) = table.get("per-file-ignores") {
        let location = format!("{}.per-file-ignores", section);
        match ignores {
            Value::Table(entries) => {
                for (pattern, codes) in entries {
                    let entry_location = format!("{}.\"{}\"", location, pattern);
                    if pattern.trim().is_empty() {
                        issues.push(Issue::new(&entry_location, "path pattern is empty"));
                        continue;
                    }
                    let codes = selector_list(codes, &entry_location, issues);
                    config.per_file_ignores.insert(pattern.clone(), codes);
                }
            }
            _ => issues.push(Issue::new(location, "expected a table of path patterns")),
        }
    }
}

fn selector_list(value: &Value, location: &str, issues: &mut Vec<Issue>) -> Vec<String> {
    let Value::Array(items) = value else {
        issues.push(Issue::new(location, "expected an array of rule selectors"));
        return Vec::new();
    };

    let mut selectors = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(code) if is_valid_selector(code) => selectors.push(code.to_string()),
            Some(code) => issues.push(Issue::new(
                format!("{}[{}]", location, i),
                format!("'{}' is not a valid rule selector", code),
            )),
            None => issues.push(Issue::new(
                format!("{}[{}]", location, i),
                "rule selector must be a string",
            )),
        }
    }
    selectors
}

fn docstring_convention(value: &Value, section: &str, issues: &mut Vec<Issue>) -> Option<String> {
    let location = format!("{}.pydocstyle.convention", section);
    let convention = match value {
        Value::Table(t) => t.get("convention")?,
        _ => {
            issues.push(Issue::new(format!("{}.pydocstyle", section), "expected a table"));
            return None;
        }
    };

    match convention.as_str() {
        Some(name) if DOCSTRING_CONVENTIONS.contains(&name) => Some(name.to_string()),
        Some(name) => {
            issues.push(Issue::new(
                location,
                format!(
                    "'{}' is not one of {}",
                    name,
                    DOCSTRING_CONVENTIONS.join(", ")
                ),
            ));
            None
        }
        None => {
            issues.push(Issue::new(location, "expected a string"));
            None
        }
    }
}
