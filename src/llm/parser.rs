use serde_json::{json, Value};

use crate::error::{Error, Result};

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Removes `<think>...</think>` reasoning blocks that some local models emit.
/// An unterminated block swallows the rest of the text.
pub fn strip_think(text: &str) -> String {
    if !text.contains(THINK_OPEN) {
        // Some chat templates drop the opening tag but keep the closing one.
        if let Some(end) = text.rfind(THINK_CLOSE) {
            return text[end + THINK_CLOSE.len()..].trim().to_string();
        }
        return text.trim().to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(THINK_OPEN) {
        out.push_str(&rest[..start]);
        match rest[start..].find(THINK_CLOSE) {
            Some(end) => rest = &rest[start + end + THINK_CLOSE.len()..],
            None => rest = "",
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

/// Accepts tool arguments as an object, a JSON-encoded string, or nothing.
pub fn normalize_arguments(value: Value) -> Result<Value> {
    match value {
        Value::Null => Ok(json!({})),
        Value::Object(_) => Ok(value),
        Value::String(raw) => {
            if raw.trim().is_empty() {
                return Ok(json!({}));
            }
            let parsed: Value = serde_json::from_str(&raw)
                .map_err(|e| Error::InvalidArguments(format!("not JSON: {}", e)))?;
            if parsed.is_object() {
                Ok(parsed)
            } else {
                Err(Error::InvalidArguments(
                    "arguments must be a JSON object".to_string(),
                ))
            }
        }
        other => Err(Error::InvalidArguments(format!(
            "arguments must be a JSON object, got {}",
            other
        ))),
    }
}

/// Recovers a tool call the model wrote as JSON text instead of using the
/// native tool-call field. Only names in `known_tools` are accepted.
pub fn recover_tool_call(text: &str, known_tools: &[String]) -> Option<(String, Value)> {
    let json_str = extract_json(text)?;
    let value: Value = serde_json::from_str(json_str).ok()?;

    let holder = value.get("function").unwrap_or(&value);
    let name = holder.get("name")?.as_str()?;
    if !known_tools.iter().any(|t| t == name) {
        return None;
    }

    let arguments = holder
        .get("arguments")
        .or_else(|| holder.get("parameters"))
        .cloned()
        .unwrap_or(Value::Null);

    let arguments = normalize_arguments(arguments).ok()?;
    Some((name.to_string(), arguments))
}

fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return Some(text[start..start + end].trim());
        }
    }

    if let Some(start) = text.find("```") {
        let start = start + 3;
        // Skip any language identifier on the fence line
        let start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[start..].find("```") {
            let content = text[start..start + end].trim();
            if content.starts_with('{') {
                return Some(content);
            }
        }
    }

    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
