//! Syntax checks for PEP 440 version specifiers and PEP 508 requirement strings.
//!
//! Only well-formedness is checked; nothing is resolved against an index.

use regex::Regex;
use std::sync::OnceLock;

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?$").expect("valid name regex")
    })
}

fn clause_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(~=|===|==|!=|<=|>=|<|>)\s*(\S+)\s*$").expect("valid clause regex")
    })
}

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^v?(?:\d+!)?(\d+(?:\.\d+)*)(?:[-_.]?(?:a|b|c|rc|alpha|beta|pre|preview)[-_.]?\d*)?(?:[-_.]?(?:post|rev|r)[-_.]?\d*)?(?:[-_.]?dev[-_.]?\d*)?(\+[a-z0-9]+(?:[-_.][a-z0-9]+)*)?$",
        )
        .expect("valid version regex")
    })
}

fn requirement_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z0-9][A-Za-z0-9._-]*)\s*(\[[^\]]*\])?\s*(.*?)\s*$")
            .expect("valid requirement regex")
    })
}

/// Package, extra and group names.
pub fn is_valid_name(name: &str) -> bool {
    name_re().is_match(name)
}

/// A comma-separated specifier set such as `>=3.10, <3.13`.
pub fn validate_specifier_set(input: &str) -> Result<(), String> {
    if input.trim().is_empty() {
        return Err("empty version specifier".to_string());
    }

    for clause in input.split(',') {
        validate_clause(clause)?;
    }
    Ok(())
}

fn validate_clause(clause: &str) -> Result<(), String> {
    if clause.trim().is_empty() {
        return Err("empty clause in version specifier".to_string());
    }

    let caps = clause_re()
        .captures(clause)
        .ok_or_else(|| format!("'{}' is not an operator followed by a version", clause.trim()))?;
    let op = &caps[1];
    let version = &caps[2];

    if op == "===" {
        // Arbitrary equality compares strings verbatim.
        return Ok(());
    }

    if let Some(prefix) = version.strip_suffix(".*") {
        if op != "==" && op != "!=" {
            return Err(format!("wildcard version '{}' is only allowed with == or !=", version));
        }
        if !prefix.split('.').all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())) {
            return Err(format!("'{}' is not a valid wildcard version", version));
        }
        return Ok(());
    }

    let caps = version_re()
        .captures(version)
        .ok_or_else(|| format!("'{}' is not a valid version", version))?;

    if op == "~=" && !caps[1].contains('.') {
        return Err(format!("~= needs at least two release segments, got '{}'", version));
    }

    if caps.get(2).is_some() && op != "==" && op != "!=" {
        return Err(format!(
            "local version '{}' is only allowed with == or !=",
            version
        ));
    }

    Ok(())
}

/// A dependency line such as `kedro[pandas]>=0.19; python_version >= "3.10"`.
pub fn validate_requirement(input: &str) -> Result<(), String> {
    let (requirement, marker) = match input.split_once(';') {
        Some((req, marker)) => (req, Some(marker)),
        None => (input, None),
    };

    if let Some(marker) = marker {
        if marker.trim().is_empty() {
            return Err("empty environment marker after ';'".to_string());
        }
    }

    let caps = requirement_re()
        .captures(requirement)
        .ok_or_else(|| format!("'{}' does not start with a package name", requirement.trim()))?;

    let name = &caps[1];
    if !is_valid_name(name) {
        return Err(format!("'{}' is not a valid package name", name));
    }

    if let Some(extras) = caps.get(2) {
        let inner = extras.as_str().trim_start_matches('[').trim_end_matches(']');
        // `name[]` is an empty extras list.
        if !inner.trim().is_empty() {
            for extra in inner.split(',') {
                let extra = extra.trim();
                if !is_valid_name(extra) {
                    return Err(format!("'{}' is not a valid extra name", extra));
                }
            }
        }
    }

    let rest = caps.get(3).map(|m| m.as_str()).unwrap_or("");
    if rest.is_empty() {
        return Ok(());
    }

    if let Some(url) = rest.strip_prefix('@') {
        let url = url.trim();
        if !url.contains("://") {
            return Err(format!("'{}' is not a URL", url));
        }
        return Ok(());
    }

    let specifiers = match rest.strip_prefix('(') {
        Some(inner) => inner
            .strip_suffix(')')
            .ok_or_else(|| "unbalanced parenthesis in version specifier".to_string())?,
        None => rest,
    };
    validate_specifier_set(specifiers)
}
