//! Test case discovery and parameter resolution

use std::path::Path;

use colored::Colorize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::params::{TestParams, Tolerance};

/// Style document file inside each group directory
pub const STYLE_FILE: &str = "style.json";

/// Test declaration file inside each group directory
pub const INFO_FILE: &str = "info.json";

/// A named set of tests sharing one style document
#[derive(Debug, Clone)]
pub struct TestGroup {
    pub name: String,
    pub style: Value,
    /// Raw declarations in file order
    pub tests: Map<String, Value>,
}

impl TestGroup {
    /// Load `style.json` and `info.json` from a group directory
    pub fn load(dir: &Path) -> HarnessResult<Self> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let style = read_json(&dir.join(STYLE_FILE))?;
        let tests = match read_json(&dir.join(INFO_FILE))? {
            Value::Object(tests) => tests,
            other => {
                return Err(HarnessError::GroupLoad {
                    path: dir.join(INFO_FILE),
                    reason: format!("expected an object of tests, found {}", kind(&other)),
                })
            }
        };

        Ok(Self { name, style, tests })
    }
}

fn read_json(path: &Path) -> HarnessResult<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| HarnessError::GroupLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| HarnessError::GroupLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Whether a root entry is reserved rather than a test group
pub fn is_reserved(name: &str, config: &HarnessConfig) -> bool {
    name == config.index || name == config.template || name.starts_with('.')
}

/// Discover test groups under `config.root`, sorted by name.
pub fn discover_groups(config: &HarnessConfig) -> HarnessResult<Vec<TestGroup>> {
    let mut groups = Vec::new();

    for entry in walkdir::WalkDir::new(&config.root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| HarnessError::GroupLoad {
            path: config.root.clone(),
            reason: e.to_string(),
        })?;
        let name = entry.file_name().to_string_lossy();

        if is_reserved(&name, config) {
            continue;
        }
        if !config.selects(&name) {
            debug!("Group '{}' not selected", name);
            continue;
        }
        if !entry.file_type().is_dir() {
            warn!("Ignoring stray entry {}", entry.path().display());
            continue;
        }

        groups.push(TestGroup::load(entry.path())?);
    }

    Ok(groups)
}

/// What to do with one declared test
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Run(TestParams),
    /// The declaration opts the active implementation out
    Skip,
}

/// Merge a raw declaration over the defaults and resolve per-implementation fields.
pub fn resolve_params(
    group: &str,
    test: &str,
    raw: &Value,
    implementation: &str,
) -> HarnessResult<Resolution> {
    let invalid = |reason: String| HarnessError::InvalidTest {
        group: group.to_string(),
        test: test.to_string(),
        reason,
    };

    let declared = raw
        .as_object()
        .ok_or_else(|| invalid(format!("expected an object, found {}", kind(raw))))?;

    if declared.get(implementation) == Some(&Value::Bool(false)) {
        return Ok(Resolution::Skip);
    }

    let mut merged = TestParams::defaults(group, test);
    for (key, value) in declared {
        merged.insert(key.clone(), value.clone());
    }
    merged.insert(
        "ignored".to_string(),
        Value::Bool(resolve_ignored(declared.get("ignored"), implementation, group, test)),
    );

    let mut params: TestParams =
        serde_json::from_value(Value::Object(merged)).map_err(|e| invalid(e.to_string()))?;

    if let Some(allowed) = params.diff.as_ref().and_then(|d| d.resolve(implementation)) {
        params.allowed = allowed;
    }

    Ok(Resolution::Run(params))
}

/// `ignored` is an allow-list of implementation names: an object keyed by
/// name (values are free-form reasons) or an array of names. Any other value
/// ignores nothing.
fn resolve_ignored(raw: Option<&Value>, implementation: &str, group: &str, test: &str) -> bool {
    match raw {
        None | Some(Value::Null) => false,
        Some(Value::Object(map)) => map.contains_key(implementation),
        Some(Value::Array(names)) => names.iter().any(|n| n.as_str() == Some(implementation)),
        Some(other) => {
            warn!(
                "{} {}: 'ignored' must name implementations, {} has no effect",
                group, test, other
            );
            false
        }
    }
}

pub(crate) fn skipped_line(group: &str, test: &str) -> String {
    format!("* skipped {} {}", group, test)
}

/// Resolve every test of a group, logging the ones skipped for this implementation.
pub fn resolve_group(group: &TestGroup, implementation: &str) -> HarnessResult<Vec<TestParams>> {
    let mut resolved = Vec::with_capacity(group.tests.len());

    for (test, raw) in &group.tests {
        match resolve_params(&group.name, test, raw, implementation)? {
            Resolution::Run(params) => resolved.push(params),
            Resolution::Skip => println!("{}", skipped_line(&group.name, test).bright_black()),
        }
    }

    Ok(resolved)
}
