//! Test parameters and result classification

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Resolved configuration for one test case.
///
/// Field names follow the `info.json` declarations (`pixelRatio`), so the
/// same shape is handed to renderers and to the report template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestParams {
    pub group: String,
    pub test: String,
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
    pub zoom: f64,
    pub bearing: f64,
    pub classes: Vec<String>,
    pub center: [f64; 2],

    /// Tolerance after resolving `diff` for the active implementation
    pub allowed: f64,

    /// Raw tolerance declaration, kept for the report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<Tolerance>,

    #[serde(default)]
    pub ignored: bool,

    /// Set by the runner once the render completes (or times out)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difference: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,

    /// Any other declared field, passed through to the renderer untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TestParams {
    /// Defaults every declaration is merged over
    pub fn defaults(group: &str, test: &str) -> Map<String, Value> {
        serde_json::json!({
            "group": group,
            "test": test,
            "width": 512,
            "height": 512,
            "pixelRatio": 1,
            "zoom": 0,
            "bearing": 0,
            "classes": [],
            "center": [0, 0],
            "allowed": 0.001,
        })
        .as_object()
        .cloned()
        .unwrap_or_default()
    }

    pub fn id(&self) -> String {
        format!("{} {}", self.group, self.test)
    }

    pub fn passed(&self) -> bool {
        self.ok.unwrap_or(false)
    }

    pub fn bucket(&self) -> Bucket {
        Bucket::classify(self.passed(), self.ignored)
    }
}

/// A `diff` declaration: one tolerance for everyone, or one per implementation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tolerance {
    Uniform(f64),
    PerImplementation(BTreeMap<String, f64>),
}

impl Tolerance {
    /// Tolerance for `implementation`, if this declaration names one
    pub fn resolve(&self, implementation: &str) -> Option<f64> {
        match self {
            Tolerance::Uniform(value) => Some(*value),
            Tolerance::PerImplementation(map) => map.get(implementation).copied(),
        }
    }
}

/// Display color attached to each classified result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Yellow,
    Red,
    Green,
}

/// The four outcome buckets. Every executed test lands in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Ignored and failed
    Ignored,
    /// Ignored but passed anyway
    IgnoredPassed,
    Failed,
    Passed,
}

impl Bucket {
    pub fn classify(ok: bool, ignored: bool) -> Self {
        match (ignored, ok) {
            (true, false) => Bucket::Ignored,
            (true, true) => Bucket::IgnoredPassed,
            (false, false) => Bucket::Failed,
            (false, true) => Bucket::Passed,
        }
    }

    pub fn color(self) -> Color {
        match self {
            Bucket::Ignored => Color::White,
            Bucket::IgnoredPassed => Color::Yellow,
            Bucket::Failed => Color::Red,
            Bucket::Passed => Color::Green,
        }
    }

    /// Verb used in the per-test status line
    pub fn status(self) -> &'static str {
        match self {
            Bucket::Ignored | Bucket::IgnoredPassed => "ignore",
            Bucket::Failed => "failed",
            Bucket::Passed => "passed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(false, true => Bucket::Ignored)]
    #[test_case(true, true => Bucket::IgnoredPassed)]
    #[test_case(false, false => Bucket::Failed)]
    #[test_case(true, false => Bucket::Passed)]
    fn test_classify(ok: bool, ignored: bool) -> Bucket {
        Bucket::classify(ok, ignored)
    }

    #[test_case(Bucket::Ignored => Color::White)]
    #[test_case(Bucket::IgnoredPassed => Color::Yellow)]
    #[test_case(Bucket::Failed => Color::Red)]
    #[test_case(Bucket::Passed => Color::Green)]
    fn test_bucket_color(bucket: Bucket) -> Color {
        bucket.color()
    }

    #[test]
    fn test_tolerance_resolution() {
        let uniform: Tolerance = serde_json::from_value(serde_json::json!(0.05)).unwrap();
        assert_eq!(uniform.resolve("refimpl"), Some(0.05));
        assert_eq!(uniform.resolve("other"), Some(0.05));

        let per: Tolerance =
            serde_json::from_value(serde_json::json!({ "refimpl": 0.02 })).unwrap();
        assert_eq!(per.resolve("refimpl"), Some(0.02));
        assert_eq!(per.resolve("other"), None);
    }

    #[test]
    fn test_unrun_test_counts_as_failed() {
        let mut map = TestParams::defaults("g", "t");
        map.insert("ignored".into(), Value::Bool(false));
        let params: TestParams = serde_json::from_value(Value::Object(map)).unwrap();
        assert_eq!(params.ok, None);
        assert_eq!(params.bucket(), Bucket::Failed);
        assert!(params.extra.is_empty());
    }

    #[test]
    fn test_color_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Color::Green).unwrap(), "green");
    }
}
