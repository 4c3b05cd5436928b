//! Runs one test case against the renderer under a watchdog

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{HarnessError, HarnessResult, RenderError};
use crate::params::{Bucket, Color, TestParams};

/// What a renderer reports after drawing and comparing one test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderOutcome {
    /// Whether the output matched the reference within `allowed`
    pub ok: bool,

    /// Measured difference, when the comparison produces one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difference: Option<f64>,
}

/// The rendering implementation under test.
///
/// A render is never cancelled by the harness: when the watchdog fires the
/// call keeps running in the background and its result is discarded.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        style: Arc<Value>,
        params: TestParams,
    ) -> Result<RenderOutcome, RenderError>;
}

/// A test ready to run: its group's localized style plus resolved params
#[derive(Debug, Clone)]
pub struct TestCase {
    pub style: Arc<Value>,
    pub params: TestParams,
}

/// Invokes the renderer for single test cases and classifies the outcome
#[derive(Clone)]
pub struct TestRunner {
    renderer: Arc<dyn Renderer>,
    watchdog: Duration,
}

impl TestRunner {
    pub const DEFAULT_WATCHDOG: Duration = Duration::from_secs(20);

    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            watchdog: Self::DEFAULT_WATCHDOG,
        }
    }

    pub fn with_watchdog(mut self, watchdog: Duration) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// Run one test and return its classified params.
    ///
    /// Render errors and timeouts become failed results. Only a render task
    /// that panics is reported as an error.
    pub async fn run_one(&self, case: TestCase) -> HarnessResult<TestParams> {
        let TestCase { style, mut params } = case;
        let start = Instant::now();
        debug!("Rendering {}", params.id());

        let renderer = Arc::clone(&self.renderer);
        let task_params = params.clone();
        let task = tokio::spawn(async move { renderer.render(style, task_params).await });

        // First of {watchdog, render} wins. On timeout the join handle is
        // dropped, which detaches the task and discards its late result.
        let outcome = match tokio::time::timeout(self.watchdog, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => {
                return Err(HarnessError::RenderCrashed {
                    group: params.group,
                    test: params.test,
                    reason: join.to_string(),
                })
            }
            Err(_) => Err(RenderError::TimedOut(self.watchdog)),
        };

        match outcome {
            Ok(outcome) => {
                params.ok = Some(outcome.ok);
                params.difference = outcome.difference;
                params.error = None;
            }
            Err(e) => {
                params.ok = Some(false);
                params.error = Some(e.to_string());
            }
        }

        let bucket = classify(&mut params);
        debug!(
            "{} finished as {:?} in {} ms",
            params.id(),
            bucket,
            start.elapsed().as_millis()
        );
        println!("{}", status_line(&params, bucket));

        Ok(params)
    }
}

/// Assign the display color for a finished test and return its bucket
pub fn classify(params: &mut TestParams) -> Bucket {
    let bucket = params.bucket();
    params.color = Some(bucket.color());
    bucket
}

fn status_line(params: &TestParams, bucket: Bucket) -> String {
    paint(&status_text(params, bucket), bucket.color())
}

/// Uncolored `* <status> <group> <test>` line, with any error appended
pub(crate) fn status_text(params: &TestParams, bucket: Bucket) -> String {
    let mut line = format!("* {} {}", bucket.status(), params.id());
    if let Some(error) = &params.error {
        line.push_str(&format!(" ({})", error));
    }
    line
}

pub(crate) fn paint(text: &str, color: Color) -> String {
    match color {
        Color::White => text.white(),
        Color::Yellow => text.yellow(),
        Color::Red => text.red(),
        Color::Green => text.green(),
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use test_case::test_case;

    use crate::loader::{resolve_params, Resolution};

    fn params(ignored: bool) -> TestParams {
        let raw = if ignored {
            serde_json::json!({ "ignored": { "mock": "flaky" } })
        } else {
            serde_json::json!({})
        };
        match resolve_params("group", "test", &raw, "mock").unwrap() {
            Resolution::Run(params) => params,
            Resolution::Skip => unreachable!(),
        }
    }

    fn case(ignored: bool) -> TestCase {
        TestCase {
            style: Arc::new(serde_json::json!({ "version": 8 })),
            params: params(ignored),
        }
    }

    struct Fixed(Result<bool, &'static str>);

    #[async_trait]
    impl Renderer for Fixed {
        async fn render(
            &self,
            _style: Arc<Value>,
            _params: TestParams,
        ) -> Result<RenderOutcome, RenderError> {
            match self.0 {
                Ok(ok) => Ok(RenderOutcome {
                    ok,
                    difference: Some(0.0),
                }),
                Err(msg) => Err(RenderError::Failed(msg.to_string())),
            }
        }
    }

    /// Finishes well after the watchdog and records that it did
    struct Slow {
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Renderer for Slow {
        async fn render(
            &self,
            _style: Arc<Value>,
            _params: TestParams,
        ) -> Result<RenderOutcome, RenderError> {
            tokio::time::sleep(Duration::from_millis(150)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(RenderOutcome {
                ok: true,
                difference: None,
            })
        }
    }

    struct Panics;

    #[async_trait]
    impl Renderer for Panics {
        async fn render(
            &self,
            _style: Arc<Value>,
            _params: TestParams,
        ) -> Result<RenderOutcome, RenderError> {
            panic!("renderer blew up")
        }
    }

    #[tokio::test]
    async fn test_passing_render_is_green() {
        let runner = TestRunner::new(Arc::new(Fixed(Ok(true))));
        let result = runner.run_one(case(false)).await.unwrap();
        assert_eq!(result.ok, Some(true));
        assert_eq!(result.color, Some(Color::Green));
        assert_eq!(result.difference, Some(0.0));
    }

    #[tokio::test]
    async fn test_ignored_outcomes() {
        let runner = TestRunner::new(Arc::new(Fixed(Ok(false))));
        let result = runner.run_one(case(true)).await.unwrap();
        assert_eq!(result.color, Some(Color::White));

        let runner = TestRunner::new(Arc::new(Fixed(Ok(true))));
        let result = runner.run_one(case(true)).await.unwrap();
        assert_eq!(result.color, Some(Color::Yellow));
    }

    #[tokio::test]
    async fn test_render_error_is_a_failure() {
        let runner = TestRunner::new(Arc::new(Fixed(Err("no GL context"))));
        let result = runner.run_one(case(false)).await.unwrap();
        assert_eq!(result.ok, Some(false));
        assert_eq!(result.color, Some(Color::Red));
        assert_eq!(result.error.as_deref(), Some("render failed: no GL context"));
    }

    #[tokio::test]
    async fn test_watchdog_fails_test_once() {
        let finished = Arc::new(AtomicBool::new(false));
        let runner = TestRunner::new(Arc::new(Slow {
            finished: Arc::clone(&finished),
        }))
        .with_watchdog(Duration::from_millis(20));

        let result = runner.run_one(case(false)).await.unwrap();
        assert_eq!(result.ok, Some(false));
        assert_eq!(result.color, Some(Color::Red));
        assert!(result.error.as_deref().unwrap().starts_with("timed out after"));
        assert!(!finished.load(Ordering::SeqCst));

        // The render keeps going in the background; its success changes nothing
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(result.ok, Some(false));
        assert_eq!(result.color, Some(Color::Red));
    }

    #[tokio::test]
    async fn test_timeout_matches_render_error_classification() {
        let timed_out = TestRunner::new(Arc::new(Slow {
            finished: Arc::new(AtomicBool::new(false)),
        }))
        .with_watchdog(Duration::from_millis(10))
        .run_one(case(true))
        .await
        .unwrap();
        let errored = TestRunner::new(Arc::new(Fixed(Err("boom"))))
            .run_one(case(true))
            .await
            .unwrap();

        assert_eq!(timed_out.bucket(), errored.bucket());
        assert_eq!(timed_out.color, errored.color);
    }

    #[tokio::test]
    async fn test_passing_render_drops_declared_error_text() {
        let raw = serde_json::json!({ "error": "stale text from info.json" });
        let Resolution::Run(params) = resolve_params("group", "test", &raw, "mock").unwrap() else {
            unreachable!()
        };
        assert!(params.error.is_some());

        let runner = TestRunner::new(Arc::new(Fixed(Ok(true))));
        let result = runner
            .run_one(TestCase {
                style: Arc::new(serde_json::json!({})),
                params,
            })
            .await
            .unwrap();

        assert_eq!(result.error, None);
        assert_eq!(
            status_text(&result, result.bucket()),
            "* passed group test"
        );
    }

    #[test_case(Some(true), false, None => "* passed group test")]
    #[test_case(Some(false), false, None => "* failed group test")]
    #[test_case(Some(false), true, None => "* ignore group test")]
    #[test_case(Some(true), true, None => "* ignore group test")]
    #[test_case(Some(false), false, Some("timed out after 20 seconds") => "* failed group test (timed out after 20 seconds)")]
    fn test_status_text(ok: Option<bool>, ignored: bool, error: Option<&str>) -> String {
        let mut params = params(ignored);
        params.ok = ok;
        params.error = error.map(str::to_string);
        let bucket = classify(&mut params);
        status_text(&params, bucket)
    }

    #[tokio::test]
    async fn test_panicking_renderer_is_fatal() {
        let runner = TestRunner::new(Arc::new(Panics));
        let err = runner.run_one(case(false)).await.unwrap_err();
        assert!(matches!(err, HarnessError::RenderCrashed { .. }));
    }
}
