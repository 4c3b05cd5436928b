//! Result aggregation, console summary and HTML report

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde_json::json;
use tracing::info;

use crate::error::{HarnessError, HarnessResult};
use crate::params::{Bucket, TestParams};
use crate::runner::paint;

/// Counts per outcome bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub passed: usize,
    pub ignored_passed: usize,
    pub ignored: usize,
    pub failed: usize,
}

impl Tally {
    pub fn from_results(results: &[TestParams]) -> Self {
        let mut tally = Self::default();
        for params in results {
            tally.record(params.bucket());
        }
        tally
    }

    pub fn record(&mut self, bucket: Bucket) {
        match bucket {
            Bucket::Ignored => self.ignored += 1,
            Bucket::IgnoredPassed => self.ignored_passed += 1,
            Bucket::Failed => self.failed += 1,
            Bucket::Passed => self.passed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.ignored_passed + self.ignored + self.failed
    }

    /// One line per non-empty bucket, in display order
    pub fn summary(&self) -> Vec<(Bucket, String)> {
        let total = self.total();
        [
            (Bucket::Passed, self.passed, "passed"),
            (Bucket::IgnoredPassed, self.ignored_passed, "passed but were ignored"),
            (Bucket::Ignored, self.ignored, "ignored"),
            (Bucket::Failed, self.failed, "failed"),
        ]
        .into_iter()
        .filter(|(_, count, _)| *count > 0)
        .map(|(bucket, count, label)| {
            let percent = 100.0 * count as f64 / total as f64;
            (bucket, format!("{} {} ({:.1}%)", count, label, percent))
        })
        .collect()
    }

    pub fn print_summary(&self) {
        for (bucket, line) in self.summary() {
            println!("{}", paint(&line, bucket.color()));
        }
    }
}

/// Renders the result list into an HTML document
pub trait ReportTemplate {
    fn render(&self, results: &[TestParams]) -> HarnessResult<String>;
}

/// Handlebars template bound to a single `results` variable
pub struct HandlebarsTemplate {
    registry: Handlebars<'static>,
}

impl HandlebarsTemplate {
    const NAME: &'static str = "results";

    pub fn from_source(source: &str) -> HarnessResult<Self> {
        let mut registry = Handlebars::new();
        registry
            .register_template_string(Self::NAME, source)
            .map_err(|e| HarnessError::Template(e.to_string()))?;
        Ok(Self { registry })
    }

    pub fn load(path: &Path) -> HarnessResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::Template(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_source(&source)
    }
}

impl ReportTemplate for HandlebarsTemplate {
    fn render(&self, results: &[TestParams]) -> HarnessResult<String> {
        self.registry
            .render(Self::NAME, &json!({ "results": results }))
            .map_err(|e| HarnessError::Template(e.to_string()))
    }
}

/// How a completed run ends
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Update mode: references were rewritten, nothing was judged
    Updated(usize),
    Reported { tally: Tally, path: PathBuf },
}

impl Verdict {
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Updated(_) => 0,
            Verdict::Reported { tally, .. } if tally.failed == 0 => 0,
            Verdict::Reported { .. } => 1,
        }
    }
}

/// Print the update count; no report is written in update mode.
pub fn updated(results: &[TestParams]) -> Verdict {
    println!("Updated {} tests.", results.len());
    Verdict::Updated(results.len())
}

/// Tally, print the summary, and write the HTML report to `index`.
pub fn write_report(
    results: &[TestParams],
    template: &dyn ReportTemplate,
    index: &Path,
) -> HarnessResult<Verdict> {
    let tally = Tally::from_results(results);
    tally.print_summary();

    let html = template.render(results)?;
    std::fs::write(index, html)?;
    info!("Wrote report for {} test(s)", results.len());
    println!("Results at: {}", index.display());

    Ok(Verdict::Reported {
        tally,
        path: index.to_path_buf(),
    })
}
