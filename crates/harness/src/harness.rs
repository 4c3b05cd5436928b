//! Top-level run: discover, execute sequentially, aggregate

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::HarnessConfig;
use crate::error::HarnessResult;
use crate::loader::{discover_groups, resolve_group};
use crate::params::TestParams;
use crate::queue::{test_results, Pipeline, Step, StepExecutor, StepOutput};
use crate::report::{self, HandlebarsTemplate, ReportTemplate, Verdict};
use crate::runner::{Renderer, TestCase, TestRunner};
use crate::server::{localize_urls, FixtureServer};

/// Drives a renderer through the whole test corpus
pub struct Harness {
    config: HarnessConfig,
    runner: TestRunner,
}

impl Harness {
    /// Fails when the configured watchdog is not a usable duration.
    pub fn new(config: HarnessConfig, renderer: Arc<dyn Renderer>) -> HarnessResult<Self> {
        let runner = TestRunner::new(renderer).with_watchdog(config.watchdog()?);
        Ok(Self { config, runner })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Load every selected test, each paired with its group's localized style.
    pub fn discover(&self) -> HarnessResult<Vec<TestCase>> {
        let base_url = self.config.fixture.base_url();
        let mut cases = Vec::new();

        for group in discover_groups(&self.config)? {
            let style = Arc::new(localize_urls(&group.style, &base_url));
            for params in resolve_group(&group, &self.config.implementation)? {
                cases.push(TestCase {
                    style: Arc::clone(&style),
                    params,
                });
            }
        }

        info!(
            "Discovered {} test(s) for implementation '{}'",
            cases.len(),
            self.config.implementation
        );
        Ok(cases)
    }

    /// Run all discovered tests between server start and stop.
    ///
    /// Results are in discovery order. Any orchestration failure aborts.
    pub async fn execute(&self) -> HarnessResult<Vec<TestParams>> {
        let cases = self.discover()?;
        let mut executor = Executor {
            server: FixtureServer::new(self.config.fixture.clone()),
            runner: self.runner.clone(),
        };
        let outputs = Pipeline::bracketed(cases).run(&mut executor).await?;
        Ok(test_results(outputs))
    }

    /// Execute, then report using the corpus' own `results.html.tmpl`.
    pub async fn run(&self) -> HarnessResult<Verdict> {
        let results = self.execute().await?;
        if self.config.update {
            return Ok(report::updated(&results));
        }
        let template = HandlebarsTemplate::load(&self.config.template_path())?;
        self.finish(&results, &template)
    }

    /// Aggregate results with an explicit template
    pub fn finish(
        &self,
        results: &[TestParams],
        template: &dyn ReportTemplate,
    ) -> HarnessResult<Verdict> {
        if self.config.update {
            return Ok(report::updated(results));
        }
        report::write_report(results, template, &self.config.index_path())
    }
}

struct Executor {
    server: FixtureServer,
    runner: TestRunner,
}

#[async_trait]
impl StepExecutor for Executor {
    async fn execute(&mut self, step: Step) -> HarnessResult<StepOutput> {
        match step {
            Step::StartServer => Ok(StepOutput::ServerStarted(self.server.start().await?)),
            Step::Run(case) => Ok(StepOutput::Tested(self.runner.run_one(*case).await?)),
            Step::StopServer => {
                self.server.stop().await?;
                Ok(StepOutput::ServerStopped)
            }
        }
    }
}
