//! Strictly sequential execution pipeline
//!
//! A run is an ordered list of steps, `[start server, test 1 .. test n, stop
//! server]`, executed one at a time by a single worker. The first failing
//! step aborts the run and nothing after it executes.

use std::net::SocketAddr;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::HarnessResult;
use crate::params::TestParams;
use crate::runner::TestCase;

/// One unit of work in the pipeline
#[derive(Debug)]
pub enum Step {
    StartServer,
    Run(Box<TestCase>),
    StopServer,
}

impl Step {
    fn describe(&self) -> String {
        match self {
            Step::StartServer => "start fixture server".to_string(),
            Step::Run(case) => format!("run {}", case.params.id()),
            Step::StopServer => "stop fixture server".to_string(),
        }
    }
}

/// Output of a completed step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutput {
    ServerStarted(SocketAddr),
    Tested(TestParams),
    ServerStopped,
}

/// Executes individual steps; the pipeline decides order and when to stop
#[async_trait]
pub trait StepExecutor: Send {
    async fn execute(&mut self, step: Step) -> HarnessResult<StepOutput>;
}

/// Ordered list of steps with concurrency fixed at one
#[derive(Debug, Default)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// `[StartServer, Run.., StopServer]` for the given cases, in order
    pub fn bracketed(cases: impl IntoIterator<Item = TestCase>) -> Self {
        let mut pipeline = Self::new();
        pipeline.push(Step::StartServer);
        for case in cases {
            pipeline.push(Step::Run(Box::new(case)));
        }
        pipeline.push(Step::StopServer);
        pipeline
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Execute every step in order, awaiting each before starting the next.
    ///
    /// Returns the outputs of all steps in order, or the first error.
    pub async fn run<E: StepExecutor>(self, executor: &mut E) -> HarnessResult<Vec<StepOutput>> {
        let total = self.steps.len();
        let mut outputs = Vec::with_capacity(total);

        for (index, step) in self.steps.into_iter().enumerate() {
            let description = step.describe();
            debug!("Step {}/{}: {}", index + 1, total, description);

            match executor.execute(step).await {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    error!(
                        "Step {}/{} ({}) failed, abandoning {} remaining step(s)",
                        index + 1,
                        total,
                        description,
                        total - index - 1
                    );
                    return Err(e);
                }
            }
        }

        Ok(outputs)
    }
}

/// Drop the server sentinels, keeping test results in execution order
pub fn test_results(outputs: Vec<StepOutput>) -> Vec<TestParams> {
    outputs
        .into_iter()
        .filter_map(|output| match output {
            StepOutput::Tested(params) => Some(params),
            StepOutput::ServerStarted(_) | StepOutput::ServerStopped => None,
        })
        .collect()
}
