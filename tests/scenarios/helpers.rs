//! Test utility functions for ci-gate scenarios

use async_trait::async_trait;
use ci_gate::core::config::PipelineConfig;
use ci_gate::core::{ExecutionContext, JobOutcome, JobResult};
use ci_gate::execution::{
    CommandOutput, CommandRunner, ExecutionEngine, ExecutionEvent, RunReport, RunnerError,
    SchedulingStrategy,
};
use ci_gate::gate::{AggregateOutcome, Decision};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock runner: commands containing a scripted substring exit with its code,
/// everything else succeeds
#[derive(Clone, Default)]
pub struct MockRunner {
    exit_codes: Arc<Vec<(String, i32)>>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any command containing `needle` with `exit_code`
    pub fn failing_on(mut self, needle: &str, exit_code: i32) -> Self {
        let mut codes = (*self.exit_codes).clone();
        codes.push((needle.to_string(), exit_code));
        self.exit_codes = Arc::new(codes);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every command the runner was asked to run
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of commands running at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, command: &str, _context: &ExecutionContext) -> Result<CommandOutput, RunnerError> {
        self.calls.lock().unwrap().push(command.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let exit_code = self
            .exit_codes
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, code)| *code)
            .unwrap_or(0);

        Ok(CommandOutput {
            exit_code,
            stdout: String::new(),
            stderr: if exit_code == 0 {
                String::new()
            } else {
                format!("error: `{}` failed", command)
            },
        })
    }
}

/// Test result from running a pipeline
#[derive(Debug, Clone)]
pub struct RunTestResult {
    pub report: RunReport,
    pub events: Vec<ExecutionEvent>,
}

impl RunTestResult {
    pub fn results(&self) -> &[JobResult] {
        match &self.report {
            RunReport::Completed { results, .. } => results,
            RunReport::Skipped { .. } => &[],
        }
    }

    pub fn decision(&self) -> &Decision {
        match &self.report {
            RunReport::Completed { decision, .. } => decision,
            RunReport::Skipped { marker } => panic!("run was skipped by marker '{}'", marker),
        }
    }

    pub fn outcome_of(&self, job: &str) -> Option<JobOutcome> {
        self.results().iter().find(|r| r.job == job).map(|r| r.outcome)
    }

    pub fn count(&self, outcome: JobOutcome) -> usize {
        self.results().iter().filter(|r| r.outcome == outcome).count()
    }
}

/// Run a pipeline definition with a mock runner
pub async fn run_pipeline_with_mock(
    yaml: &str,
    runner: MockRunner,
    strategy: SchedulingStrategy,
    commit_message: Option<&str>,
) -> RunTestResult {
    let config = PipelineConfig::from_yaml(yaml).expect("pipeline should parse");
    let pipeline = config.to_pipeline().expect("pipeline should expand");

    let mut engine = ExecutionEngine::new(runner, strategy);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let report = engine.execute(&pipeline, commit_message).await;
    let events = events.lock().unwrap().clone();

    RunTestResult { report, events }
}

/// Assert the gate passed
pub fn assert_gate_passed(result: &RunTestResult) {
    assert_eq!(
        result.decision().outcome(),
        AggregateOutcome::Pass,
        "gate should pass, but: {}",
        result.decision().summary()
    );
    assert_eq!(result.report.exit_code(), 0);
}

/// Assert the gate failed and its summary mentions `expected`
pub fn assert_gate_failed(result: &RunTestResult, expected: &str) {
    let decision = result.decision();
    assert_eq!(decision.outcome(), AggregateOutcome::Fail, "gate should fail");
    assert_eq!(result.report.exit_code(), 1);
    assert!(
        decision.summary().contains(expected),
        "gate summary:\n{}\n\ndoes not contain:\n{}",
        decision.summary(),
        expected
    );
}

/// Assert a job reached a specific outcome
pub fn assert_job_outcome(result: &RunTestResult, job: &str, expected: JobOutcome) {
    match result.outcome_of(job) {
        Some(outcome) => assert_eq!(
            outcome, expected,
            "job '{}' should be {}, was {}",
            job, expected, outcome
        ),
        None => panic!("job '{}' not found in results: {:?}", job, result.results()),
    }
}
