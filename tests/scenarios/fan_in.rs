use crate::helpers::*;
use ci_gate::core::JobOutcome;
use ci_gate::execution::{ExecutionEvent, SchedulingStrategy};
use ci_gate::gate::Finding;

const TWO_JOBS: &str = r#"
name: two-jobs
jobs:
  - name: build
    commands: ["cargo build"]
  - name: test
    commands: ["cargo test"]
"#;

#[tokio::test]
async fn test_all_prerequisites_succeed() {
    let result =
        run_pipeline_with_mock(TWO_JOBS, MockRunner::new(), SchedulingStrategy::Parallel, None).await;

    assert_gate_passed(&result);
    assert_job_outcome(&result, "build", JobOutcome::Success);
    assert_job_outcome(&result, "test", JobOutcome::Success);
    assert_eq!(result.decision().required(), 2);
}

#[tokio::test]
async fn test_one_failure_fails_gate() {
    let runner = MockRunner::new().failing_on("cargo test", 101);
    let result = run_pipeline_with_mock(TWO_JOBS, runner, SchedulingStrategy::Parallel, None).await;

    assert_gate_failed(&result, "prerequisite failure");
    assert_job_outcome(&result, "build", JobOutcome::Success);
    assert_job_outcome(&result, "test", JobOutcome::Failure);

    let findings = result.decision().findings();
    assert_eq!(findings.len(), 1);
    assert!(matches!(&findings[0], Finding::Failed { job, .. } if job == "test"));
}

#[tokio::test]
async fn test_failure_stops_remaining_commands() {
    let yaml = r#"
name: steps
jobs:
  - name: check
    commands:
      - cargo fmt --check
      - cargo clippy
      - cargo test
"#;
    let runner = MockRunner::new().failing_on("clippy", 1);
    let result = run_pipeline_with_mock(yaml, runner.clone(), SchedulingStrategy::Sequential, None).await;

    assert_gate_failed(&result, "check failed");
    assert_eq!(runner.calls(), vec!["cargo fmt --check", "cargo clippy"]);
}

#[tokio::test]
async fn test_non_required_job_does_not_block_gate() {
    let yaml = r#"
name: partial
jobs:
  - name: build
    commands: ["cargo build"]
  - name: bench
    commands: ["cargo bench"]
gate:
  needs: ["build"]
"#;
    let runner = MockRunner::new().failing_on("bench", 1);
    let result = run_pipeline_with_mock(yaml, runner, SchedulingStrategy::Parallel, None).await;

    assert_job_outcome(&result, "bench", JobOutcome::Failure);
    assert_gate_passed(&result);
    assert_eq!(result.decision().required(), 1);
}

#[tokio::test]
async fn test_gate_decided_exactly_once_after_every_job() {
    let result =
        run_pipeline_with_mock(TWO_JOBS, MockRunner::new(), SchedulingStrategy::Parallel, None).await;

    let decided: Vec<usize> = result
        .events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, ExecutionEvent::GateDecided { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(decided.len(), 1);

    let last_finished = result
        .events
        .iter()
        .rposition(|e| matches!(e, ExecutionEvent::JobFinished { .. }))
        .unwrap();
    assert!(decided[0] > last_finished);

    match result.events.last() {
        Some(ExecutionEvent::GateDecided { gate_name, .. }) => assert_eq!(gate_name, "ci result"),
        other => panic!("expected GateDecided last, got {:?}", other),
    }
}

#[tokio::test]
async fn test_results_keep_declaration_order() {
    let yaml = r#"
name: ordered
jobs:
  - name: a
    commands: ["echo a"]
  - name: b
    commands: ["echo b"]
  - name: c
    commands: ["echo c"]
"#;
    let result = run_pipeline_with_mock(
        yaml,
        MockRunner::new(),
        SchedulingStrategy::LimitedParallel(2),
        None,
    )
    .await;

    let names: Vec<&str> = result.results().iter().map(|r| r.job.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_gate_passed(&result);
}
