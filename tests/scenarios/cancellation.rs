use crate::helpers::*;
use ci_gate::core::config::PipelineConfig;
use ci_gate::core::JobOutcome;
use ci_gate::execution::{ExecutionEngine, RunReport, SchedulingStrategy};
use ci_gate::gate::{AggregateOutcome, Finding};
use std::time::Duration;

const SLOW: &str = r#"
name: slow
jobs:
  - name: test
    matrix:
      shard: [1, 2, 3, 4]
    commands: ["cargo test --shard {{ matrix.shard }}"]
"#;

#[tokio::test(start_paused = true)]
async fn test_cancelled_run_fails_closed() {
    let pipeline = PipelineConfig::from_yaml(SLOW).unwrap().to_pipeline().unwrap();
    let runner = MockRunner::new().with_delay(Duration::from_secs(60));
    let engine = ExecutionEngine::new(runner, SchedulingStrategy::LimitedParallel(2));

    let cancel = engine.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
    });

    let report = engine.execute(&pipeline, None).await;
    let RunReport::Completed { results, decision } = report else {
        panic!("run should complete");
    };

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| r.outcome == JobOutcome::Cancelled));
    assert_eq!(decision.outcome(), AggregateOutcome::Fail);
    assert!(decision.summary().starts_with("prerequisite incomplete"));
    assert!(decision
        .findings()
        .iter()
        .all(|f| matches!(f, Finding::Cancelled { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_some_legs_finish() {
    let yaml = r#"
name: mixed
jobs:
  - name: lint
    commands: ["cargo fmt --check"]
  - name: test
    commands: ["cargo test"]
"#;
    let pipeline = PipelineConfig::from_yaml(yaml).unwrap().to_pipeline().unwrap();
    let runner = MockRunner::new().with_delay(Duration::from_secs(10));
    let engine = ExecutionEngine::new(runner, SchedulingStrategy::Sequential);

    let cancel = engine.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(15)).await;
        cancel.cancel();
    });

    let report = engine.execute(&pipeline, None).await;
    assert_eq!(report.exit_code(), 1);

    let RunReport::Completed { results, decision } = report else {
        panic!("run should complete");
    };
    assert_eq!(results[0].outcome, JobOutcome::Success);
    assert_eq!(results[1].outcome, JobOutcome::Cancelled);
    assert_eq!(
        decision.findings(),
        &[Finding::Cancelled {
            job: "test".to_string()
        }]
    );
}
