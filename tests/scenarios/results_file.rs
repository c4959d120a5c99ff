use crate::helpers::*;
use ci_gate::execution::SchedulingStrategy;
use ci_gate::gate::{needs_json, resolve_required, Aggregator, FileSource, ResultSource};
use ci_gate::AggregateOutcome;

const PIPELINE: &str = r#"
name: handoff
jobs:
  - name: test
    matrix:
      toolchain: ["stable", "beta"]
    commands: ["cargo +{{ matrix.toolchain }} test"]
"#;

/// A local run writes a needs context that `check` can decide from later
#[tokio::test]
async fn test_results_written_by_run_decide_the_same_way() {
    let runner = MockRunner::new().failing_on("+beta", 1);
    let result = run_pipeline_with_mock(PIPELINE, runner, SchedulingStrategy::Parallel, None).await;
    assert_gate_failed(&result, "test (beta) failed");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("needs.json");
    let json = serde_json::to_string_pretty(&needs_json(result.results())).unwrap();
    std::fs::write(&path, json).unwrap();

    let loaded = FileSource::new(&path).load().unwrap();
    assert_eq!(loaded.len(), 2);

    let required = resolve_required(None, None, &loaded);
    let decision = Aggregator::new("ci result", required).evaluate(&loaded);
    assert_eq!(decision.outcome(), AggregateOutcome::Fail);
    assert_eq!(decision.findings(), result.decision().findings());
}

#[tokio::test]
async fn test_passing_run_round_trips_to_pass() {
    let result =
        run_pipeline_with_mock(PIPELINE, MockRunner::new(), SchedulingStrategy::Parallel, None)
            .await;
    assert_gate_passed(&result);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("needs.json");
    std::fs::write(&path, needs_json(result.results()).to_string()).unwrap();

    let loaded = FileSource::new(&path).load().unwrap();
    let required = resolve_required(None, None, &loaded);
    let decision = Aggregator::new("ci result", required).evaluate(&loaded);
    assert_eq!(decision.outcome(), AggregateOutcome::Pass);
}
