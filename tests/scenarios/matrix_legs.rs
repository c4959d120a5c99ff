use crate::helpers::*;
use ci_gate::core::JobOutcome;
use ci_gate::execution::SchedulingStrategy;
use std::time::Duration;

const GEOCODING: &str = r#"
name: geocoding
jobs:
  - name: test
    image: "{{ matrix.image }}"
    matrix:
      image: ["georust/geo-ci:latest", "rust:latest"]
      features: { powerset: ["async", "blocking", "rustls-tls"] }
    commands:
      - cargo build --no-default-features --features "{{ matrix.features }}"
      - cargo test --no-default-features --features "{{ matrix.features }}"
"#;

#[tokio::test]
async fn test_every_leg_succeeds() {
    let result =
        run_pipeline_with_mock(GEOCODING, MockRunner::new(), SchedulingStrategy::Parallel, None)
            .await;

    assert_eq!(result.results().len(), 16);
    assert_eq!(result.count(JobOutcome::Success), 16);
    assert_gate_passed(&result);
    assert_eq!(result.decision().required(), 16);
}

#[tokio::test]
async fn test_single_failing_leg_fails_gate() {
    // Only the rustls-tls-only leg passes exactly this feature string
    let runner = MockRunner::new().failing_on("--features \"rustls-tls\"", 101);
    let result = run_pipeline_with_mock(GEOCODING, runner, SchedulingStrategy::Parallel, None).await;

    assert_eq!(result.count(JobOutcome::Failure), 2);
    assert_eq!(result.count(JobOutcome::Success), 14);
    assert_job_outcome(&result, "test (rust:latest, rustls-tls)", JobOutcome::Failure);
    assert_job_outcome(&result, "test (rust:latest, async,rustls-tls)", JobOutcome::Success);
    assert_gate_failed(&result, "test (georust/geo-ci:latest, rustls-tls) failed");
}

#[tokio::test]
async fn test_legs_render_their_own_commands() {
    let runner = MockRunner::new();
    let result =
        run_pipeline_with_mock(GEOCODING, runner.clone(), SchedulingStrategy::Sequential, None).await;

    assert_gate_passed(&result);
    let calls = runner.calls();
    assert_eq!(calls.len(), 32);
    assert!(calls.iter().all(|c| !c.contains("{{")));
    assert!(calls.contains(&"cargo test --no-default-features --features \"\"".to_string()));
    assert!(calls.contains(
        &"cargo test --no-default-features --features \"async,blocking,rustls-tls\"".to_string()
    ));
}

#[tokio::test]
async fn test_excluded_leg_is_not_required() {
    let yaml = r#"
name: excluded
jobs:
  - name: test
    matrix:
      os: ["linux", "macos"]
      toolchain: ["stable", "nightly"]
      exclude:
        - os: macos
          toolchain: nightly
    commands: ["cargo +{{ matrix.toolchain }} test"]
"#;
    let result =
        run_pipeline_with_mock(yaml, MockRunner::new(), SchedulingStrategy::Parallel, None).await;

    assert_eq!(result.results().len(), 3);
    assert!(result.outcome_of("test (macos, nightly)").is_none());
    assert_gate_passed(&result);
}

#[tokio::test(start_paused = true)]
async fn test_limited_parallelism_caps_concurrent_legs() {
    let runner = MockRunner::new().with_delay(Duration::from_secs(1));
    let result = run_pipeline_with_mock(
        GEOCODING,
        runner.clone(),
        SchedulingStrategy::LimitedParallel(3),
        None,
    )
    .await;

    assert_gate_passed(&result);
    assert!(runner.peak_in_flight() <= 3);
    assert!(runner.peak_in_flight() >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_sequential_runs_one_leg_at_a_time() {
    let runner = MockRunner::new().with_delay(Duration::from_millis(100));
    let result =
        run_pipeline_with_mock(GEOCODING, runner.clone(), SchedulingStrategy::Sequential, None).await;

    assert_gate_passed(&result);
    assert_eq!(runner.peak_in_flight(), 1);
}
