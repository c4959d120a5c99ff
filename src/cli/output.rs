//! CLI output formatting

use crate::{
    core::{JobOutcome, JobResult, JobSpec},
    execution::ExecutionEvent,
    gate::{AggregateOutcome, Decision},
};
use chrono::{DateTime, Utc};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over job completions
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let bar_style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(bar_style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a job outcome for display
pub fn format_outcome(outcome: JobOutcome) -> String {
    match outcome {
        JobOutcome::Success => style("SUCCESS").green().to_string(),
        JobOutcome::Failure => style("FAILURE").red().to_string(),
        JobOutcome::Skipped => style("SKIPPED").dim().to_string(),
        JobOutcome::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format a job result line, with duration when known
pub fn format_job_result(result: &JobResult) -> String {
    let icon = match result.outcome {
        JobOutcome::Success => CHECK,
        JobOutcome::Failure => CROSS,
        JobOutcome::Skipped | JobOutcome::Cancelled => WARN,
    };

    let mut line = format!("{} {} {}", icon, style(&result.job).bold(), format_outcome(result.outcome));
    if let (Some(started), Some(finished)) = (result.started_at, result.finished_at) {
        line.push_str(&format!(" {}", style(format_elapsed(started, finished)).dim()));
    }
    if result.outcome != JobOutcome::Success {
        if let Some(detail) = &result.detail {
            line.push_str(&format!("\n{}", indent(&style(detail).dim().to_string(), 4)));
        }
    }
    line
}

/// Format the gate decision
pub fn format_decision(gate_name: &str, decision: &Decision) -> String {
    match decision.outcome() {
        AggregateOutcome::Pass => format!(
            "{} {} {} - {}",
            CHECK,
            style(gate_name).bold(),
            style("passed").green(),
            decision.summary()
        ),
        AggregateOutcome::Fail => {
            let mut out = format!(
                "{} {} {} ({} prerequisite job(s) checked)",
                CROSS,
                style(gate_name).bold(),
                style("failed").red(),
                decision.required()
            );
            for finding in decision.findings() {
                out.push_str(&format!("\n  - {}", finding));
            }
            out
        }
    }
}

/// Format an expanded job for `matrix` listings
pub fn format_job_spec(job: &JobSpec) -> String {
    let mut line = format!("  {}", style(&job.name).bold());
    if let Some(image) = &job.context.image {
        line.push_str(&format!(" [{}]", style(image).cyan()));
    }
    for command in &job.commands {
        line.push_str(&format!("\n    $ {}", style(command).dim()));
    }
    line
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    match event {
        ExecutionEvent::RunSkipped {
            pipeline_name,
            marker,
        } => Some(format!(
            "{} Skipping {}: commit message contains {}",
            INFO,
            style(pipeline_name).bold(),
            style(marker).yellow()
        )),
        ExecutionEvent::RunStarted {
            run_id,
            pipeline_name,
            job_count,
        } => Some(format!(
            "{} Starting pipeline {} ({}) with {} job(s)",
            ROCKET,
            style(pipeline_name).bold(),
            style(&run_id.to_string()[..8]).dim(),
            style(job_count).cyan()
        )),
        ExecutionEvent::JobStarted { job } => Some(format!("{} {}", SPINNER, style(job).cyan())),
        ExecutionEvent::JobFinished { result } => Some(format_job_result(result)),
        // The verdict is printed once by the caller
        ExecutionEvent::GateDecided { .. } => None,
    }
}

fn format_elapsed(started: DateTime<Utc>, finished: DateTime<Utc>) -> String {
    finished
        .signed_duration_since(started)
        .to_std()
        .map(format_duration)
        .unwrap_or_else(|_| "0s".to_string())
}

/// Format a duration as `42s`, `3m 5s` or `1h 2m 3s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}
