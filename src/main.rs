use anyhow::{Context, Result};
use ci_gate::cli::commands::{CheckCommand, MatrixCommand, RunCommand, ValidateCommand};
use ci_gate::cli::output::*;
use ci_gate::cli::{Cli, Command};
use ci_gate::core::{config::PipelineConfig, config::DEFAULT_GATE_NAME, Pipeline, COMMIT_MESSAGE_ENV};
use ci_gate::execution::{
    CommandRunner, ContainerRunner, ExecutionEngine, ExecutionEvent, RunReport, SchedulingStrategy,
    ShellRunner,
};
use ci_gate::gate::{
    needs_json, resolve_required, Aggregator, EnvNeedsSource, FileSource, ResultSource, REQUIRED_ENV,
};
use tracing::{debug, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    let exit_code = match cli.command() {
        Command::Check(cmd) => check_gate(&cmd)?,
        Command::Run(cmd) => run_pipeline(&cmd).await?,
        Command::Validate(cmd) => validate_pipeline(&cmd)?,
        Command::Matrix(cmd) => show_matrix(&cmd)?,
    };

    if exit_code != 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}

/// Decide the gate from orchestrator-provided results; never fails open
fn check_gate(cmd: &CheckCommand) -> Result<i32> {
    let source: Box<dyn ResultSource> = match &cmd.results {
        Some(path) => Box::new(FileSource::new(path)),
        None => Box::new(EnvNeedsSource::default()),
    };

    let pipeline = match &cmd.pipeline {
        Some(path) => match PipelineConfig::from_file(path).and_then(|c| c.to_pipeline()) {
            Ok(pipeline) => Some(pipeline),
            Err(e) => {
                // Without the declared prerequisites nothing can be trusted
                let aggregator = Aggregator::new(DEFAULT_GATE_NAME, Vec::<String>::new());
                let decision = aggregator.unreadable(format!("pipeline {}: {}", path, e));
                aggregator.log(&decision);
                print_decision(aggregator.name(), &decision, cmd.json)?;
                return Ok(decision.exit_code());
            }
        },
        None => None,
    };

    let gate_name = pipeline
        .as_ref()
        .map(|p| p.gate_name.clone())
        .unwrap_or_else(|| DEFAULT_GATE_NAME.to_string());

    let loaded = source.load();
    let reported = loaded.as_deref().unwrap_or(&[]);
    let explicit = std::env::var(REQUIRED_ENV).ok();
    let declared = pipeline.as_ref().map(|p| p.required_for(reported));
    let required = resolve_required(explicit.as_deref(), declared.as_deref(), reported);

    let aggregator = Aggregator::new(gate_name, required);
    debug!("{} requires: {}", aggregator.name(), aggregator.required().join(", "));
    let decision = match &loaded {
        Ok(results) => aggregator.evaluate(results),
        Err(e) => {
            warn!("Could not read results from {}: {}", source.describe(), e);
            aggregator.unreadable(e.to_string())
        }
    };
    aggregator.log(&decision);

    print_decision(aggregator.name(), &decision, cmd.json)?;
    Ok(decision.exit_code())
}

fn print_decision(gate_name: &str, decision: &ci_gate::Decision, json: bool) -> Result<()> {
    if json {
        let data = serde_json::json!({ "gate": gate_name, "decision": decision });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{}", format_decision(gate_name, decision));
    }
    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<i32> {
    // Load pipeline config
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let pipeline = config.to_pipeline().context("Failed to expand pipeline")?;

    if !cmd.json {
        println!("{} Loaded pipeline: {}", INFO, style(&pipeline.name).bold());
    }

    let strategy = cmd.strategy.into_strategy(cmd.max_parallel);
    let commit_message = cmd
        .commit_message
        .clone()
        .or_else(|| std::env::var(COMMIT_MESSAGE_ENV).ok());

    let report = match cmd.runtime.executable() {
        None => {
            let runner = ShellRunner::new(&cmd.workdir);
            execute(runner, strategy, &pipeline, commit_message.as_deref(), cmd.json).await
        }
        Some(runtime) => {
            let workdir = std::fs::canonicalize(&cmd.workdir)
                .with_context(|| format!("Invalid workdir: {}", cmd.workdir))?;
            let runner = ContainerRunner::new(runtime, workdir);
            execute(runner, strategy, &pipeline, commit_message.as_deref(), cmd.json).await
        }
    };

    if let (Some(path), RunReport::Completed { results, .. }) = (&cmd.results_out, &report) {
        let json = serde_json::to_string_pretty(&needs_json(results))?;
        std::fs::write(path, json).with_context(|| format!("Failed to write results to {}", path))?;
        if !cmd.json {
            println!("{} Results written to {}", INFO, style(path).dim());
        }
    }

    if cmd.json {
        let data = match &report {
            RunReport::Skipped { marker } => serde_json::json!({
                "run_id": pipeline.run_id,
                "pipeline": pipeline.name,
                "status": "skipped",
                "marker": marker,
            }),
            RunReport::Completed { results, decision } => serde_json::json!({
                "run_id": pipeline.run_id,
                "pipeline": pipeline.name,
                "status": "completed",
                "gate": pipeline.gate_name,
                "results": results,
                "decision": decision,
            }),
        };
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else if let RunReport::Completed { decision, .. } = &report {
        println!("\n{}", format_decision(&pipeline.gate_name, decision));
    }

    Ok(report.exit_code())
}

async fn execute<R: CommandRunner + 'static>(
    runner: R,
    strategy: SchedulingStrategy,
    pipeline: &Pipeline,
    commit_message: Option<&str>,
    quiet: bool,
) -> RunReport {
    let mut engine = ExecutionEngine::new(runner, strategy);

    // Set up event handler for console output
    let progress = (!quiet).then(|| create_progress_bar(pipeline.jobs.len()));
    if let Some(progress) = progress.clone() {
        engine.add_event_handler(move |event| {
            if let ExecutionEvent::JobFinished { .. } = &event {
                progress.inc(1);
            }
            if let Some(line) = format_execution_event(&event) {
                progress.println(line);
            }
        });
    }

    // Ctrl-C cancels every job still running or queued
    let cancel = engine.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            cancel.cancel();
        }
    });

    let report = engine.execute(pipeline, commit_message).await;
    interrupt.abort();

    if let Some(progress) = progress {
        progress.finish_and_clear();
    }

    report
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<i32> {
    if !cmd.json {
        println!("{} Validating pipeline...", INFO);
    }

    match PipelineConfig::from_file(&cmd.file) {
        Ok(config) => {
            let jobs = config.expand_jobs()?;
            if cmd.json {
                let data = serde_json::json!({
                    "valid": true,
                    "expanded_jobs": jobs.len(),
                    "config": config,
                });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{} Pipeline configuration is valid!", CHECK);
                println!("  Name: {}", style(&config.name).bold());
                println!("  Templates: {}", style(config.jobs.len()).cyan());
                println!("  Expanded jobs: {}", style(jobs.len()).cyan());
                println!("  Gate: {}", style(&config.gate.name).bold());
            }
            Ok(0)
        }
        Err(e) if cmd.json => {
            let data = serde_json::json!({ "valid": false, "error": e.to_string() });
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(1)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            Ok(1)
        }
    }
}

fn show_matrix(cmd: &MatrixCommand) -> Result<i32> {
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;
    let pipeline = config.to_pipeline()?;

    if cmd.json {
        let data = serde_json::json!({
            "pipeline": pipeline.name,
            "gate": pipeline.gate_name,
            "required": pipeline.required(),
            "jobs": pipeline.jobs,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(0);
    }

    println!(
        "{} {} expands to {} job(s):",
        INFO,
        style(&pipeline.name).bold(),
        style(pipeline.jobs.len()).cyan()
    );
    for job in &pipeline.jobs {
        println!("{}", format_job_spec(job));
    }
    println!(
        "\n{} {} requires {} job(s)",
        INFO,
        style(&pipeline.gate_name).bold(),
        style(pipeline.required().len()).cyan()
    );

    Ok(0)
}
