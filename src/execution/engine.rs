//! Main execution engine - fans the matrix out, then fans results into the gate

use crate::{
    core::{JobResult, Pipeline, TriggerDecision},
    execution::{
        executor::{cancelled, JobExecutor},
        runner::CommandRunner,
        ExecutionScheduler, SchedulingStrategy,
    },
    gate::{Aggregator, Decision},
};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunSkipped {
        pipeline_name: String,
        marker: String,
    },
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
        job_count: usize,
    },
    JobStarted {
        job: String,
    },
    JobFinished {
        result: JobResult,
    },
    GateDecided {
        run_id: Uuid,
        gate_name: String,
        decision: Decision,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Emit an event to all handlers
fn emit_event(handlers: &[EventHandler], event: ExecutionEvent) {
    for handler in handlers {
        handler(event.clone());
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone)]
pub enum RunReport {
    /// The trigger filter rejected the run; nothing executed
    Skipped { marker: String },
    /// Every job reached a terminal state and the gate decided
    Completed {
        results: Vec<JobResult>,
        decision: Decision,
    },
}

impl RunReport {
    /// Process exit code: a skipped run is not a failure
    pub fn exit_code(&self) -> i32 {
        match self {
            RunReport::Skipped { .. } => 0,
            RunReport::Completed { decision, .. } => decision.exit_code(),
        }
    }
}

/// Sets the run-wide cancel flag
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Main pipeline execution engine
pub struct ExecutionEngine<R> {
    scheduler: ExecutionScheduler,
    executor: Arc<JobExecutor<R>>,
    event_handlers: Vec<EventHandler>,
    cancel: Arc<watch::Sender<bool>>,
}

impl<R: CommandRunner + 'static> ExecutionEngine<R> {
    pub fn new(runner: R, strategy: SchedulingStrategy) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            scheduler: ExecutionScheduler::new(strategy),
            executor: Arc::new(JobExecutor::new(runner)),
            event_handlers: Vec::new(),
            cancel: Arc::new(cancel),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Handle that cancels the run in progress
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel.clone(),
        }
    }

    /// Execute the entire pipeline and decide the gate
    pub async fn execute(&self, pipeline: &Pipeline, commit_message: Option<&str>) -> RunReport {
        let handlers: Arc<[EventHandler]> = self.event_handlers.clone().into();

        if let TriggerDecision::Skip { marker } = pipeline.trigger.evaluate(commit_message) {
            info!("Skipping run of {}: commit message contains '{}'", pipeline.name, marker);
            emit_event(
                &handlers,
                ExecutionEvent::RunSkipped {
                    pipeline_name: pipeline.name.clone(),
                    marker: marker.clone(),
                },
            );
            return RunReport::Skipped { marker };
        }

        info!(
            "Starting pipeline execution: {} ({}), {} job(s)",
            pipeline.name,
            pipeline.run_id,
            pipeline.jobs.len()
        );
        emit_event(
            &handlers,
            ExecutionEvent::RunStarted {
                run_id: pipeline.run_id,
                pipeline_name: pipeline.name.clone(),
                job_count: pipeline.jobs.len(),
            },
        );

        let results = self.fan_out(pipeline, &handlers).await;

        let aggregator = Aggregator::new(&pipeline.gate_name, pipeline.required().iter().cloned());
        let decision = aggregator.evaluate(&results);
        aggregator.log(&decision);

        emit_event(
            &handlers,
            ExecutionEvent::GateDecided {
                run_id: pipeline.run_id,
                gate_name: pipeline.gate_name.clone(),
                decision: decision.clone(),
            },
        );

        RunReport::Completed { results, decision }
    }

    /// Run every job, returning one result per job in declaration order.
    ///
    /// A job whose task panics is reported as a failure.
    async fn fan_out(&self, pipeline: &Pipeline, handlers: &Arc<[EventHandler]>) -> Vec<JobResult> {
        let permits = Arc::new(Semaphore::new(self.scheduler.concurrency(pipeline.jobs.len())));
        let mut tasks = JoinSet::new();

        for (index, job) in pipeline.jobs.iter().enumerate() {
            let job = job.clone();
            let permits = permits.clone();
            let executor = self.executor.clone();
            let handlers = handlers.clone();
            let mut cancel = self.cancel.subscribe();

            tasks.spawn(async move {
                let permit = tokio::select! {
                    permit = permits.acquire_owned() => permit.ok(),
                    _ = cancelled(&mut cancel) => None,
                };

                let result = match permit {
                    Some(_permit) => {
                        emit_event(&handlers, ExecutionEvent::JobStarted { job: job.name.clone() });
                        executor.execute(&job, cancel).await
                    }
                    None => JobResult::cancelled(&job.name).with_detail("run cancelled before start"),
                };

                emit_event(&handlers, ExecutionEvent::JobFinished { result: result.clone() });
                (index, result)
            });
        }

        let mut slots: Vec<Option<JobResult>> = vec![None; pipeline.jobs.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => error!("Job task failed to complete: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(&pipeline.jobs)
            .map(|(slot, job)| {
                slot.unwrap_or_else(|| {
                    let result = JobResult::failure(&job.name).with_detail("job task panicked");
                    emit_event(handlers, ExecutionEvent::JobFinished { result: result.clone() });
                    result
                })
            })
            .collect()
    }
}
