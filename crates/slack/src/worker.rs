use std::sync::Arc;
use std::time::Duration;

use replyhint_core::domain::{DismissRequest, SuggestionRequest};
use replyhint_core::flows::{FlowEvent, FlowRun};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::delivery::{advance, DeliveryOutcome, SuggestionPipeline};

#[derive(Debug)]
pub enum Job {
    Suggest { request: SuggestionRequest, run: FlowRun },
    Dismiss { request: DismissRequest, correlation_id: String },
}

impl Job {
    fn correlation_id(&self) -> &str {
        match self {
            Self::Suggest { run, .. } => run.correlation_id(),
            Self::Dismiss { correlation_id, .. } => correlation_id,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("worker is shutting down")]
    ShuttingDown,
    #[error("worker queue is full")]
    QueueFull,
}

/// Handle to a queued job's result. Dropping it does not cancel the job.
#[derive(Debug)]
pub struct JobReceipt {
    outcome: oneshot::Receiver<DeliveryOutcome>,
}

impl JobReceipt {
    /// A job that panicked or was abandoned at shutdown reads as `Dropped`.
    pub async fn outcome(self) -> DeliveryOutcome {
        self.outcome.await.unwrap_or(DeliveryOutcome::Dropped)
    }
}

struct QueuedJob {
    job: Job,
    reply: oneshot::Sender<DeliveryOutcome>,
}

/// Runs suggestion and dismiss jobs off the request path. Intake is a bounded
/// queue; at most `concurrency` jobs run at once.
pub struct SuggestionWorker {
    intake: mpsc::Sender<QueuedJob>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
    accept_loop: Mutex<Option<JoinHandle<()>>>,
}

impl SuggestionWorker {
    pub fn start(pipeline: Arc<SuggestionPipeline>, concurrency: usize, queue_capacity: usize) -> Self {
        let (intake, receiver) = mpsc::channel(queue_capacity.max(1));
        let shutdown = CancellationToken::new();
        let tasks = TaskTracker::new();
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

        let accept_loop = tokio::spawn(accept_loop(
            receiver,
            pipeline,
            semaphore,
            tasks.clone(),
            shutdown.clone(),
        ));

        Self { intake, shutdown, tasks, accept_loop: Mutex::new(Some(accept_loop)) }
    }

    /// Never waits. A refused suggestion job ends its flow as failed.
    pub fn submit(&self, job: Job) -> Result<JobReceipt, SubmitError> {
        if self.shutdown.is_cancelled() {
            return Err(refuse(job, SubmitError::ShuttingDown));
        }

        let (reply, outcome) = oneshot::channel();
        match self.intake.try_send(QueuedJob { job, reply }) {
            Ok(()) => Ok(JobReceipt { outcome }),
            Err(mpsc::error::TrySendError::Full(queued)) => {
                Err(refuse(queued.job, SubmitError::QueueFull))
            }
            Err(mpsc::error::TrySendError::Closed(queued)) => {
                Err(refuse(queued.job, SubmitError::ShuttingDown))
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Stops intake, then waits up to `grace` for buffered and running jobs.
    /// Returns how many running jobs were abandoned.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        self.shutdown.cancel();
        let accept_loop = self.accept_loop.lock().await.take();

        let drained = tokio::time::timeout(grace, async {
            if let Some(handle) = accept_loop {
                if let Err(error) = handle.await {
                    warn!(event_name = "system.worker.accept_loop_failed", error = %error, "worker accept loop ended abnormally");
                }
            }
            self.tasks.wait().await;
        })
        .await;

        match drained {
            Ok(()) => {
                info!(event_name = "system.worker.drained", "suggestion worker drained");
                0
            }
            Err(_) => {
                let abandoned = self.tasks.len();
                warn!(
                    event_name = "system.worker.abandoned",
                    abandoned,
                    grace_secs = grace.as_secs(),
                    "suggestion worker shutdown grace elapsed"
                );
                abandoned
            }
        }
    }
}

fn refuse(job: Job, reason: SubmitError) -> SubmitError {
    let correlation_id = job.correlation_id().to_owned();
    if let Job::Suggest { mut run, .. } = job {
        advance(&mut run, FlowEvent::JobRefused);
    }
    warn!(
        event_name = "suggestion.job.refused",
        correlation_id = %correlation_id,
        reason = %reason,
        "job refused by worker"
    );
    reason
}

async fn accept_loop(
    mut receiver: mpsc::Receiver<QueuedJob>,
    pipeline: Arc<SuggestionPipeline>,
    semaphore: Arc<Semaphore>,
    tasks: TaskTracker,
    shutdown: CancellationToken,
) {
    loop {
        let queued = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            queued = receiver.recv() => match queued {
                Some(queued) => queued,
                None => break,
            },
        };
        spawn_job(queued, &pipeline, &semaphore, &tasks).await;
    }

    // Whatever was accepted before shutdown still runs.
    receiver.close();
    while let Some(queued) = receiver.recv().await {
        spawn_job(queued, &pipeline, &semaphore, &tasks).await;
    }
    tasks.close();
    debug!(event_name = "system.worker.intake_closed", "suggestion worker intake closed");
}

async fn spawn_job(
    queued: QueuedJob,
    pipeline: &Arc<SuggestionPipeline>,
    semaphore: &Arc<Semaphore>,
    tasks: &TaskTracker,
) {
    let Ok(permit) = semaphore.clone().acquire_owned().await else {
        return;
    };
    let pipeline = pipeline.clone();

    tasks.spawn(async move {
        let _permit = permit;
        let QueuedJob { job, reply } = queued;
        let outcome = run_job(&pipeline, job).await;
        // The receipt may already be gone; the outcome is logged either way.
        let _ = reply.send(outcome);
    });
}

async fn run_job(pipeline: &SuggestionPipeline, job: Job) -> DeliveryOutcome {
    match job {
        Job::Suggest { request, mut run } => {
            advance(&mut run, FlowEvent::JobQueued);
            debug!(
                event_name = "suggestion.job.started",
                correlation_id = %run.correlation_id(),
                channel_id = %request.channel_id,
                "suggestion job started"
            );
            pipeline.deliver_suggestions(&request, &mut run).await
        }
        Job::Dismiss { request, correlation_id } => pipeline.dismiss(&request, &correlation_id).await,
    }
}
