// Submission and per-user worker orchestration.
//
// One worker task drains one user's queue at a time; workers for different
// users run in parallel. A worker that observes an empty queue deactivates
// and exits; the next submission re-activates and spawns a fresh one.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use colored::Colorize;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::audio::effects::EffectRegistry;
use crate::audio::pipeline::{AudioPipeline, ProcessedClip};
use crate::config::ServiceConfig;
use crate::error::{PipelineError, SubmitError};
use crate::progress::{checkpoint, report_best_effort, ProgressReporter};
use crate::types::{Destination, Job, PayloadRef, QueueStatus, SubmitReceipt, UserId};

use super::store::{EnqueueOutcome, UserQueueStore};

/// Resolves a payload reference to raw bytes. Invoked once per job.
#[async_trait]
pub trait PayloadSource: Send + Sync {
    async fn fetch(&self, payload: &PayloadRef) -> anyhow::Result<Vec<u8>>;
}

/// Receives each job's final outcome.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn deliver_success(
        &self,
        destination: &Destination,
        bytes: Vec<u8>,
        filename: &str,
        caption: &str,
    ) -> anyhow::Result<()>;

    async fn deliver_failure(&self, destination: &Destination, message: &str)
        -> anyhow::Result<()>;
}

/// Shown to users when a job fails; the internal detail stays in the log.
const GENERIC_FAILURE_MESSAGE: &str = "❌ Error processing audio. Please try again!";

/// Accepts jobs, keeps per-user queues draining, and routes results to the
/// sinks. Queues are ephemeral: nothing survives a process restart.
pub struct QueueCoordinator {
    inner: Arc<CoordinatorInner>,
}

/// State shared between the coordinator handle and its worker tasks.
struct CoordinatorInner {
    config: ServiceConfig,
    store: Arc<UserQueueStore>,
    pipeline: Arc<AudioPipeline>,
    payloads: Arc<dyn PayloadSource>,
    progress: Arc<dyn ProgressReporter>,
    results: Arc<dyn ResultSink>,
    workers: Mutex<HashMap<UserId, JoinHandle<()>>>,
}

impl QueueCoordinator {
    pub fn new(
        config: ServiceConfig,
        store: Arc<UserQueueStore>,
        payloads: Arc<dyn PayloadSource>,
        progress: Arc<dyn ProgressReporter>,
        results: Arc<dyn ResultSink>,
    ) -> Self {
        let pipeline = Arc::new(AudioPipeline::new(&config));
        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                store,
                pipeline,
                payloads,
                progress,
                results,
                workers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn registry(&self) -> &EffectRegistry {
        self.inner.pipeline.registry()
    }

    /// Advisory status for a user-facing status command.
    pub fn queue_status(&self, user: UserId) -> QueueStatus {
        self.inner.store.status(user)
    }

    /// Accept a job: validate, enqueue, and make sure a worker is draining
    /// the user's queue. Returns without waiting for processing. Must be
    /// called from within a tokio runtime.
    pub fn submit(&self, job: Job) -> Result<SubmitReceipt, SubmitError> {
        let inner = &self.inner;
        if inner.pipeline.registry().lookup(&job.effect_id).is_none() {
            return Err(SubmitError::InvalidEffect(job.effect_id.clone()));
        }
        if let Some(size) = job.payload.size_bytes {
            if size > inner.config.max_payload_bytes {
                return Err(SubmitError::PayloadTooLarge {
                    size,
                    max: inner.config.max_payload_bytes,
                });
            }
        }

        let user = job.user;
        let position = match inner.store.enqueue(job) {
            EnqueueOutcome::Accepted { position } => position,
            EnqueueOutcome::Rejected => {
                return Err(SubmitError::QueueFull {
                    user,
                    max: inner.store.max_depth(),
                })
            }
        };
        info!(
            "📥 {} user {} at position {}",
            "SUBMIT".on_cyan().white(),
            user,
            position
        );

        inner.ensure_worker(user);
        Ok(SubmitReceipt { position })
    }

    /// Number of worker tasks that have not finished yet.
    pub fn active_workers(&self) -> usize {
        let workers = self.inner.workers.lock().unwrap();
        workers.values().filter(|h| !h.is_finished()).count()
    }

    /// Await every live worker. Used by shutdown paths and tests; new
    /// submissions arriving concurrently may spawn more workers, so this
    /// loops until none remain.
    pub async fn await_idle(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut workers = self.inner.workers.lock().unwrap();
                workers.drain().map(|(_, handle)| handle).collect()
            };
            if handles.is_empty() {
                break;
            }
            for result in futures::future::join_all(handles).await {
                if let Err(e) = result {
                    error!("❌ worker task failed: {}", e);
                }
            }
        }
    }
}

impl CoordinatorInner {
    /// Re-run activation after every successful enqueue. A job enqueued into
    /// a just-vacated queue always triggers a fresh worker this way.
    fn ensure_worker(self: &Arc<Self>, user: UserId) {
        if !self.store.try_activate(user) {
            return;
        }
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move { inner.run_worker(user).await });
        let mut workers = self.workers.lock().unwrap();
        workers.retain(|_, h| !h.is_finished());
        // A previous entry can only be a finished (or finishing) worker:
        // try_activate proved the active flag was clear.
        workers.insert(user, handle);
    }

    async fn run_worker(self: Arc<Self>, user: UserId) {
        info!("🚀 {} started for user {}", "WORKER".on_cyan().white(), user);
        let mut processed = 0u64;
        while let Some(job) = self.store.dequeue_or_deactivate(user) {
            // A panicking collaborator must not unwind past the loop: the
            // active flag only clears through dequeue_or_deactivate, so an
            // unwind here would strand every later job for this user.
            let job_id = job.id;
            if let Err(payload) = AssertUnwindSafe(self.process_job(job)).catch_unwind().await {
                error!("❌ job {} panicked: {}", job_id, panic_message(&payload));
            }
            processed += 1;
        }
        info!(
            "✅ {} drained queue for user {} ({} jobs)",
            "WORKER".on_cyan().white(),
            user,
            processed
        );
    }

    /// Run one job to completion. Failures are reported once and are terminal
    /// for the job only; the worker moves on to the next queued job.
    async fn process_job(&self, job: Job) {
        let destination = job.destination.clone();
        match self.run_pipeline(&job).await {
            Ok(clip) => {
                report_best_effort(
                    self.progress.as_ref(),
                    &destination,
                    checkpoint::UPLOADING,
                    "Uploading",
                )
                .await;
                match self
                    .results
                    .deliver_success(&destination, clip.bytes, &clip.filename, &clip.caption)
                    .await
                {
                    Ok(()) => {
                        report_best_effort(
                            self.progress.as_ref(),
                            &destination,
                            checkpoint::DONE,
                            "Done",
                        )
                        .await;
                    }
                    Err(e) => error!("❌ delivery failed for job {}: {:#}", job.id, e),
                }
            }
            Err(e) => {
                error!("❌ job {} failed at {} stage: {}", job.id, e.stage(), e);
                if let Err(de) = self
                    .results
                    .deliver_failure(&destination, GENERIC_FAILURE_MESSAGE)
                    .await
                {
                    error!("❌ failure notice undeliverable for job {}: {:#}", job.id, de);
                }
            }
        }
    }

    async fn run_pipeline(&self, job: &Job) -> Result<ProcessedClip, PipelineError> {
        // Validated at submission; a miss here means the catalog changed
        // underneath us, which it cannot.
        let effect = self
            .pipeline
            .registry()
            .lookup(&job.effect_id)
            .ok_or_else(|| {
                PipelineError::Transform(anyhow!("effect {} not in catalog", job.effect_id))
            })?;

        report_best_effort(
            self.progress.as_ref(),
            &job.destination,
            checkpoint::DOWNLOADING,
            "Downloading",
        )
        .await;
        let bytes = self
            .payloads
            .fetch(&job.payload)
            .await
            .map_err(PipelineError::Download)?;

        self.pipeline
            .process(job, effect, bytes, self.progress.as_ref())
            .await
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
