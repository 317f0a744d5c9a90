use super::coordinator::JobCoordinator;
use super::processor::{ProgressFn, TaskProcessor};
use super::types::JobState;
use crate::error::JobError;
use crate::object_store::ObjectStore;
use crate::ring::Identifier;

use std::sync::Arc;
use tokio::sync::{Mutex, mpsc, watch};

/// The bounded worker pool draining the pending-job queue.
///
/// Workers share one FIFO receiver; each claims a job, runs the processor on
/// a spawned task (so a panic is caught at the join handle instead of taking
/// the worker down) and publishes the terminal state through the
/// coordinator.
pub struct JobExecutor {
    coordinator: Arc<JobCoordinator>,
    object_store: Arc<dyn ObjectStore>,
    processor: Arc<dyn TaskProcessor>,
    worker_count: usize,
}

impl JobExecutor {
    pub fn new(
        coordinator: Arc<JobCoordinator>,
        object_store: Arc<dyn ObjectStore>,
        processor: Arc<dyn TaskProcessor>,
        worker_count: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            coordinator,
            object_store,
            processor,
            worker_count: worker_count.max(1),
        })
    }

    pub fn start(
        self: Arc<Self>,
        queue_rx: mpsc::Receiver<Identifier>,
        shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!("starting {} job workers", self.worker_count);
        let queue = Arc::new(Mutex::new(queue_rx));

        for worker_id in 0..self.worker_count {
            let executor = self.clone();
            let queue = queue.clone();
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    let job_id = {
                        let mut rx = queue.lock().await;
                        tokio::select! {
                            id = rx.recv() => match id {
                                Some(id) => id,
                                None => break,
                            },
                            _ = shutdown.changed() => break,
                        }
                    };
                    executor.run_job(worker_id, job_id).await;
                }
                tracing::debug!("worker {} stopped", worker_id);
            });
        }
    }

    async fn run_job(&self, worker_id: usize, job_id: Identifier) {
        let Some(record) = self.coordinator.claim(job_id) else {
            tracing::debug!("job {} gone or already claimed, skipping", job_id);
            return;
        };
        tracing::info!("worker {} running job {} ({})", worker_id, job_id, record.task);

        let processor = self.processor.clone();
        let object_store = self.object_store.clone();
        let progress_coordinator = self.coordinator.clone();
        let run = record.clone();

        let handle = tokio::spawn(async move {
            let progress: ProgressFn = Arc::new(move |pct| {
                progress_coordinator.record_progress(job_id, pct);
            });
            processor
                .execute(
                    run.task,
                    &run.source_bucket,
                    &run.dest_bucket,
                    &run.params,
                    object_store,
                    progress,
                )
                .await
        });

        let outcome = match handle.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                Err(JobError::ExecutorFailed("worker panicked".to_string()))
            }
            Err(_) => Err(JobError::ExecutorFailed("worker cancelled".to_string())),
        };

        let mut finished = record;
        match outcome {
            Ok(artifact) => {
                finished.state = JobState::Succeeded;
                finished.result = Some(artifact.url);
                finished.error = None;
                tracing::info!("job {} succeeded", job_id);
            }
            Err(e) => {
                finished.state = JobState::Failed;
                finished.error = Some(e.to_string());
                tracing::error!("job {} failed: {}", job_id, e);
            }
        }
        self.coordinator.publish_final(finished).await;
    }
}
